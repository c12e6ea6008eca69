//! `flatfield` library crate.
//!
//! The binary (`ffc`) is a thin wrapper around this library so that:
//!
//! - every numeric step is testable without spawning processes
//! - the CZI reader, the recipes, and the writers are reusable on their own
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod czi;
pub mod data;
pub mod domain;
pub mod error;
pub mod flatfield;
pub mod io;
pub mod math;
pub mod report;
pub mod tui;
