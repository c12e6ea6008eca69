//! Numeric helpers: Gaussian low-pass filtering and NaN-aware reductions.

pub mod gaussian;
pub mod stats;

pub use gaussian::*;
pub use stats::*;
