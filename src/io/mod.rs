//! Input/output helpers.
//!
//! - OME-TIFF bias fields and corrected mosaics (`ome_tiff`)
//! - RGB JPEG previews (`preview`)
//! - output naming (`paths`) and corpus discovery (`discover`)
//! - statistics CSV (`export`) and run summary JSON (`summary`)

pub mod discover;
pub mod export;
pub mod ome_tiff;
pub mod paths;
pub mod preview;
pub mod summary;

pub use discover::*;
pub use export::*;
pub use ome_tiff::*;
pub use paths::*;
pub use preview::*;
pub use summary::*;
