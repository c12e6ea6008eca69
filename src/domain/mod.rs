//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - array aliases (`Plane`, `Plane32`) and tile placement (`TileBox`)
//! - numeric outputs (`BiasField`, `CorrectedMosaic`)
//! - per-command configuration (`EstimateConfig`, `ApplyConfig`, `SynthConfig`)

pub mod types;

pub use types::*;
