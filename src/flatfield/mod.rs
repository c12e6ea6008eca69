//! The two flat-field recipes and the mosaic canvas they share.

pub mod apply;
pub mod estimate;
pub mod stitch;

pub use apply::{ApplyOutput, ApplyReport, apply_bias_field, correct_tile, rescale_to_u16};
pub use estimate::{BiasAccumulator, EstimateOutput, EstimateReport, SkippedFile, estimate_bias_field};
pub use stitch::Canvas;
