//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - passed between the CZI reader, the numeric steps, and the writers
//! - summarized into JSON/CSV exports
//! - rendered by the terminal viewer

use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// A 2-D `f64` array: `nrows = height`, `ncols = width`.
pub type Plane = DMatrix<f64>;

/// A 2-D `f32` array, used for bias fields and the stitching canvas.
pub type Plane32 = DMatrix<f32>;

/// Gaussian low-pass sigma (pixels) applied to the averaged tiles.
pub const DEFAULT_SIGMA: f64 = 50.0;

/// Percentile mapped to full scale when rescaling the corrected mosaic to 16 bit.
pub const DEFAULT_OUTPUT_PERCENTILE: f64 = 99.9;

/// Percentile mapped to full scale in the RGB preview.
pub const DEFAULT_PREVIEW_PERCENTILE: f64 = 99.0;

/// Downsampling factor of the RGB preview.
pub const DEFAULT_PREVIEW_SCALE: u32 = 4;

/// Placement of a tile in global mosaic pixel coordinates.
///
/// `x`/`y` may be negative: stage coordinates are only shifted into the
/// canvas during stitching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBox {
    pub x: i64,
    pub y: i64,
    pub w: usize,
    pub h: usize,
}

/// Per-channel illumination bias field (`C × Y × X`).
#[derive(Debug, Clone)]
pub struct BiasField {
    pub channels: Vec<Plane32>,
}

impl BiasField {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn width(&self) -> usize {
        self.channels.first().map(|p| p.ncols()).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.channels.first().map(|p| p.nrows()).unwrap_or(0)
    }
}

/// Stitched, corrected mosaic rescaled to 16 bit.
///
/// Each channel is stored row-major (`height * width` samples).
#[derive(Debug, Clone)]
pub struct CorrectedMosaic {
    pub width: usize,
    pub height: usize,
    pub channels: Vec<Vec<u16>>,
}

impl CorrectedMosaic {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

/// Configuration for `ffc estimate`, derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct EstimateConfig {
    /// Folder the corpus was discovered in.
    pub folder: PathBuf,
    /// CZI files to average (discovered under `folder`).
    pub inputs: Vec<PathBuf>,
    pub sigma: f64,
    /// Where to write the bias field (`None` = ask once the field is computed).
    pub output: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
    pub export_stats: Option<PathBuf>,
    pub view: bool,
}

/// Configuration for `ffc apply`.
#[derive(Debug, Clone)]
pub struct ApplyConfig {
    pub scan: PathBuf,
    pub bias_field: PathBuf,
    pub output: PathBuf,
    /// Preview JPEG path (`None` disables the preview).
    pub preview: Option<PathBuf>,
    pub percentile: f64,
    pub preview_percentile: f64,
    pub preview_scale: u32,
    pub export_summary: Option<PathBuf>,
}

/// Sample type written by the synthetic corpus generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SynthPixelType {
    Gray8,
    Gray16,
    Gray32f,
}

/// Configuration for `ffc synth`.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub output_dir: PathBuf,
    pub files: usize,
    pub grid_cols: usize,
    pub grid_rows: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    /// Fractional overlap between neighbouring tiles (`0.0..0.9`).
    pub overlap: f64,
    pub channels: usize,
    pub seed: u64,
    /// Corner falloff of the first channel (`0.0` = flat illumination).
    pub vignette: f64,
    /// Standard deviation of additive Gaussian noise (sample units).
    pub noise: f64,
    pub pixel_type: SynthPixelType,
}
