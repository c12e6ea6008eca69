//! Command-line parsing for the flat-field tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the numeric and file-format code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    DEFAULT_OUTPUT_PERCENTILE, DEFAULT_PREVIEW_PERCENTILE, DEFAULT_PREVIEW_SCALE, DEFAULT_SIGMA, SynthPixelType,
};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ffc", version, about = "Microscopy flat-field estimation and correction")]
pub struct Cli {
    /// More log output (debug level).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Estimate a per-channel bias field from a folder of mosaic CZI scans.
    Estimate(EstimateArgs),
    /// Correct a mosaic CZI scan with a saved bias field, stitch, and preview.
    Apply(ApplyArgs),
    /// Browse the channels of a saved bias field in the terminal.
    View(ViewArgs),
    /// Write a synthetic mosaic corpus with a known vignetting profile.
    Synth(SynthArgs),
}

#[derive(Debug, Args, Clone)]
pub struct EstimateArgs {
    /// Folder searched recursively for `.czi` scans (prompted when omitted).
    #[arg(short, long, value_name = "DIR")]
    pub folder: Option<PathBuf>,

    /// Output bias field (prompted when omitted).
    #[arg(short, long, value_name = "OME_TIFF")]
    pub output: Option<PathBuf>,

    /// Gaussian low-pass sigma in pixels.
    #[arg(long, env = "FLATFIELD_SIGMA", default_value_t = DEFAULT_SIGMA)]
    pub sigma: f64,

    /// Export a JSON run summary.
    #[arg(long = "export-summary", value_name = "JSON")]
    pub export_summary: Option<PathBuf>,

    /// Export per-channel bias-field statistics to CSV.
    #[arg(long = "export-stats", value_name = "CSV")]
    pub export_stats: Option<PathBuf>,

    /// Open the terminal viewer on the estimated field.
    #[arg(long)]
    pub view: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ApplyArgs {
    /// Mosaic scan to correct (prompted when omitted).
    #[arg(short = 'i', long, value_name = "CZI")]
    pub scan: Option<PathBuf>,

    /// Bias field produced by `ffc estimate` (prompted when omitted).
    #[arg(short = 'b', long = "flat-field", value_name = "OME_TIFF")]
    pub bias_field: Option<PathBuf>,

    /// Corrected mosaic path (default: `<scan>_flatfield_corrected.ome.tiff`).
    #[arg(short, long, value_name = "OME_TIFF")]
    pub output: Option<PathBuf>,

    /// Preview JPEG path (default: `<scan>_preview.jpg`).
    #[arg(long, value_name = "JPG")]
    pub preview: Option<PathBuf>,

    /// Skip the preview JPEG.
    #[arg(long, conflicts_with = "preview")]
    pub no_preview: bool,

    /// Percentile mapped to 65535 in the corrected mosaic.
    #[arg(long, env = "FLATFIELD_PERCENTILE", default_value_t = DEFAULT_OUTPUT_PERCENTILE)]
    pub percentile: f64,

    /// Percentile mapped to white in the preview.
    #[arg(long, env = "FLATFIELD_PREVIEW_PERCENTILE", default_value_t = DEFAULT_PREVIEW_PERCENTILE)]
    pub preview_percentile: f64,

    /// Preview downsampling factor.
    #[arg(long, env = "FLATFIELD_PREVIEW_SCALE", default_value_t = DEFAULT_PREVIEW_SCALE)]
    pub preview_scale: u32,

    /// Export a JSON run summary.
    #[arg(long = "export-summary", value_name = "JSON")]
    pub export_summary: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ViewArgs {
    /// Bias field to display (prompted when omitted).
    #[arg(value_name = "OME_TIFF")]
    pub bias_field: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Output folder for the generated scans.
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Number of scans.
    #[arg(short = 'n', long, default_value_t = 4)]
    pub files: usize,

    /// Tiles per row.
    #[arg(long, default_value_t = 4)]
    pub cols: usize,

    /// Tiles per column.
    #[arg(long, default_value_t = 3)]
    pub rows: usize,

    /// Tile width in pixels.
    #[arg(long, default_value_t = 256)]
    pub tile_width: usize,

    /// Tile height in pixels.
    #[arg(long, default_value_t = 192)]
    pub tile_height: usize,

    /// Fractional overlap between neighbouring tiles.
    #[arg(long, default_value_t = 0.1)]
    pub overlap: f64,

    /// Channel count.
    #[arg(short, long, default_value_t = 3)]
    pub channels: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Corner falloff of the first channel (0 = flat illumination).
    #[arg(long, default_value_t = 0.4)]
    pub vignette: f64,

    /// Standard deviation of additive Gaussian noise, in sample units.
    #[arg(long, default_value_t = 50.0)]
    pub noise: f64,

    /// Sample type of the generated tiles.
    #[arg(long, value_enum, default_value_t = SynthPixelType::Gray16)]
    pub pixel_type: SynthPixelType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_defaults() {
        let cli = Cli::parse_from(["ffc", "estimate", "-f", "scans"]);
        let Command::Estimate(args) = cli.command else {
            panic!("expected estimate");
        };
        assert_eq!(args.folder, Some(PathBuf::from("scans")));
        assert_eq!(args.sigma, DEFAULT_SIGMA);
        assert!(args.output.is_none());
        assert!(!args.view);
    }

    #[test]
    fn apply_flags_and_global_verbosity() {
        let cli = Cli::parse_from([
            "ffc", "apply", "-i", "s.czi", "-b", "f.ome.tiff", "--no-preview", "-v", "--percentile", "99.5",
        ]);
        assert!(cli.verbose);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.scan, Some(PathBuf::from("s.czi")));
        assert_eq!(args.bias_field, Some(PathBuf::from("f.ome.tiff")));
        assert!(args.no_preview);
        assert_eq!(args.percentile, 99.5);
        assert_eq!(args.preview_scale, DEFAULT_PREVIEW_SCALE);
    }

    #[test]
    fn preview_and_no_preview_conflict() {
        let res = Cli::try_parse_from(["ffc", "apply", "--preview", "p.jpg", "--no-preview"]);
        assert!(res.is_err());
    }
}
