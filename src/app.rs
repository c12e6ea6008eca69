//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs logging
//! - resolves missing paths through the interactive picker
//! - runs estimate/apply/view/synth and prints the summaries

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::picker::{self, FileKind};
use crate::cli::{ApplyArgs, Cli, Command, EstimateArgs, SynthArgs, ViewArgs};
use crate::domain::{ApplyConfig, EstimateConfig, SynthConfig};
use crate::error::AppError;
use crate::io::pretty_path;

pub mod pipeline;

/// Entry point for the `ffc` binary.
pub fn run() -> Result<(), AppError> {
    // Sigma/percentile overrides may live in a local `.env`.
    dotenvy::dotenv().ok();

    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Estimate(args) => handle_estimate(args),
        Command::Apply(args) => handle_apply(args),
        Command::View(args) => handle_view(args),
        Command::Synth(args) => handle_synth(args),
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v`/`-q`.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second install (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let folder = match &args.folder {
        Some(folder) => folder.clone(),
        None => picker::prompt_for_folder()?,
    };
    if !folder.is_dir() {
        return Err(AppError::new(2, format!("Not a folder: {}", folder.display())));
    }

    let config = estimate_config_from_args(&args, folder);
    let run = pipeline::run_estimate(&config)?;

    let output = match &config.output {
        Some(path) => Some(path.clone()),
        None => picker::prompt_for_save_path(&crate::io::default_bias_field_path(&config.folder))?,
    };
    pipeline::save_estimate(&run, &config, output.as_deref())?;

    println!(
        "{}",
        crate::report::format_estimate_summary(&run.output.report, &run.stats)
    );
    match &output {
        Some(path) => println!("Flat field averages saved to {}", pretty_path(path)),
        None => println!("Save canceled."),
    }

    if config.view {
        let title = output
            .as_deref()
            .map(pretty_path)
            .unwrap_or_else(|| "(unsaved)".to_string());
        crate::tui::run(&run.output.field, &title, &run.output.report.tiles_per_channel)?;
    }
    Ok(())
}

pub fn estimate_config_from_args(args: &EstimateArgs, folder: PathBuf) -> EstimateConfig {
    EstimateConfig {
        inputs: crate::io::find_czi_files(&folder),
        folder,
        sigma: args.sigma,
        output: args.output.clone(),
        export_summary: args.export_summary.clone(),
        export_stats: args.export_stats.clone(),
        view: args.view,
    }
}

fn handle_apply(args: ApplyArgs) -> Result<(), AppError> {
    let bias_field = match &args.bias_field {
        Some(path) => picker::validate_file_path(path, FileKind::BiasField)?,
        None => picker::prompt_for_file(FileKind::BiasField)?,
    };
    let scan = match &args.scan {
        Some(path) => picker::validate_file_path(path, FileKind::Scan)?,
        None => picker::prompt_for_file(FileKind::Scan)?,
    };

    let config = apply_config_from_args(&args, scan, bias_field);
    let run = pipeline::run_apply(&config)?;

    println!(
        "{}",
        crate::report::format_apply_summary(&run.report, &config.scan, &run.output, run.preview.as_deref())
    );
    println!("Flat field correction applied and saved to {}", pretty_path(&run.output));
    if let Some(preview) = &run.preview {
        println!("Preview image saved to {}", pretty_path(preview));
    }
    Ok(())
}

pub fn apply_config_from_args(args: &ApplyArgs, scan: PathBuf, bias_field: PathBuf) -> ApplyConfig {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| crate::io::corrected_output_path(&scan));
    let preview = if args.no_preview {
        None
    } else {
        Some(
            args.preview
                .clone()
                .unwrap_or_else(|| crate::io::preview_output_path(&scan)),
        )
    };

    ApplyConfig {
        scan,
        bias_field,
        output,
        preview,
        percentile: args.percentile,
        preview_percentile: args.preview_percentile,
        preview_scale: args.preview_scale,
        export_summary: args.export_summary.clone(),
    }
}

fn handle_view(args: ViewArgs) -> Result<(), AppError> {
    let path = match &args.bias_field {
        Some(path) => picker::validate_file_path(path, FileKind::BiasField)?,
        None => picker::prompt_for_file(FileKind::BiasField)?,
    };
    let field = crate::io::read_bias_field(&path)?;
    crate::tui::run(&field, &pretty_path(&path), &[])
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = synth_config_from_args(&args);
    let out = crate::data::generate_corpus(&config)?;
    println!(
        "Wrote {} synthetic scan(s) ({} tiles each) to {}",
        out.files.len(),
        out.tiles_per_file,
        pretty_path(&config.output_dir)
    );
    Ok(())
}

pub fn synth_config_from_args(args: &SynthArgs) -> SynthConfig {
    SynthConfig {
        output_dir: args.output.clone(),
        files: args.files,
        grid_cols: args.cols,
        grid_rows: args.rows,
        tile_width: args.tile_width,
        tile_height: args.tile_height,
        overlap: args.overlap,
        channels: args.channels,
        seed: args.seed,
        vignette: args.vignette,
        noise: args.noise,
        pixel_type: args.pixel_type,
    }
}

/// Rewrite argv so `ffc` defaults to `ffc estimate`.
///
/// Rules:
/// - `ffc`                       -> `ffc estimate`
/// - `ffc -f scans ...`          -> `ffc estimate -f scans ...`
/// - `ffc -v apply ...`          -> unchanged (global flags may precede a subcommand)
/// - `ffc --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let is_global = |a: &str| matches!(a, "-v" | "--verbose" | "-q" | "--quiet");
    let Some(first) = argv.iter().skip(1).find(|a| !is_global(a.as_str())).cloned() else {
        argv.push("estimate".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(first.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(first.as_str(), "estimate" | "apply" | "view" | "synth");
    if is_subcommand {
        return argv;
    }

    // A leading flag is treated as an estimate flag.
    if first.starts_with('-') {
        argv.insert(1, "estimate".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_runs_estimate() {
        assert_eq!(rewrite_args(argv(&["ffc"])), argv(&["ffc", "estimate"]));
        assert_eq!(
            rewrite_args(argv(&["ffc", "-f", "scans"])),
            argv(&["ffc", "estimate", "-f", "scans"])
        );
        assert_eq!(rewrite_args(argv(&["ffc", "-q"])), argv(&["ffc", "-q", "estimate"]));
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        for items in [
            &["ffc", "apply", "-i", "a.czi"][..],
            &["ffc", "--help"][..],
            &["ffc", "-v", "synth", "-o", "x"][..],
        ] {
            assert_eq!(rewrite_args(argv(items)), argv(items));
        }
    }

    #[test]
    fn apply_defaults_follow_scan_name() {
        let cli = Cli::parse_from(["ffc", "apply"]);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        let config = apply_config_from_args(&args, PathBuf::from("d/scan.czi"), PathBuf::from("f.ome.tiff"));
        assert_eq!(config.output, PathBuf::from("d/scan_flatfield_corrected.ome.tiff"));
        assert_eq!(config.preview, Some(PathBuf::from("d/scan_preview.jpg")));
    }

    #[test]
    fn no_preview_disables_the_jpeg() {
        let cli = Cli::parse_from(["ffc", "apply", "--no-preview", "-o", "out.tiff"]);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        let config = apply_config_from_args(&args, PathBuf::from("scan.czi"), PathBuf::from("f.tif"));
        assert_eq!(config.output, PathBuf::from("out.tiff"));
        assert!(config.preview.is_none());
    }
}
