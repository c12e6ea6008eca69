//! Shared estimate/apply workflow used by the CLI handlers and the viewer.
//!
//! estimate: discover -> accumulate -> low-pass -> stats -> write field/exports
//! apply:    load field -> open scan -> correct + stitch -> write mosaic/preview/exports

use std::path::{Path, PathBuf};

use crate::czi::CziFile;
use crate::domain::{ApplyConfig, EstimateConfig};
use crate::error::AppError;
use crate::flatfield::{ApplyReport, EstimateOutput, apply_bias_field, estimate_bias_field};
use crate::io::{ApplySummary, EstimateSummary};
use crate::report::{ChannelStats, channel_stats};

/// Computed (not yet saved) outputs of an estimate run.
#[derive(Debug, Clone)]
pub struct EstimateRun {
    pub output: EstimateOutput,
    pub stats: Vec<ChannelStats>,
}

/// Outputs of an apply run; all files are already written.
#[derive(Debug, Clone)]
pub struct ApplyRun {
    pub report: ApplyReport,
    pub output: PathBuf,
    pub preview: Option<PathBuf>,
}

/// Estimate the bias field of `config.inputs`.
pub fn run_estimate(config: &EstimateConfig) -> Result<EstimateRun, AppError> {
    if config.inputs.is_empty() {
        return Err(AppError::new(
            2,
            format!("No CZI files found in {}.", config.folder.display()),
        ));
    }
    tracing::info!(files = config.inputs.len(), folder = %config.folder.display(), "estimating flat field");

    let output = estimate_bias_field(&config.inputs, config.sigma)?;
    let stats = channel_stats(&output.field, &output.report.tiles_per_channel);
    Ok(EstimateRun { output, stats })
}

/// Write the bias field (when `path` is given) and the requested exports.
pub fn save_estimate(run: &EstimateRun, config: &EstimateConfig, path: Option<&Path>) -> Result<(), AppError> {
    if let Some(path) = path {
        crate::io::write_bias_field(path, &run.output.field)?;
        tracing::info!(path = %path.display(), "flat field written");
    }
    if let Some(csv) = &config.export_stats {
        crate::io::write_stats_csv(csv, &run.stats)?;
    }
    if let Some(json) = &config.export_summary {
        let summary = EstimateSummary::new(&run.output.report, &run.stats, path);
        crate::io::write_summary_json(json, &summary)?;
    }
    Ok(())
}

/// Correct one scan with a saved bias field and write every output.
pub fn run_apply(config: &ApplyConfig) -> Result<ApplyRun, AppError> {
    let field = crate::io::read_bias_field(&config.bias_field)?;
    tracing::info!(
        path = %config.bias_field.display(),
        channels = field.channel_count(),
        width = field.width(),
        height = field.height(),
        "flat field loaded"
    );

    let mut czi = CziFile::open(&config.scan)?;
    let result = apply_bias_field(&mut czi, &field, config.percentile)?;

    crate::io::write_corrected(&config.output, &result.mosaic)?;
    if let Some(preview) = &config.preview {
        crate::io::write_preview(preview, &result.mosaic, config.preview_percentile, config.preview_scale)?;
    }
    if let Some(json) = &config.export_summary {
        let summary = ApplySummary::new(
            &result.report,
            &config.scan,
            &config.bias_field,
            &config.output,
            config.preview.as_deref(),
        );
        crate::io::write_summary_json(json, &summary)?;
    }

    Ok(ApplyRun {
        report: result.report,
        output: config.output.clone(),
        preview: config.preview.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SynthConfig, SynthPixelType};
    use crate::io::{corrected_output_path, find_czi_files, preview_output_path, read_bias_field};

    fn corpus(dir: &Path) -> Vec<PathBuf> {
        let config = SynthConfig {
            output_dir: dir.to_path_buf(),
            files: 2,
            grid_cols: 3,
            grid_rows: 2,
            tile_width: 24,
            tile_height: 16,
            overlap: 0.25,
            channels: 2,
            seed: 11,
            vignette: 0.6,
            noise: 10.0,
            pixel_type: SynthPixelType::Gray16,
        };
        crate::data::generate_corpus(&config).unwrap().files
    }

    #[test]
    fn estimate_then_apply_on_a_synthetic_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let scans = dir.path().join("scans");
        let files = corpus(&scans);
        assert_eq!(find_czi_files(&scans), files);

        let estimate = EstimateConfig {
            folder: scans.clone(),
            inputs: files.clone(),
            sigma: 2.0,
            output: None,
            export_summary: Some(dir.path().join("estimate.json")),
            export_stats: Some(dir.path().join("stats.csv")),
            view: false,
        };
        let run = run_estimate(&estimate).unwrap();
        assert_eq!(run.output.report.files_processed.len(), 2);
        assert_eq!(run.output.report.tiles_per_channel, vec![12, 12]);
        assert!(run.stats[0].corner_falloff < 0.9, "{:?}", run.stats[0]);

        let field_path = dir.path().join("flatfield.ome.tiff");
        save_estimate(&run, &estimate, Some(&field_path)).unwrap();
        assert!(dir.path().join("estimate.json").exists());
        assert!(dir.path().join("stats.csv").exists());

        let apply = ApplyConfig {
            scan: files[0].clone(),
            bias_field: field_path,
            output: corrected_output_path(&files[0]),
            preview: Some(preview_output_path(&files[0])),
            percentile: 99.9,
            preview_percentile: 99.0,
            preview_scale: 4,
            export_summary: None,
        };
        let applied = run_apply(&apply).unwrap();
        assert_eq!(applied.report.tiles, 12);
        assert_eq!((applied.report.width, applied.report.height), (60, 28));
        assert!(applied.report.max_val > 0.0);

        let corrected = read_bias_field(&applied.output).unwrap();
        assert_eq!(corrected.channel_count(), 2);
        assert_eq!((corrected.width(), corrected.height()), (60, 28));
        assert!(applied.preview.unwrap().exists());
    }

    #[test]
    fn estimate_on_empty_folder_fails_with_usage_code() {
        let dir = tempfile::tempdir().unwrap();
        let config = EstimateConfig {
            folder: dir.path().to_path_buf(),
            inputs: Vec::new(),
            sigma: 50.0,
            output: None,
            export_summary: None,
            export_stats: None,
            view: false,
        };
        assert_eq!(run_estimate(&config).unwrap_err().exit_code(), 2);
    }
}
