//! Run summaries as JSON.
//!
//! A summary records what a run consumed and produced so corpora and
//! corrections can be audited later.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::flatfield::{ApplyReport, EstimateReport};
use crate::report::ChannelStats;

const TOOL: &str = "ffc";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateSummary {
    pub tool: String,
    pub command: String,
    pub generated_at: DateTime<Utc>,
    pub sigma: f64,
    pub channels: usize,
    pub width: usize,
    pub height: usize,
    pub tiles_per_channel: Vec<usize>,
    pub tiles_skipped: usize,
    pub files_processed: Vec<PathBuf>,
    pub files_skipped: Vec<SkippedEntry>,
    pub output: Option<PathBuf>,
    pub channel_stats: Vec<ChannelStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplySummary {
    pub tool: String,
    pub command: String,
    pub generated_at: DateTime<Utc>,
    pub scan: PathBuf,
    pub bias_field: PathBuf,
    pub tiles: usize,
    pub channels: usize,
    pub width: usize,
    pub height: usize,
    pub origin_x: i64,
    pub origin_y: i64,
    pub percentile: f64,
    pub max_val: f64,
    pub output: PathBuf,
    pub preview: Option<PathBuf>,
}

impl EstimateSummary {
    pub fn new(report: &EstimateReport, stats: &[ChannelStats], output: Option<&Path>) -> Self {
        Self {
            tool: TOOL.to_string(),
            command: "estimate".to_string(),
            generated_at: Utc::now(),
            sigma: report.sigma,
            channels: report.tiles_per_channel.len(),
            width: report.width,
            height: report.height,
            tiles_per_channel: report.tiles_per_channel.clone(),
            tiles_skipped: report.tiles_skipped,
            files_processed: report.files_processed.clone(),
            files_skipped: report
                .files_skipped
                .iter()
                .map(|s| SkippedEntry {
                    path: s.path.clone(),
                    reason: s.reason.clone(),
                })
                .collect(),
            output: output.map(Path::to_path_buf),
            channel_stats: stats.to_vec(),
        }
    }
}

impl ApplySummary {
    pub fn new(report: &ApplyReport, scan: &Path, bias_field: &Path, output: &Path, preview: Option<&Path>) -> Self {
        Self {
            tool: TOOL.to_string(),
            command: "apply".to_string(),
            generated_at: Utc::now(),
            scan: scan.to_path_buf(),
            bias_field: bias_field.to_path_buf(),
            tiles: report.tiles,
            channels: report.channels,
            width: report.width,
            height: report.height,
            origin_x: report.origin.0,
            origin_y: report.origin.1,
            percentile: report.percentile,
            max_val: report.max_val,
            output: output.to_path_buf(),
            preview: preview.map(Path::to_path_buf),
        }
    }
}

/// Write any summary as pretty-printed JSON.
pub fn write_summary_json<T: Serialize>(path: &Path, summary: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| AppError::new(2, format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}

/// Read an estimate summary back (used by tooling and tests).
pub fn read_estimate_summary(path: &Path) -> Result<EstimateSummary, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    let summary: EstimateSummary =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid summary JSON: {e}")))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatfield::SkippedFile;

    #[test]
    fn estimate_summary_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let report = EstimateReport {
            files_found: 2,
            files_processed: vec![PathBuf::from("a.czi")],
            files_skipped: vec![SkippedFile {
                path: PathBuf::from("b.czi"),
                reason: "not a mosaic scan".to_string(),
            }],
            tiles_per_channel: vec![9, 9, 8],
            tiles_skipped: 1,
            sigma: 25.0,
            width: 32,
            height: 24,
        };

        let summary = EstimateSummary::new(&report, &[], Some(Path::new("flatfield.ome.tiff")));
        write_summary_json(&path, &summary).unwrap();
        let back = read_estimate_summary(&path).unwrap();

        assert_eq!(back.tool, "ffc");
        assert_eq!(back.channels, 3);
        assert_eq!(back.tiles_per_channel, vec![9, 9, 8]);
        assert_eq!(back.files_skipped[0].reason, "not a mosaic scan");
        assert_eq!(back.output.as_deref(), Some(Path::new("flatfield.ome.tiff")));
        assert_eq!(back.generated_at, summary.generated_at);
    }

    #[test]
    fn apply_summary_flattens_origin() {
        let report = ApplyReport {
            tiles: 4,
            channels: 1,
            width: 10,
            height: 12,
            origin: (-3, 7),
            max_val: 0.5,
            percentile: 99.9,
        };
        let summary = ApplySummary::new(&report, Path::new("s.czi"), Path::new("f.tiff"), Path::new("o.tiff"), None);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["origin_x"], -3);
        assert_eq!(json["origin_y"], 7);
        assert!(json["preview"].is_null());
    }
}
