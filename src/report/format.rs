//! Formatted terminal output.
//!
//! Formatting lives here so the numeric modules stay free of presentation
//! details and output changes are localized.

use std::path::Path;

use crate::flatfield::{ApplyReport, EstimateReport};
use crate::io::pretty_path;
use crate::report::ChannelStats;

/// Summary block printed after `ffc estimate`.
pub fn format_estimate_summary(report: &EstimateReport, stats: &[ChannelStats]) -> String {
    let mut out = String::new();

    out.push_str("=== ffc - flat field estimate ===\n");
    out.push_str(&format!(
        "Files: found={} processed={} skipped={}\n",
        report.files_found,
        report.files_processed.len(),
        report.files_skipped.len()
    ));
    out.push_str(&format!(
        "Field: {} channel(s) | {}x{} px | sigma={}\n",
        report.tiles_per_channel.len(),
        report.width,
        report.height,
        report.sigma
    ));
    if report.tiles_skipped > 0 {
        out.push_str(&format!("Tiles skipped: {}\n", report.tiles_skipped));
    }
    for skipped in &report.files_skipped {
        out.push_str(&format!("  (skipped {}) {}\n", pretty_path(&skipped.path), skipped.reason));
    }

    out.push('\n');
    out.push_str(&format_channel_table(stats));
    out
}

/// Per-channel table of bias-field statistics.
pub fn format_channel_table(stats: &[ChannelStats]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>3}  {:>6}  {:>12}  {:>12}  {:>12}  {:>8}\n",
        "ch", "tiles", "min", "max", "center", "falloff"
    ));
    for s in stats {
        out.push_str(&format!(
            "{:>3}  {:>6}  {:>12.4e}  {:>12.4e}  {:>12.4e}  {:>8.3}\n",
            s.channel, s.tiles, s.min, s.max, s.center, s.corner_falloff
        ));
    }
    out
}

/// Summary block printed after `ffc apply`.
pub fn format_apply_summary(report: &ApplyReport, scan: &Path, output: &Path, preview: Option<&Path>) -> String {
    let mut out = String::new();

    out.push_str("=== ffc - flat field correction ===\n");
    out.push_str(&format!("Scan: {}\n", pretty_path(scan)));
    out.push_str(&format!(
        "Tiles: {} | channels: {}\n",
        report.tiles, report.channels
    ));
    out.push_str(&format!(
        "Canvas: {}x{} px | origin=({}, {})\n",
        report.width, report.height, report.origin.0, report.origin.1
    ));
    out.push_str(&format!(
        "Rescale: p{} = {:.6} -> 65535\n",
        report.percentile, report.max_val
    ));
    out.push_str(&format!("Output: {}\n", pretty_path(output)));
    if let Some(preview) = preview {
        out.push_str(&format!("Preview: {}\n", pretty_path(preview)));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::flatfield::SkippedFile;

    #[test]
    fn estimate_summary_lists_skipped_files() {
        let report = EstimateReport {
            files_found: 3,
            files_processed: vec![PathBuf::from("a.czi"), PathBuf::from("b.czi")],
            files_skipped: vec![SkippedFile {
                path: PathBuf::from("./c.czi"),
                reason: "not a mosaic scan".to_string(),
            }],
            tiles_per_channel: vec![4, 4],
            tiles_skipped: 0,
            sigma: 50.0,
            width: 64,
            height: 48,
        };
        let text = format_estimate_summary(&report, &[]);
        assert!(text.contains("found=3 processed=2 skipped=1"));
        assert!(text.contains("2 channel(s) | 64x48 px | sigma=50"));
        assert!(text.contains("(skipped c.czi) not a mosaic scan"));
        assert!(!text.contains("Tiles skipped"));
    }

    #[test]
    fn apply_summary_mentions_preview_only_when_written() {
        let report = ApplyReport {
            tiles: 6,
            channels: 2,
            width: 100,
            height: 80,
            origin: (-12, 4),
            max_val: 1.25,
            percentile: 99.9,
        };
        let with = format_apply_summary(&report, Path::new("s.czi"), Path::new("o.tiff"), Some(Path::new("p.jpg")));
        let without = format_apply_summary(&report, Path::new("s.czi"), Path::new("o.tiff"), None);
        assert!(with.contains("origin=(-12, 4)"));
        assert!(with.contains("Preview: p.jpg"));
        assert!(!without.contains("Preview"));
    }
}
