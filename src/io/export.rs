//! Export per-channel bias-field statistics to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::AppError;
use crate::report::ChannelStats;

/// Write one CSV row per bias-field channel.
pub fn write_stats_csv(path: &Path, stats: &[ChannelStats]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create stats CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "channel,tiles,min,max,mean,center,corner_falloff")
        .map_err(|e| AppError::new(2, format!("Failed to write stats CSV header: {e}")))?;

    for s in stats {
        writeln!(
            out,
            "{},{},{:.10e},{:.10e},{:.10e},{:.10e},{:.6}",
            s.channel, s.tiles, s.min, s.max, s.mean, s.center, s.corner_falloff
        )
        .map_err(|e| AppError::new(2, format!("Failed to write stats CSV row: {e}")))?;
    }

    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write stats CSV: {e}")))?;
    Ok(())
}
