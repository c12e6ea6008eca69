//! Bias-field estimation: average normalized tiles per channel, low-pass, normalize.

use std::path::{Path, PathBuf};

use crate::czi::CziFile;
use crate::domain::{BiasField, Plane};
use crate::error::AppError;
use crate::math::{gaussian_filter, nansum};

/// Running per-channel sums of normalized tiles.
#[derive(Debug, Clone)]
pub struct BiasAccumulator {
    height: usize,
    width: usize,
    sums: Vec<Plane>,
    counts: Vec<usize>,
}

impl BiasAccumulator {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            sums: vec![Plane::zeros(height, width); channels],
            counts: vec![0; channels],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Normalize `tile` by its NaN-ignoring sum (when non-zero) and accumulate it.
    pub fn add_tile(&mut self, channel: usize, mut tile: Plane) -> Result<(), AppError> {
        if channel >= self.sums.len() {
            return Err(AppError::new(
                3,
                format!("channel {channel} is outside the {} accumulated channel(s)", self.sums.len()),
            ));
        }
        if tile.shape() != (self.height, self.width) {
            return Err(AppError::new(
                3,
                format!(
                    "tile is {}x{}, expected {}x{}",
                    tile.ncols(),
                    tile.nrows(),
                    self.width,
                    self.height
                ),
            ));
        }

        let norm = nansum(tile.iter().copied());
        if norm != 0.0 {
            tile /= norm;
        }
        self.sums[channel] += &tile;
        self.counts[channel] += 1;
        Ok(())
    }

    /// Average, Gaussian-filter, and renormalize each channel.
    ///
    /// Channels without tiles stay all-zero. Each other channel sums to 1.
    pub fn finish(self, sigma: f64) -> BiasField {
        let channels = self
            .sums
            .into_iter()
            .zip(self.counts.iter())
            .enumerate()
            .map(|(c, (sum, &count))| {
                if count == 0 {
                    tracing::warn!(channel = c, "no tiles found for channel");
                    return sum.map(|v| v as f32);
                }
                let average = sum / count as f64;
                tracing::info!(channel = c, tiles = count, "flat field for channel computed");

                let mut smooth = gaussian_filter(&average, sigma);
                let total = nansum(smooth.iter().copied());
                if total != 0.0 && total.is_finite() {
                    smooth /= total;
                }
                tracing::info!(channel = c, sigma, "low-pass filter applied");
                smooth.map(|v| v as f32)
            })
            .collect();

        BiasField { channels }
    }
}

/// A file that contributed nothing to the estimate.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// What happened during an estimate run.
#[derive(Debug, Clone, Default)]
pub struct EstimateReport {
    pub files_found: usize,
    pub files_processed: Vec<PathBuf>,
    pub files_skipped: Vec<SkippedFile>,
    pub tiles_per_channel: Vec<usize>,
    pub tiles_skipped: usize,
    pub sigma: f64,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone)]
pub struct EstimateOutput {
    pub field: BiasField,
    pub report: EstimateReport,
}

/// Estimate a bias field from a corpus of mosaic CZI scans.
pub fn estimate_bias_field(files: &[PathBuf], sigma: f64) -> Result<EstimateOutput, AppError> {
    let mut report = EstimateReport {
        files_found: files.len(),
        sigma,
        ..EstimateReport::default()
    };
    let mut acc: Option<BiasAccumulator> = None;

    for path in files {
        tracing::info!(file = %path.display(), "processing");
        match accumulate_file(path, &mut acc, &mut report.tiles_skipped) {
            Ok(FileOutcome::Processed(0)) => {
                tracing::warn!(file = %path.display(), "no usable tiles; skipping");
                report.files_skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: "no tiles matched the channel count or tile shape".to_string(),
                });
            }
            Ok(FileOutcome::Processed(_)) => report.files_processed.push(path.clone()),
            Ok(FileOutcome::NotMosaic) => {
                tracing::warn!(
                    file = %path.display(),
                    "does not appear to be a mosaic scan; skipping"
                );
                report.files_skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: "not a mosaic scan".to_string(),
                });
            }
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "failed to read; skipping");
                report.files_skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    let Some(acc) = acc else {
        return Err(AppError::new(3, "No tiles were processed."));
    };

    report.tiles_per_channel = acc.counts().to_vec();
    (report.height, report.width) = acc.shape();

    let field = acc.finish(sigma);
    Ok(EstimateOutput { field, report })
}

enum FileOutcome {
    /// Number of tiles that made it into the accumulator.
    Processed(usize),
    NotMosaic,
}

fn accumulate_file(
    path: &Path,
    acc: &mut Option<BiasAccumulator>,
    tiles_skipped: &mut usize,
) -> Result<FileOutcome, AppError> {
    let mut czi = CziFile::open(path)?;
    if !czi.is_mosaic() {
        return Ok(FileOutcome::NotMosaic);
    }

    let channels = czi.channel_count();
    let tiles = czi.tiles()?;
    tracing::info!(tiles = tiles.len(), channels, "processing tiles");

    let mut used = 0;

    for (i, tile) in tiles.iter().enumerate() {
        let plane = czi.read_tile(tile)?;
        let sink = acc.get_or_insert_with(|| BiasAccumulator::new(channels, plane.nrows(), plane.ncols()));

        if let Err(err) = sink.add_tile(tile.channel, plane) {
            tracing::warn!(tile = i, error = %err, "skipping tile");
            *tiles_skipped += 1;
            continue;
        }
        used += 1;
        tracing::debug!(tile = i + 1, total = tiles.len(), channel = tile.channel, "tile accumulated");
    }

    Ok(FileOutcome::Processed(used))
}
