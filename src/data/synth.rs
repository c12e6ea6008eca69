//! Synthetic mosaic corpora with a known vignetting profile.
//!
//! Each file is a grid of overlapping tiles cut from a smooth random scene
//! (a background plus Gaussian blobs). Every tile is multiplied by the
//! channel's illumination profile and perturbed with Gaussian noise, so the
//! estimate step should recover a field proportional to that profile.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::czi::{CziWriter, PixelType, TilePlacement};
use crate::domain::{Plane, SynthConfig, SynthPixelType, TileBox};
use crate::error::AppError;

/// Blobs per scene.
const BLOBS: usize = 8;

/// Scene background level (fraction of full scale).
const BACKGROUND: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct SynthOutput {
    pub files: Vec<PathBuf>,
    /// Illumination profile used for each channel (`1.0` at the optical centre).
    pub profiles: Vec<Plane>,
    pub tiles_per_file: usize,
}

/// Radial falloff `1 - strength * r²`, with `r = 1` at the tile corners.
pub fn vignette_profile(height: usize, width: usize, strength: f64) -> Plane {
    let cy = (height as f64 - 1.0) / 2.0;
    let cx = (width as f64 - 1.0) / 2.0;
    let r2_max = (cx * cx + cy * cy).max(f64::EPSILON);
    Plane::from_fn(height, width, |r, c| {
        let dy = r as f64 - cy;
        let dx = c as f64 - cx;
        1.0 - strength * (dx * dx + dy * dy) / r2_max
    })
}

/// Corner falloff of channel `c`; later channels are progressively flatter.
fn channel_strength(vignette: f64, c: usize) -> f64 {
    vignette / (1.0 + 0.5 * c as f64)
}

fn full_scale(pixel_type: SynthPixelType) -> f64 {
    match pixel_type {
        SynthPixelType::Gray8 => 200.0,
        SynthPixelType::Gray16 => 20_000.0,
        SynthPixelType::Gray32f => 1.0,
    }
}

fn czi_pixel_type(pixel_type: SynthPixelType) -> PixelType {
    match pixel_type {
        SynthPixelType::Gray8 => PixelType::Gray8,
        SynthPixelType::Gray16 => PixelType::Gray16,
        SynthPixelType::Gray32f => PixelType::Gray32Float,
    }
}

fn validate(config: &SynthConfig) -> Result<(), AppError> {
    if config.files == 0 || config.grid_cols == 0 || config.grid_rows == 0 || config.channels == 0 {
        return Err(AppError::new(2, "File count, grid size and channel count must be > 0."));
    }
    if config.tile_width < 2 || config.tile_height < 2 {
        return Err(AppError::new(2, "Tiles must be at least 2x2 pixels."));
    }
    if !(config.overlap.is_finite() && (0.0..0.9).contains(&config.overlap)) {
        return Err(AppError::new(2, "Overlap must be in [0, 0.9)."));
    }
    if !(config.vignette.is_finite() && (0.0..1.0).contains(&config.vignette)) {
        return Err(AppError::new(2, "Vignette strength must be in [0, 1)."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(2, "Noise must be a finite value >= 0."));
    }
    Ok(())
}

struct Blob {
    x: f64,
    y: f64,
    radius: f64,
    amplitude: Vec<f64>,
}

/// Random scene sampled in global (canvas) coordinates.
struct Scene {
    blobs: Vec<Blob>,
}

impl Scene {
    fn random(rng: &mut StdRng, width: f64, height: f64, channels: usize) -> Self {
        let scale = width.min(height).max(1.0);
        let blobs = (0..BLOBS)
            .map(|_| Blob {
                x: rng.gen_range(0.0..width.max(1.0)),
                y: rng.gen_range(0.0..height.max(1.0)),
                radius: rng.gen_range(0.08..0.25) * scale,
                amplitude: (0..channels).map(|_| rng.gen_range(0.1..0.6)).collect(),
            })
            .collect();
        Self { blobs }
    }

    fn value(&self, channel: usize, x: f64, y: f64) -> f64 {
        let mut v = BACKGROUND;
        for b in &self.blobs {
            let d2 = (x - b.x).powi(2) + (y - b.y).powi(2);
            v += b.amplitude[channel] * (-d2 / (2.0 * b.radius * b.radius)).exp();
        }
        v.min(1.0)
    }
}

/// Write `config.files` mosaic scans into `config.output_dir`.
pub fn generate_corpus(config: &SynthConfig) -> Result<SynthOutput, AppError> {
    validate(config)?;
    fs::create_dir_all(&config.output_dir).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create output folder '{}': {e}", config.output_dir.display()),
        )
    })?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0, config.noise).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let (tw, th) = (config.tile_width, config.tile_height);
    let step_x = ((tw as f64 * (1.0 - config.overlap)).round() as usize).max(1);
    let step_y = ((th as f64 * (1.0 - config.overlap)).round() as usize).max(1);
    let mosaic_w = step_x * (config.grid_cols - 1) + tw;
    let mosaic_h = step_y * (config.grid_rows - 1) + th;

    let profiles: Vec<Plane> = (0..config.channels)
        .map(|c| vignette_profile(th, tw, channel_strength(config.vignette, c)))
        .collect();
    let scale = full_scale(config.pixel_type);
    let pixel_type = czi_pixel_type(config.pixel_type);

    let mut files = Vec::with_capacity(config.files);
    for i in 0..config.files {
        let path = config.output_dir.join(format!("synth_{i:03}.czi"));
        let scene = Scene::random(&mut rng, mosaic_w as f64, mosaic_h as f64, config.channels);
        // Stage coordinates are arbitrary and often negative.
        let origin_x = -rng.gen_range(0..50_000i64);
        let origin_y = -rng.gen_range(0..50_000i64);

        let file = File::create(&path)
            .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
        let mut writer = CziWriter::new(BufWriter::new(file))?;

        for row in 0..config.grid_rows {
            for col in 0..config.grid_cols {
                let (gx, gy) = (col * step_x, row * step_y);
                let bbox = TileBox {
                    x: origin_x + gx as i64,
                    y: origin_y + gy as i64,
                    w: tw,
                    h: th,
                };
                for (c, profile) in profiles.iter().enumerate() {
                    let plane = Plane::from_fn(th, tw, |r, k| {
                        let v = scene.value(c, (gx + k) as f64, (gy + r) as f64) * profile[(r, k)] * scale;
                        (v + noise.sample(&mut rng)).max(0.0)
                    });
                    let placement = TilePlacement {
                        bbox,
                        channel: c as i32,
                        mosaic_index: Some((row * config.grid_cols + col) as i32),
                        scene: Some(0),
                    };
                    writer.write_tile(&placement, pixel_type, &plane)?;
                }
            }
        }
        writer.finish()?;
        tracing::info!(file = %path.display(), "synthetic scan written");
        files.push(path);
    }

    Ok(SynthOutput {
        files,
        profiles,
        tiles_per_file: config.grid_cols * config.grid_rows * config.channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::czi::CziFile;

    fn small_config(dir: &std::path::Path) -> SynthConfig {
        SynthConfig {
            output_dir: dir.to_path_buf(),
            files: 2,
            grid_cols: 3,
            grid_rows: 2,
            tile_width: 24,
            tile_height: 16,
            overlap: 0.25,
            channels: 2,
            seed: 7,
            vignette: 0.5,
            noise: 20.0,
            pixel_type: SynthPixelType::Gray16,
        }
    }

    #[test]
    fn profile_is_one_at_centre_and_falls_to_corners() {
        let p = vignette_profile(5, 5, 0.4);
        assert!((p[(2, 2)] - 1.0).abs() < 1e-12);
        assert!((p[(0, 0)] - 0.6).abs() < 1e-12);
        assert!((p[(4, 4)] - 0.6).abs() < 1e-12);
        assert!(p[(0, 2)] > p[(0, 0)]);
    }

    #[test]
    fn corpus_files_are_readable_mosaics() {
        let dir = tempfile::tempdir().unwrap();
        let out = generate_corpus(&small_config(dir.path())).unwrap();
        assert_eq!(out.files.len(), 2);
        assert_eq!(out.tiles_per_file, 12);

        let mut czi = CziFile::open(&out.files[0]).unwrap();
        assert!(czi.is_mosaic());
        assert_eq!(czi.channel_count(), 2);
        let tiles = czi.tiles().unwrap();
        assert_eq!(tiles.len(), 12);

        // Neighbouring columns are 18 px apart (24 * 0.75).
        assert_eq!(tiles[2].bbox.x - tiles[0].bbox.x, 18);
        let plane = czi.read_tile(&tiles[0]).unwrap();
        assert_eq!(plane.shape(), (16, 24));
        assert!(plane.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn estimate_recovers_the_vignetting_profile() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthConfig {
            output_dir: dir.path().to_path_buf(),
            files: 6,
            grid_cols: 4,
            grid_rows: 3,
            tile_width: 128,
            tile_height: 96,
            overlap: 0.1,
            channels: 2,
            seed: 42,
            vignette: 0.6,
            noise: 0.0,
            pixel_type: SynthPixelType::Gray16,
        };
        let out = generate_corpus(&config).unwrap();
        let estimate = crate::flatfield::estimate_bias_field(&out.files, 0.0).unwrap();
        let stats = crate::report::channel_stats(&estimate.field, &estimate.report.tiles_per_channel);

        for (c, profile) in out.profiles.iter().enumerate() {
            let field = &estimate.field.channels[c];
            let ratio = field.map(f64::from).component_div(profile);
            let mean = ratio.mean();
            let worst = ratio.iter().map(|r| (r / mean - 1.0).abs()).fold(0.0, f64::max);
            assert!(worst < 0.15, "channel {c}: field/profile varies by {worst}");

            let expected = 1.0 - channel_strength(config.vignette, c);
            assert!(
                (stats[c].corner_falloff - expected).abs() < 0.06,
                "channel {c}: falloff {} vs {expected}",
                stats[c].corner_falloff
            );
        }
    }

    #[test]
    fn same_seed_gives_same_bytes() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let mut config = small_config(a.path());
        config.files = 1;
        generate_corpus(&config).unwrap();
        config.output_dir = b.path().to_path_buf();
        generate_corpus(&config).unwrap();

        let read = |d: &std::path::Path| fs::read(d.join("synth_000.czi")).unwrap();
        assert_eq!(read(a.path()), read(b.path()));
    }

    #[test]
    fn rejects_bad_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path());
        config.overlap = 0.95;
        assert_eq!(generate_corpus(&config).unwrap_err().exit_code(), 2);
    }
}
