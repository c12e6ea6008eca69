//! Downsampled RGB JPEG preview of a corrected mosaic.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, Rgb32FImage, RgbImage};

use crate::domain::CorrectedMosaic;
use crate::error::AppError;
use crate::math::{percentile, safe_div32};

/// Render the first `min(3, C)` channels as RGB, normalized so the `q`-th
/// percentile of the RGB array maps to white, and downsampled by `scale`.
pub fn render_preview(mosaic: &CorrectedMosaic, q: f64, scale: u32) -> Result<RgbImage, AppError> {
    let w = u32::try_from(mosaic.width)
        .map_err(|_| AppError::new(3, "Mosaic is too wide for a preview image."))?;
    let h = u32::try_from(mosaic.height)
        .map_err(|_| AppError::new(3, "Mosaic is too tall for a preview image."))?;
    if w == 0 || h == 0 {
        return Err(AppError::new(3, "Cannot render a preview of an empty mosaic."));
    }

    let used = mosaic.channel_count().min(3);
    let sample = |c: usize, i: usize| -> f32 {
        if c < used {
            f32::from(mosaic.channels[c][i]) / 65535.0
        } else {
            0.0
        }
    };

    let max_val = percentile(
        (0..mosaic.width * mosaic.height).flat_map(|i| (0..3).map(move |c| sample(c, i))),
        q,
    ) as f32;

    let width = mosaic.width;
    let rgb = Rgb32FImage::from_fn(w, h, |x, y| {
        let i = y as usize * width + x as usize;
        Rgb([0, 1, 2].map(|c| safe_div32(sample(c, i), max_val).clamp(0.0, 1.0)))
    });

    let scale = scale.max(1);
    let (nw, nh) = ((w / scale).max(1), (h / scale).max(1));
    let small = imageops::resize(&rgb, nw, nh, FilterType::Triangle);

    Ok(RgbImage::from_fn(nw, nh, |x, y| {
        let p = small.get_pixel(x, y);
        Rgb(p.0.map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8))
    }))
}

/// Render and save the preview as JPEG.
pub fn write_preview(path: &Path, mosaic: &CorrectedMosaic, q: f64, scale: u32) -> Result<(), AppError> {
    let img = render_preview(mosaic, q, scale)?;
    img.save_with_format(path, ImageFormat::Jpeg)
        .map_err(|e| AppError::new(2, format!("Failed to write preview '{}': {e}", path.display())))?;
    tracing::debug!(path = %path.display(), width = img.width(), height = img.height(), "preview written");
    Ok(())
}
