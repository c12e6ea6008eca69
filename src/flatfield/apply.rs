//! Bias-field correction: divide tiles by the field, stitch, blend, rescale to 16 bit.

use std::io::{Read, Seek};

use rayon::prelude::*;

use crate::czi::CziFile;
use crate::domain::{BiasField, CorrectedMosaic, Plane, Plane32};
use crate::error::AppError;
use crate::flatfield::stitch::Canvas;
use crate::math::{percentile, safe_div32};

/// Tiles between two progress log lines.
const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub tiles: usize,
    pub channels: usize,
    pub width: usize,
    pub height: usize,
    pub origin: (i64, i64),
    /// Value mapped to full scale (65535).
    pub max_val: f64,
    pub percentile: f64,
}

#[derive(Debug, Clone)]
pub struct ApplyOutput {
    pub mosaic: CorrectedMosaic,
    pub report: ApplyReport,
}

/// Divide a tile by the bias plane of its channel; non-finite results become 0.
pub fn correct_tile(tile: &Plane, bias: &Plane32) -> Plane32 {
    tile.zip_map(bias, |t, b| safe_div32(t as f32, b))
}

/// Correct, stitch, and rescale every layer-0 tile of `czi`.
pub fn apply_bias_field<R: Read + Seek>(
    czi: &mut CziFile<R>,
    field: &BiasField,
    q: f64,
) -> Result<ApplyOutput, AppError> {
    let channels = czi.channel_count();
    if channels != field.channel_count() {
        return Err(AppError::new(
            3,
            format!(
                "Mismatch in number of channels between flat field ({}) and CZI file ({channels}).",
                field.channel_count()
            ),
        ));
    }

    let tiles = czi.tiles()?;
    if tiles.is_empty() {
        return Err(AppError::new(3, format!("No tiles found in {}.", czi.name().display())));
    }

    let mut canvas = Canvas::for_tiles(channels, tiles.iter().map(|t| t.bbox))?;
    tracing::info!(
        tiles = tiles.len(),
        width = canvas.width(),
        height = canvas.height(),
        "applying flat field"
    );

    let expected = (field.height(), field.width());
    for (i, tile) in tiles.iter().enumerate() {
        let plane = czi.read_tile(tile)?;
        if plane.shape() != expected {
            return Err(AppError::new(
                3,
                format!(
                    "Tile {i} is {}x{} but the flat field is {}x{}.",
                    plane.ncols(),
                    plane.nrows(),
                    expected.1,
                    expected.0
                ),
            ));
        }
        let corrected = correct_tile(&plane, &field.channels[tile.channel]);
        canvas.add(tile.channel, tile.bbox, &corrected)?;

        if (i + 1) % PROGRESS_EVERY == 0 || i + 1 == tiles.len() {
            tracing::info!(done = i + 1, total = tiles.len(), "tiles corrected");
        }
    }

    let origin = canvas.origin();
    let (width, height) = (canvas.width(), canvas.height());
    let blended = canvas.blend();
    let (channels_u16, max_val) = rescale_to_u16(&blended, q);

    Ok(ApplyOutput {
        mosaic: CorrectedMosaic {
            width,
            height,
            channels: channels_u16,
        },
        report: ApplyReport {
            tiles: tiles.len(),
            channels,
            width,
            height,
            origin,
            max_val,
            percentile: q,
        },
    })
}

/// Map the `q`-th percentile (over all channels) to 65535 and clip.
///
/// Returns row-major channels and the percentile value. A zero or non-finite
/// percentile yields an all-zero mosaic.
pub fn rescale_to_u16(planes: &[Plane32], q: f64) -> (Vec<Vec<u16>>, f64) {
    let max_val = percentile(planes.iter().flat_map(|p| p.iter().copied()), q);
    let usable = max_val.is_finite() && max_val > 0.0;
    if !usable {
        tracing::warn!(max_val, "percentile is not positive; output will be black");
    }

    let scale = max_val as f32;
    let channels = planes
        .par_iter()
        .map(|plane| {
            let (h, w) = plane.shape();
            let mut out = Vec::with_capacity(h * w);
            for r in 0..h {
                for c in 0..w {
                    let v = if usable {
                        (plane[(r, c)] / scale).clamp(0.0, 1.0) * 65535.0
                    } else {
                        0.0
                    };
                    out.push(v as u16);
                }
            }
            out
        })
        .collect();

    (channels, max_val)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::czi::{CziWriter, PixelType, TilePlacement};
    use crate::domain::TileBox;

    #[test]
    fn correction_divides_and_zeroes_non_finite() {
        let tile = Plane::from_row_slice(1, 3, &[10.0, 5.0, 0.0]);
        let bias = Plane32::from_row_slice(1, 3, &[2.0, 0.0, 0.0]);
        let out = correct_tile(&tile, &bias);
        assert_eq!(out, Plane32::from_row_slice(1, 3, &[5.0, 0.0, 0.0]));
    }

    #[test]
    fn rescale_clips_above_percentile() {
        let plane = Plane32::from_row_slice(1, 4, &[0.0, 1.0, 2.0, 4.0]);
        let (out, max_val) = rescale_to_u16(&[plane], 50.0);
        assert_eq!(max_val, 1.5);
        // 1/1.5 * 65535 = 43690 (truncated); 2 and 4 clip to full scale.
        assert_eq!(out[0], vec![0, 43690, 65535, 65535]);
    }

    #[test]
    fn rescale_of_black_canvas_is_black() {
        let plane = Plane32::zeros(2, 2);
        let (out, max_val) = rescale_to_u16(&[plane], 99.9);
        assert_eq!(max_val, 0.0);
        assert!(out[0].iter().all(|&v| v == 0));
    }

    fn two_tile_scan() -> Vec<u8> {
        let mut writer = CziWriter::new(Cursor::new(Vec::new())).unwrap();
        for (m, x) in [(0, 100), (1, 103)] {
            let placement = TilePlacement {
                bbox: TileBox { x, y: -7, w: 4, h: 2 },
                channel: 0,
                mosaic_index: Some(m),
                scene: Some(0),
            };
            writer
                .write_tile(&placement, PixelType::Gray16, &Plane::from_element(2, 4, 100.0))
                .unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn uniform_scan_through_matching_field_is_flat() {
        let mut czi = CziFile::from_reader("scan.czi", Cursor::new(two_tile_scan())).unwrap();
        let field = BiasField {
            channels: vec![Plane32::from_element(2, 4, 0.5)],
        };
        let out = apply_bias_field(&mut czi, &field, 99.9).unwrap();

        assert_eq!(out.report.origin, (100, -7));
        assert_eq!((out.mosaic.width, out.mosaic.height), (7, 2));
        assert_eq!(out.report.max_val, 200.0);
        assert!(out.mosaic.channels[0].iter().all(|&v| v == 65535));
    }

    #[test]
    fn channel_mismatch_is_rejected() {
        let mut czi = CziFile::from_reader("scan.czi", Cursor::new(two_tile_scan())).unwrap();
        let field = BiasField {
            channels: vec![Plane32::from_element(2, 4, 1.0); 3],
        };
        let err = apply_bias_field(&mut czi, &field, 99.9).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().starts_with("Mismatch in number of channels"));
    }

    #[test]
    fn tile_shape_must_match_field() {
        let mut czi = CziFile::from_reader("scan.czi", Cursor::new(two_tile_scan())).unwrap();
        let field = BiasField {
            channels: vec![Plane32::from_element(4, 4, 1.0)],
        };
        assert!(apply_bias_field(&mut czi, &field, 99.9).is_err());
    }
}
