//! Mosaic canvas: place tiles at their stage positions and average overlaps.

use crate::domain::{Plane32, TileBox};
use crate::error::AppError;
use crate::math::safe_div32;

/// Per-channel sum and weight planes covering the union of all tile boxes.
#[derive(Debug, Clone)]
pub struct Canvas {
    origin_x: i64,
    origin_y: i64,
    width: usize,
    height: usize,
    sum: Vec<Plane32>,
    weight: Vec<Plane32>,
}

impl Canvas {
    /// Size the canvas so every box fits after shifting by `(min x, min y)`.
    pub fn for_tiles<I>(channels: usize, boxes: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = TileBox>,
    {
        let boxes: Vec<TileBox> = boxes.into_iter().collect();
        if boxes.is_empty() {
            return Err(AppError::new(3, "No tiles to stitch."));
        }

        let origin_x = boxes.iter().map(|b| b.x).min().unwrap_or(0);
        let origin_y = boxes.iter().map(|b| b.y).min().unwrap_or(0);
        let width = boxes
            .iter()
            .map(|b| (b.x - origin_x) as usize + b.w)
            .max()
            .unwrap_or(0);
        let height = boxes
            .iter()
            .map(|b| (b.y - origin_y) as usize + b.h)
            .max()
            .unwrap_or(0);

        Ok(Self {
            origin_x,
            origin_y,
            width,
            height,
            sum: vec![Plane32::zeros(height, width); channels],
            weight: vec![Plane32::zeros(height, width); channels],
        })
    }

    pub fn origin(&self) -> (i64, i64) {
        (self.origin_x, self.origin_y)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channel_count(&self) -> usize {
        self.sum.len()
    }

    /// Add a corrected tile; non-zero pixels also add one unit of weight.
    pub fn add(&mut self, channel: usize, bbox: TileBox, tile: &Plane32) -> Result<(), AppError> {
        if channel >= self.sum.len() {
            return Err(AppError::new(
                3,
                format!("Channel {channel} is outside the {}-channel canvas.", self.sum.len()),
            ));
        }
        if tile.shape() != (bbox.h, bbox.w) {
            return Err(AppError::new(
                4,
                format!(
                    "Tile data is {}x{} but its box is {}x{}.",
                    tile.ncols(),
                    tile.nrows(),
                    bbox.w,
                    bbox.h
                ),
            ));
        }

        let outside = || AppError::new(4, format!("Tile box {bbox:?} lies outside the canvas."));
        if bbox.x < self.origin_x || bbox.y < self.origin_y {
            return Err(outside());
        }
        let x0 = (bbox.x - self.origin_x) as usize;
        let y0 = (bbox.y - self.origin_y) as usize;
        if x0 + bbox.w > self.width || y0 + bbox.h > self.height {
            return Err(outside());
        }

        let sum = &mut self.sum[channel];
        let weight = &mut self.weight[channel];
        for col in 0..bbox.w {
            for row in 0..bbox.h {
                let v = tile[(row, col)];
                sum[(y0 + row, x0 + col)] += v;
                if v != 0.0 {
                    weight[(y0 + row, x0 + col)] += 1.0;
                }
            }
        }
        Ok(())
    }

    /// Divide sums by weights; uncovered or zero-weight pixels become 0.
    pub fn blend(self) -> Vec<Plane32> {
        self.sum
            .iter()
            .zip(self.weight.iter())
            .map(|(sum, weight)| sum.zip_map(weight, safe_div32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(w: usize, h: usize, v: f32) -> Plane32 {
        Plane32::from_element(h, w, v)
    }

    #[test]
    fn canvas_is_shifted_to_the_minimum_corner() {
        let canvas = Canvas::for_tiles(
            1,
            [
                TileBox { x: -100, y: 50, w: 10, h: 8 },
                TileBox { x: -95, y: 40, w: 10, h: 8 },
            ],
        )
        .unwrap();
        assert_eq!(canvas.origin(), (-100, 40));
        assert_eq!(canvas.width(), 15);
        assert_eq!(canvas.height(), 18);
    }

    #[test]
    fn overlaps_are_averaged() {
        let a = TileBox { x: 0, y: 0, w: 4, h: 2 };
        let b = TileBox { x: 2, y: 0, w: 4, h: 2 };
        let mut canvas = Canvas::for_tiles(1, [a, b]).unwrap();
        canvas.add(0, a, &tile(4, 2, 2.0)).unwrap();
        canvas.add(0, b, &tile(4, 2, 4.0)).unwrap();

        let out = canvas.blend();
        let row: Vec<f32> = (0..6).map(|c| out[0][(0, c)]).collect();
        assert_eq!(row, vec![2.0, 2.0, 3.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn zero_pixels_carry_no_weight() {
        let a = TileBox { x: 0, y: 0, w: 2, h: 1 };
        let b = TileBox { x: 1, y: 0, w: 2, h: 1 };
        let mut canvas = Canvas::for_tiles(1, [a, b]).unwrap();
        canvas.add(0, a, &Plane32::from_row_slice(1, 2, &[5.0, 0.0])).unwrap();
        canvas.add(0, b, &Plane32::from_row_slice(1, 2, &[8.0, 0.0])).unwrap();

        let out = canvas.blend();
        // Column 1: 0 + 8 over one weighted sample; column 2 never got weight.
        assert_eq!(out[0][(0, 0)], 5.0);
        assert_eq!(out[0][(0, 1)], 8.0);
        assert_eq!(out[0][(0, 2)], 0.0);
    }

    #[test]
    fn uncovered_pixels_blend_to_zero() {
        let a = TileBox { x: 0, y: 0, w: 1, h: 1 };
        let b = TileBox { x: 2, y: 2, w: 1, h: 1 };
        let mut canvas = Canvas::for_tiles(2, [a, b]).unwrap();
        canvas.add(1, b, &tile(1, 1, 7.0)).unwrap();

        let out = canvas.blend();
        assert_eq!(out[1][(2, 2)], 7.0);
        assert_eq!(out[1][(1, 1)], 0.0);
        assert!(out[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn rejects_bad_channel_and_shape() {
        let a = TileBox { x: 0, y: 0, w: 2, h: 2 };
        let mut canvas = Canvas::for_tiles(1, [a]).unwrap();
        assert_eq!(canvas.add(1, a, &tile(2, 2, 1.0)).unwrap_err().exit_code(), 3);
        assert!(canvas.add(0, a, &tile(3, 2, 1.0)).is_err());
        assert!(Canvas::for_tiles(1, Vec::new()).is_err());
    }
}
