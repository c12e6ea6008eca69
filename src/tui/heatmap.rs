//! Half-block heatmap widget: two image rows per terminal cell.
//!
//! Each cell draws `▀` with the upper pixel as foreground and the lower pixel
//! as background colour, which gives roughly square pixels in most terminals.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::domain::Plane32;

const UPPER_HALF: &str = "▀";

/// Colour stops of the ramp (dark blue → teal → yellow), evenly spaced.
const RAMP: [(u8, u8, u8); 5] = [
    (68, 1, 84),
    (59, 82, 139),
    (33, 145, 140),
    (94, 201, 98),
    (253, 231, 37),
];

/// Map `t` in `[0, 1]` onto the colour ramp; out-of-range values are clamped.
pub fn colormap(t: f32) -> (u8, u8, u8) {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (RAMP.len() - 1) as f32;
    let i = (scaled.floor() as usize).min(RAMP.len() - 2);
    let f = scaled - i as f32;
    let (a, b) = (RAMP[i], RAMP[i + 1]);
    let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * f).round() as u8;
    (lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

/// Render-only heatmap of one plane, scaled to fit while keeping its aspect ratio.
pub struct Heatmap<'a> {
    pub plane: &'a Plane32,
    /// Value mapped to the bottom of the ramp.
    pub lo: f32,
    /// Value mapped to the top of the ramp.
    pub hi: f32,
}

impl Heatmap<'_> {
    fn color_at(&self, row: usize, col: usize) -> Color {
        let v = self.plane[(row, col)];
        let span = self.hi - self.lo;
        let t = if span > 0.0 { (v - self.lo) / span } else { 0.5 };
        let (r, g, b) = colormap(t);
        Color::Rgb(r, g, b)
    }
}

impl Widget for Heatmap<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (h, w) = self.plane.shape();
        if h == 0 || w == 0 || area.width == 0 || area.height == 0 {
            return;
        }

        // Source pixels per output pixel; output rows are half cells.
        let scale = (w as f64 / area.width as f64).max(h as f64 / (area.height as f64 * 2.0));
        let out_w = ((w as f64 / scale).floor() as u16).clamp(1, area.width);
        let out_h = ((h as f64 / scale).floor() as usize).clamp(1, area.height as usize * 2);

        let sample = |out: usize, len: usize| ((out as f64 + 0.5) * scale).floor().min(len as f64 - 1.0) as usize;

        for cy in 0..out_h.div_ceil(2) {
            for cx in 0..out_w {
                let col = sample(cx as usize, w);
                let top = self.color_at(sample(cy * 2, h), col);
                let bottom_row = cy * 2 + 1;
                let bottom = if bottom_row < out_h {
                    self.color_at(sample(bottom_row, h), col)
                } else {
                    Color::Reset
                };
                buf.set_string(
                    area.x + cx,
                    area.y + cy as u16,
                    UPPER_HALF,
                    Style::default().fg(top).bg(bottom),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_endpoints_and_clamping() {
        assert_eq!(colormap(0.0), RAMP[0]);
        assert_eq!(colormap(1.0), RAMP[4]);
        assert_eq!(colormap(-3.0), RAMP[0]);
        assert_eq!(colormap(7.0), RAMP[4]);
        assert_eq!(colormap(f32::NAN), RAMP[0]);
        assert_eq!(colormap(0.5), RAMP[2]);
    }

    #[test]
    fn renders_two_rows_per_cell() {
        // 4 rows x 2 cols: top half dark, bottom half bright.
        let plane = Plane32::from_fn(4, 2, |r, _| if r < 2 { 0.0 } else { 1.0 });
        let area = Rect::new(0, 0, 2, 2);
        let mut buf = Buffer::empty(area);
        Heatmap { plane: &plane, lo: 0.0, hi: 1.0 }.render(area, &mut buf);

        let (r0, g0, b0) = RAMP[0];
        let (r1, g1, b1) = RAMP[4];
        let top = &buf[(0, 0)];
        assert_eq!(top.symbol(), UPPER_HALF);
        assert_eq!(top.fg, Color::Rgb(r0, g0, b0));
        assert_eq!(top.bg, Color::Rgb(r0, g0, b0));
        let bottom = &buf[(1, 1)];
        assert_eq!(bottom.fg, Color::Rgb(r1, g1, b1));
    }

    #[test]
    fn large_planes_are_downsampled_into_the_area() {
        let plane = Plane32::from_element(100, 300, 1.0);
        let area = Rect::new(0, 0, 30, 10);
        let mut buf = Buffer::empty(area);
        Heatmap { plane: &plane, lo: 0.0, hi: 2.0 }.render(area, &mut buf);

        // Width-limited: 300 px -> 30 cells, 100 px -> 10 half rows = 5 cells.
        assert_eq!(buf[(29, 4)].symbol(), UPPER_HALF);
        assert_eq!(buf[(29, 5)].symbol(), " ");
    }
}
