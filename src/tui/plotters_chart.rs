//! Plotters-powered centre-line profile chart for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::domain::Plane32;

/// Horizontal (centre row) and vertical (centre column) profiles of a plane.
///
/// X is the position along the line as a fraction of its length (`0..=1`),
/// so both profiles share one axis regardless of the tile's aspect ratio.
pub fn centre_profiles(plane: &Plane32) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let (h, w) = plane.shape();
    if h == 0 || w == 0 {
        return (Vec::new(), Vec::new());
    }
    let frac = |i: usize, n: usize| if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
    let horizontal = (0..w).map(|c| (frac(c, w), f64::from(plane[(h / 2, c)]))).collect();
    let vertical = (0..h).map(|r| (frac(r, h), f64::from(plane[(r, w / 2)]))).collect();
    (horizontal, vertical)
}

/// Y bounds covering every finite value with 5% padding; degenerate ranges are widened.
pub fn profile_bounds(series: &[&[(f64, f64)]]) -> [f64; 2] {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &(_, y) in series.iter().flat_map(|s| s.iter()) {
        if y.is_finite() {
            lo = lo.min(y);
            hi = hi.max(y);
        }
    }
    if !(lo.is_finite() && hi.is_finite()) {
        return [0.0, 1.0];
    }
    let pad = (hi - lo) * 0.05;
    if pad > 0.0 {
        return [lo - pad, hi + pad];
    }
    let widen = if lo != 0.0 { lo.abs() * 0.05 } else { 1.0 };
    [lo - widen, hi + widen]
}

/// A lightweight, render-only chart description.
///
/// All series and bounds are computed outside the render call.
pub struct ProfileChart<'a> {
    pub horizontal: &'a [(f64, f64)],
    pub vertical: &'a [(f64, f64)],
    pub y_bounds: [f64; 2],
    pub fmt_y: fn(f64) -> String,
}

/// Colour of the horizontal profile line.
pub const HORIZONTAL_COLOR: Color = Color::Cyan;
/// Colour of the vertical profile line.
pub const VERTICAL_COLOR: Color = Color::Magenta;

impl Widget for ProfileChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        // In that case, we render a small hint rather than panicking.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [y0, y1] = self.y_bounds;
        if !(y0.is_finite() && y1.is_finite()) || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(0.0..1.0, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| format!("{v:.2}"))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            chart.draw_series(LineSeries::new(self.horizontal.iter().copied(), &RGBColor(0, 255, 255)))?;
            chart.draw_series(LineSeries::new(self.vertical.iter().copied(), &RGBColor(255, 0, 255)))?;

            Ok(())
        });

        widget.render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_follow_centre_row_and_column() {
        let plane = Plane32::from_fn(3, 5, |r, c| (r * 10 + c) as f32);
        let (h, v) = centre_profiles(&plane);
        assert_eq!(h.len(), 5);
        assert_eq!(v.len(), 3);
        assert_eq!(h[0], (0.0, 10.0));
        assert_eq!(h[4], (1.0, 14.0));
        assert_eq!(v[1], (0.5, 12.0));
    }

    #[test]
    fn bounds_are_padded_and_never_empty() {
        let a = [(0.0, 1.0), (1.0, 3.0)];
        let [lo, hi] = profile_bounds(&[&a[..]]);
        assert!((lo - 0.9).abs() < 1e-12 && (hi - 3.1).abs() < 1e-12);

        let flat = [(0.0, 2.0), (1.0, 2.0)];
        assert_eq!(profile_bounds(&[&flat[..]]), [1.9, 2.1]);
        assert_eq!(profile_bounds(&[]), [0.0, 1.0]);
    }
}
