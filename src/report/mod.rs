//! Reporting utilities: per-channel bias-field statistics and terminal summaries.

use serde::{Deserialize, Serialize};

use crate::domain::{BiasField, Plane32};
use crate::math::{safe_div, summarize};

pub mod format;

pub use format::*;

/// Shape of the illumination profile of one bias-field channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel: usize,
    pub tiles: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub center: f64,
    /// Mean of the four corner values divided by the centre value.
    pub corner_falloff: f64,
}

/// Compute [`ChannelStats`] for every channel; `tiles` may be shorter than the
/// channel list (missing counts are reported as 0).
pub fn channel_stats(field: &BiasField, tiles: &[usize]) -> Vec<ChannelStats> {
    field
        .channels
        .iter()
        .enumerate()
        .map(|(channel, plane)| {
            let summary = summarize(plane.iter().map(|&v| f64::from(v)));
            let center = center_value(plane);
            ChannelStats {
                channel,
                tiles: tiles.get(channel).copied().unwrap_or(0),
                min: summary.min,
                max: summary.max,
                mean: summary.mean,
                center,
                corner_falloff: safe_div(corner_mean(plane), center),
            }
        })
        .collect()
}

fn center_value(plane: &Plane32) -> f64 {
    let (h, w) = plane.shape();
    if h == 0 || w == 0 {
        return 0.0;
    }
    f64::from(plane[(h / 2, w / 2)])
}

fn corner_mean(plane: &Plane32) -> f64 {
    let (h, w) = plane.shape();
    if h == 0 || w == 0 {
        return 0.0;
    }
    let corners = [(0, 0), (0, w - 1), (h - 1, 0), (h - 1, w - 1)];
    corners.iter().map(|&rc| f64::from(plane[rc])).sum::<f64>() / 4.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vignetted_channel_has_falloff_below_one() {
        // Bright centre, dim corners.
        let plane = Plane32::from_fn(5, 5, |r, c| {
            let d = (r as f32 - 2.0).abs() + (c as f32 - 2.0).abs();
            1.0 - 0.1 * d
        });
        let field = BiasField { channels: vec![plane] };
        let stats = channel_stats(&field, &[12]);

        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].tiles, 12);
        assert!((stats[0].center - 1.0).abs() < 1e-6);
        assert!((stats[0].corner_falloff - 0.6).abs() < 1e-6);
        assert!((stats[0].min - 0.6).abs() < 1e-6);
    }

    #[test]
    fn empty_channel_reports_zero_falloff() {
        let field = BiasField {
            channels: vec![Plane32::zeros(3, 3), Plane32::from_element(3, 3, 2.0)],
        };
        let stats = channel_stats(&field, &[]);
        assert_eq!(stats[0].corner_falloff, 0.0);
        assert_eq!(stats[1].corner_falloff, 1.0);
        assert_eq!(stats[1].tiles, 0);
    }
}
