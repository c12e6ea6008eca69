//! Reductions with NaN / divide-by-zero conventions.

use std::cmp::Ordering;

/// Floating-point sample accepted by [`percentile`].
pub trait Sample: Copy {
    fn to_f64(self) -> f64;
    fn total_order(&self, other: &Self) -> Ordering;
}

impl Sample for f64 {
    fn to_f64(self) -> f64 {
        self
    }

    fn total_order(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn total_order(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

/// Sum ignoring NaN values.
pub fn nansum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().filter(|v| !v.is_nan()).sum()
}

/// `a / b`, with non-finite results (x/0, 0/0, NaN) mapped to zero.
pub fn safe_div(a: f64, b: f64) -> f64 {
    let v = a / b;
    if v.is_finite() { v } else { 0.0 }
}

pub fn safe_div32(a: f32, b: f32) -> f32 {
    let v = a / b;
    if v.is_finite() { v } else { 0.0 }
}

/// Percentile `q` (0..=100) with linear interpolation between closest ranks.
///
/// NaN samples are ignored; an empty input yields `0.0`.
pub fn percentile<T: Sample, I: IntoIterator<Item = T>>(values: I, q: f64) -> f64 {
    let mut data: Vec<T> = values.into_iter().filter(|v| !v.to_f64().is_nan()).collect();
    let n = data.len();
    if n == 0 {
        return 0.0;
    }

    let rank = q.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let frac = rank - lo as f64;

    let (_, lo_value, upper) = data.select_nth_unstable_by(lo, T::total_order);
    let lo_value = lo_value.to_f64();
    if frac == 0.0 || upper.is_empty() {
        return lo_value;
    }
    let hi_value = upper
        .iter()
        .map(|v| v.to_f64())
        .fold(f64::INFINITY, f64::min);
    lo_value + (hi_value - lo_value) * frac
}

/// Min / max / mean over the finite samples of a plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

pub fn summarize<I: IntoIterator<Item = f64>>(values: I) -> Summary {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
        sum += v;
        n += 1;
    }
    if n == 0 {
        return Summary {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
        };
    }
    Summary {
        min,
        max,
        mean: sum / n as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(v, 50.0), 2.5);
        assert_eq!(percentile(v, 0.0), 1.0);
        assert_eq!(percentile(v, 100.0), 4.0);
        // rank = 0.999 * 3 = 2.997
        assert!((percentile(v, 99.9) - 3.997).abs() < 1e-12);
    }

    #[test]
    fn percentile_ignores_nan_and_handles_empty() {
        let v = [f64::NAN, 10.0, f64::NAN, 20.0];
        assert_eq!(percentile(v, 50.0), 15.0);
        assert_eq!(percentile(Vec::<f32>::new(), 99.0), 0.0);
        assert_eq!(percentile([7.0f32], 99.0), 7.0);
    }

    #[test]
    fn nansum_skips_nan() {
        assert_eq!(nansum([1.0, f64::NAN, 2.5]), 3.5);
        assert_eq!(nansum(Vec::new()), 0.0);
    }

    #[test]
    fn divide_by_zero_yields_zero() {
        assert_eq!(safe_div(1.0, 0.0), 0.0);
        assert_eq!(safe_div(0.0, 0.0), 0.0);
        assert_eq!(safe_div(6.0, 3.0), 2.0);
        assert_eq!(safe_div32(-1.0, 0.0), 0.0);
    }

    #[test]
    fn summary_skips_non_finite() {
        let s = summarize([1.0, f64::INFINITY, 3.0, f64::NAN]);
        assert_eq!(s, Summary { min: 1.0, max: 3.0, mean: 2.0 });
        assert_eq!(summarize(Vec::new()).mean, 0.0);
    }
}
