//! Separable Gaussian low-pass filter.
//!
//! Matches the common scientific-Python behavior:
//!
//! - kernel radius `floor(truncate * sigma + 0.5)`, `truncate = 4`
//! - reflect boundary mode (`d c b a | a b c d | d c b a`)
//!
//! Each 1-D pass runs over the contiguous columns of the column-major
//! `DMatrix` storage; the horizontal pass filters the transpose.

use rayon::prelude::*;

use crate::domain::Plane;

pub const DEFAULT_TRUNCATE: f64 = 4.0;

/// Normalized 1-D Gaussian kernel of length `2 * radius + 1`.
pub fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    let radius = (truncate * sigma + 0.5).floor().max(0.0) as i64;
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|i| {
            let x = i as f64;
            (-(x * x) / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Map an out-of-range index into `0..n` by half-sample reflection.
pub fn reflect_index(i: i64, n: usize) -> usize {
    let n = n as i64;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n { m as usize } else { (period - 1 - m) as usize }
}

/// Gaussian-filter a plane. `sigma <= 0` (or an empty plane) returns a copy.
pub fn gaussian_filter(plane: &Plane, sigma: f64) -> Plane {
    if !(sigma > 0.0) || plane.is_empty() {
        return plane.clone();
    }
    let kernel = gaussian_kernel(sigma, DEFAULT_TRUNCATE);

    let vertical = filter_columns(plane.clone(), &kernel);
    filter_columns(vertical.transpose(), &kernel).transpose()
}

fn filter_columns(mut plane: Plane, kernel: &[f64]) -> Plane {
    let nrows = plane.nrows();
    plane
        .as_mut_slice()
        .par_chunks_mut(nrows)
        .for_each(|column| convolve_reflect(column, kernel));
    plane
}

fn convolve_reflect(line: &mut [f64], kernel: &[f64]) {
    let n = line.len();
    let radius = kernel.len() / 2;
    let padded: Vec<f64> = (0..n + 2 * radius)
        .map(|i| line[reflect_index(i as i64 - radius as i64, n)])
        .collect();

    for (i, out) in line.iter_mut().enumerate() {
        *out = padded[i..i + kernel.len()]
            .iter()
            .zip(kernel)
            .map(|(v, w)| v * w)
            .sum();
    }
}
