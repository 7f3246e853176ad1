//! Distance helpers shared by clustering, metrics and projection.

use ndarray::ArrayView1;

pub fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

pub fn squared_euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Rounds to `decimals` places through the decimal formatter: correctly
/// rounded on the exact binary value, ties to even. `91.125` becomes `91.12`.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rounded: f64 = format!("{value:.decimals$}").parse().unwrap_or(value);
    // Drop the sign of a rounded-away negative value.
    rounded + 0.0
}
