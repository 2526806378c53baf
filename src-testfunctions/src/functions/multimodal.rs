//! Test functions with many local minima.

use ndarray::Array1;
use std::f64::consts::PI;

/// Rastrigin function:
/// `f(x) = 10 n + sum(x_i^2 - 10 cos(2 pi x_i))`.
///
/// Global minimum f(0, ..., 0) = 0 inside a regular grid of local minima.
/// N-dimensional, usually evaluated on [-5.12, 5.12].
pub fn rastrigin(x: &Array1<f64>) -> f64 {
    10.0 * x.len() as f64
        + x.iter()
            .map(|&xi| xi * xi - 10.0 * (2.0 * PI * xi).cos())
            .sum::<f64>()
}

/// Ackley function:
/// `f(x) = -20 exp(-0.2 sqrt(mean(x_i^2))) - exp(mean(cos(2 pi x_i))) + 20 + e`.
///
/// Global minimum f(0, ..., 0) = 0 at the bottom of a nearly flat outer
/// region. N-dimensional, usually evaluated on [-32.768, 32.768].
pub fn ackley(x: &Array1<f64>) -> f64 {
    let n = x.len() as f64;
    let sum_sq: f64 = x.iter().map(|&xi| xi * xi).sum();
    let sum_cos: f64 = x.iter().map(|&xi| (2.0 * PI * xi).cos()).sum();
    -20.0 * (-0.2 * (sum_sq / n).sqrt()).exp() - (sum_cos / n).exp() + 20.0 + std::f64::consts::E
}
