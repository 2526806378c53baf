//! Single-optimum test functions.

use ndarray::Array1;

/// Sphere function: `f(x) = sum(x_i^2)`.
///
/// Global minimum f(0, ..., 0) = 0. N-dimensional.
pub fn sphere(x: &Array1<f64>) -> f64 {
    x.iter().map(|&xi| xi * xi).sum()
}

/// Rosenbrock function: `f(x) = sum(100 (x_{i+1} - x_i^2)^2 + (1 - x_i)^2)`.
///
/// Global minimum f(1, ..., 1) = 0; a narrow curved valley makes the
/// approach to the optimum slow. N-dimensional.
pub fn rosenbrock(x: &Array1<f64>) -> f64 {
    (0..x.len() - 1)
        .map(|i| {
            let a = x[i + 1] - x[i] * x[i];
            let b = 1.0 - x[i];
            100.0 * a * a + b * b
        })
        .sum()
}

/// Paired deviation: `f(x) = (x_0 - x_1)^2 + sum_{i >= 2}(x_i^2)`.
///
/// The first two coordinates only have to agree, so the minimizers form
/// the line x_0 = x_1 with the remaining coordinates at zero. Useful for
/// exercising pairwise-collapse diagnostics.
pub fn paired_deviation(x: &Array1<f64>) -> f64 {
    let pair = x[0] - x[1];
    pair * pair + x.iter().skip(2).map(|&xi| xi * xi).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sphere() {
        assert_eq!(sphere(&array![0.0, 0.0, 0.0]), 0.0);
        assert_eq!(sphere(&array![1.0, -2.0]), 5.0);
    }

    #[test]
    fn test_rosenbrock() {
        assert_eq!(rosenbrock(&array![1.0, 1.0]), 0.0);
        assert_eq!(rosenbrock(&array![0.0, 0.0]), 1.0);
    }

    #[test]
    fn test_paired_deviation_valley() {
        assert_eq!(paired_deviation(&array![3.0, 3.0, 0.0, 0.0]), 0.0);
        assert_eq!(paired_deviation(&array![1.0, 0.0, 2.0, 0.0]), 5.0);
    }
}
