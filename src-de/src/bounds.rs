//! Box-constraint helpers.
//!
//! Two wrapping modes around a cost function: the *hard* form rejects
//! out-of-range candidates with `+inf` without ever calling the cost, and
//! the *clipping* form projects into the box first. The solvers use the
//! hard form in the main loop and clip only the initial population.

use ndarray::Array1;

/// Componentwise containment in `[lower, upper]`.
pub fn contains(x: &Array1<f64>, lower: &Array1<f64>, upper: &Array1<f64>) -> bool {
    x.iter()
        .zip(lower.iter().zip(upper.iter()))
        .all(|(&xi, (&lo, &hi))| xi >= lo && xi <= hi)
}

/// Project `x` into `[lower, upper]` componentwise.
pub fn clip_inplace(x: &mut Array1<f64>, lower: &Array1<f64>, upper: &Array1<f64>) {
    for i in 0..x.len() {
        if x[i] < lower[i] {
            x[i] = lower[i];
        }
        if x[i] > upper[i] {
            x[i] = upper[i];
        }
    }
}

/// Hard bounds: out-of-range inputs yield `+inf` and the cost is not called.
pub fn wrap_bounds_hard<F>(
    func: F,
    lower: Array1<f64>,
    upper: Array1<f64>,
) -> impl Fn(&Array1<f64>) -> f64 + Sync
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    move |x: &Array1<f64>| {
        if contains(x, &lower, &upper) {
            func(x)
        } else {
            f64::INFINITY
        }
    }
}

/// Clipping bounds: the candidate is projected into the box, then evaluated.
pub fn wrap_bounds_clip<F>(
    func: F,
    lower: Array1<f64>,
    upper: Array1<f64>,
) -> impl Fn(&Array1<f64>) -> f64 + Sync
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    move |x: &Array1<f64>| {
        let mut clipped = x.clone();
        clip_inplace(&mut clipped, &lower, &upper);
        func(&clipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_hard_bounds_never_call_the_cost() {
        let lower = array![-1.0, -1.0];
        let upper = array![1.0, 1.0];
        let wrapped = wrap_bounds_hard(
            |_: &Array1<f64>| panic!("must not be called"),
            lower,
            upper,
        );
        assert!(wrapped(&array![2.0, 0.0]).is_infinite());
    }

    #[test]
    fn test_hard_bounds_pass_through_in_range() {
        let wrapped = wrap_bounds_hard(|x: &Array1<f64>| x.sum(), array![-1.0], array![1.0]);
        assert_eq!(wrapped(&array![0.5]), 0.5);
    }

    #[test]
    fn test_clip_bounds_project_first() {
        let wrapped = wrap_bounds_clip(|x: &Array1<f64>| x[0], array![-1.0], array![1.0]);
        assert_eq!(wrapped(&array![7.0]), 1.0);
        assert_eq!(wrapped(&array![-7.0]), -1.0);
    }

    #[test]
    fn test_clip_inplace() {
        let mut x = array![-3.0, 0.5, 3.0];
        clip_inplace(&mut x, &array![-1.0, -1.0, -1.0], &array![1.0, 1.0, 1.0]);
        assert_eq!(x, array![-1.0, 0.5, 1.0]);
    }
}
