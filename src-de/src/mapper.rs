//! Order-preserving evaluation mappers.
//!
//! The invariant-generation solver evaluates each frozen generation through
//! an injected mapper. Correctness requires order preservation and no
//! cross-trial side effects; under those conditions any mapper yields the
//! same trajectory as sequential evaluation.

use ndarray::Array1;
use rayon::prelude::*;

/// Maps the cost over a generation of trial vectors, preserving order.
pub trait GenerationMapper {
    fn map(
        &self,
        cost: &(dyn Fn(&Array1<f64>) -> f64 + Sync),
        trials: &[Array1<f64>],
    ) -> Vec<f64>;
}

/// Evaluate trials one after another on the calling thread.
pub struct SequentialMapper;

impl GenerationMapper for SequentialMapper {
    fn map(
        &self,
        cost: &(dyn Fn(&Array1<f64>) -> f64 + Sync),
        trials: &[Array1<f64>],
    ) -> Vec<f64> {
        trials.iter().map(cost).collect()
    }
}

/// Evaluate trials on the rayon thread pool; `par_iter().map().collect()`
/// keeps results in input order.
pub struct RayonMapper;

impl GenerationMapper for RayonMapper {
    fn map(
        &self,
        cost: &(dyn Fn(&Array1<f64>) -> f64 + Sync),
        trials: &[Array1<f64>],
    ) -> Vec<f64> {
        trials.par_iter().map(cost).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mappers_agree_and_preserve_order() {
        let trials: Vec<Array1<f64>> = (0..32).map(|k| array![k as f64]).collect();
        let cost = |x: &Array1<f64>| x[0] * 2.0;
        let sequential = SequentialMapper.map(&cost, &trials);
        let parallel = RayonMapper.map(&cost, &trials);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential[5], 10.0);
    }
}
