//! Mutation strategies for differential evolution.
//!
//! Each strategy is a pure function of the current population, the
//! best-so-far vector and a target index: it assembles a mutant from scaled
//! difference vectors, then recombines it with the target through binomial
//! or exponential crossover. All randomness flows through the caller's RNG,
//! so a fixed seed reproduces trials exactly.

use std::str::FromStr;

use ndarray::{Array1, Array2};
use rand::Rng;
use rand::seq::SliceRandom;

/// Mutation strategy: base vector, number of difference pairs, crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Best1Exp,
    Best1Bin,
    Rand1Exp,
    Rand1Bin,
    RandToBest1Exp,
    RandToBest1Bin,
    Best2Exp,
    Best2Bin,
    Rand2Exp,
    Rand2Bin,
}

/// Crossover type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    /// Each component is taken from the mutant independently with
    /// probability CR; one component is always forced.
    Binomial,
    /// A contiguous run of components is taken from the mutant, starting at
    /// a random index and continuing while Bernoulli(CR) succeeds.
    Exponential,
}

impl FromStr for Strategy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.to_lowercase();
        match t.as_str() {
            "best1exp" | "best1" => Ok(Strategy::Best1Exp),
            "best1bin" => Ok(Strategy::Best1Bin),
            "rand1exp" | "rand1" => Ok(Strategy::Rand1Exp),
            "rand1bin" => Ok(Strategy::Rand1Bin),
            "randtobest1exp" | "rand-to-best1exp" | "rand_to_best1exp" => {
                Ok(Strategy::RandToBest1Exp)
            }
            "randtobest1bin" | "rand-to-best1bin" | "rand_to_best1bin" => {
                Ok(Strategy::RandToBest1Bin)
            }
            "best2exp" | "best2" => Ok(Strategy::Best2Exp),
            "best2bin" => Ok(Strategy::Best2Bin),
            "rand2exp" | "rand2" => Ok(Strategy::Rand2Exp),
            "rand2bin" => Ok(Strategy::Rand2Bin),
            _ => Err(format!("unknown strategy: {}", s)),
        }
    }
}

impl Strategy {
    pub fn crossover(&self) -> Crossover {
        match self {
            Strategy::Best1Exp
            | Strategy::Rand1Exp
            | Strategy::RandToBest1Exp
            | Strategy::Best2Exp
            | Strategy::Rand2Exp => Crossover::Exponential,
            _ => Crossover::Binomial,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Best1Exp => "Best1Exp",
            Strategy::Best1Bin => "Best1Bin",
            Strategy::Rand1Exp => "Rand1Exp",
            Strategy::Rand1Bin => "Rand1Bin",
            Strategy::RandToBest1Exp => "RandToBest1Exp",
            Strategy::RandToBest1Bin => "RandToBest1Bin",
            Strategy::Best2Exp => "Best2Exp",
            Strategy::Best2Bin => "Best2Bin",
            Strategy::Rand2Exp => "Rand2Exp",
            Strategy::Rand2Bin => "Rand2Bin",
        }
    }

    /// How many distinct donors (besides the target) the mutant draws on.
    pub(crate) fn donors(&self) -> usize {
        match self {
            Strategy::Best1Exp | Strategy::Best1Bin => 2,
            Strategy::Rand1Exp | Strategy::Rand1Bin => 3,
            Strategy::RandToBest1Exp | Strategy::RandToBest1Bin => 2,
            Strategy::Best2Exp | Strategy::Best2Bin => 4,
            Strategy::Rand2Exp | Strategy::Rand2Bin => 5,
        }
    }

    /// Build a trial vector for population slot `i`.
    pub(crate) fn build_trial<R: Rng + ?Sized>(
        &self,
        pop: &Array2<f64>,
        best: &Array1<f64>,
        i: usize,
        f: f64,
        cr: f64,
        rng: &mut R,
    ) -> Array1<f64> {
        let mutant = match self {
            Strategy::Best1Exp | Strategy::Best1Bin => mutant_best1(pop, best, i, f, rng),
            Strategy::Rand1Exp | Strategy::Rand1Bin => mutant_rand1(pop, i, f, rng),
            Strategy::RandToBest1Exp | Strategy::RandToBest1Bin => {
                mutant_rand_to_best1(pop, best, i, f, rng)
            }
            Strategy::Best2Exp | Strategy::Best2Bin => mutant_best2(pop, best, i, f, rng),
            Strategy::Rand2Exp | Strategy::Rand2Bin => mutant_rand2(pop, i, f, rng),
        };
        let target = pop.row(i).to_owned();
        match self.crossover() {
            Crossover::Binomial => binomial_crossover(&target, &mutant, cr, rng),
            Crossover::Exponential => exponential_crossover(&target, &mutant, cr, rng),
        }
    }
}

/// `count` distinct indices from `0..pool_size`, none equal to `exclude`.
pub(crate) fn distinct_indices<R: Rng + ?Sized>(
    exclude: usize,
    count: usize,
    pool_size: usize,
    rng: &mut R,
) -> Vec<usize> {
    debug_assert!(count < pool_size);
    let mut idxs: Vec<usize> = (0..pool_size).filter(|&j| j != exclude).collect();
    idxs.shuffle(rng);
    idxs.truncate(count);
    idxs
}

/// best + F * (r0 - r1)
fn mutant_best1<R: Rng + ?Sized>(
    pop: &Array2<f64>,
    best: &Array1<f64>,
    i: usize,
    f: f64,
    rng: &mut R,
) -> Array1<f64> {
    let r = distinct_indices(i, 2, pop.nrows(), rng);
    let (a, b) = (pop.row(r[0]), pop.row(r[1]));
    Array1::from_shape_fn(best.len(), |j| best[j] + f * (a[j] - b[j]))
}

/// r0 + F * (r1 - r2)
fn mutant_rand1<R: Rng + ?Sized>(
    pop: &Array2<f64>,
    i: usize,
    f: f64,
    rng: &mut R,
) -> Array1<f64> {
    let r = distinct_indices(i, 3, pop.nrows(), rng);
    let (base, a, b) = (pop.row(r[0]), pop.row(r[1]), pop.row(r[2]));
    Array1::from_shape_fn(pop.ncols(), |j| base[j] + f * (a[j] - b[j]))
}

/// x_i + F * (best - x_i) + F * (r0 - r1)
fn mutant_rand_to_best1<R: Rng + ?Sized>(
    pop: &Array2<f64>,
    best: &Array1<f64>,
    i: usize,
    f: f64,
    rng: &mut R,
) -> Array1<f64> {
    let r = distinct_indices(i, 2, pop.nrows(), rng);
    let (target, a, b) = (pop.row(i), pop.row(r[0]), pop.row(r[1]));
    Array1::from_shape_fn(best.len(), |j| {
        target[j] + f * (best[j] - target[j]) + f * (a[j] - b[j])
    })
}

/// best + F * (r0 + r1 - r2 - r3)
fn mutant_best2<R: Rng + ?Sized>(
    pop: &Array2<f64>,
    best: &Array1<f64>,
    i: usize,
    f: f64,
    rng: &mut R,
) -> Array1<f64> {
    let r = distinct_indices(i, 4, pop.nrows(), rng);
    Array1::from_shape_fn(best.len(), |j| {
        best[j] + f * (pop[[r[0], j]] + pop[[r[1], j]] - pop[[r[2], j]] - pop[[r[3], j]])
    })
}

/// r0 + F * (r1 + r2 - r3 - r4)
fn mutant_rand2<R: Rng + ?Sized>(
    pop: &Array2<f64>,
    i: usize,
    f: f64,
    rng: &mut R,
) -> Array1<f64> {
    let r = distinct_indices(i, 5, pop.nrows(), rng);
    Array1::from_shape_fn(pop.ncols(), |j| {
        pop[[r[0], j]] + f * (pop[[r[1], j]] + pop[[r[2], j]] - pop[[r[3], j]] - pop[[r[4], j]])
    })
}

/// Independent per-component crossover; index `jrand` is always mutated.
pub(crate) fn binomial_crossover<R: Rng + ?Sized>(
    target: &Array1<f64>,
    mutant: &Array1<f64>,
    cr: f64,
    rng: &mut R,
) -> Array1<f64> {
    let n = target.len();
    let jrand = rng.random_range(0..n);
    let mut trial = target.clone();
    for j in 0..n {
        if j == jrand || rng.random::<f64>() < cr {
            trial[j] = mutant[j];
        }
    }
    trial
}

/// Contiguous crossover from a random start, wrapping at `D`; at least one
/// component is always taken from the mutant.
pub(crate) fn exponential_crossover<R: Rng + ?Sized>(
    target: &Array1<f64>,
    mutant: &Array1<f64>,
    cr: f64,
    rng: &mut R,
) -> Array1<f64> {
    let n = target.len();
    let mut trial = target.clone();
    let mut j = rng.random_range(0..n);
    let mut copied = 0usize;
    loop {
        trial[j] = mutant[j];
        copied += 1;
        j = (j + 1) % n;
        if copied >= n || rng.random::<f64>() >= cr {
            break;
        }
    }
    trial
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_distinct_indices_exclude_target() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let idxs = distinct_indices(3, 5, 10, &mut rng);
            assert_eq!(idxs.len(), 5);
            assert!(!idxs.contains(&3));
            let mut sorted = idxs.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 5);
        }
    }

    #[test]
    fn test_binomial_takes_at_least_one_component() {
        let mut rng = StdRng::seed_from_u64(1);
        let target = array![0.0, 0.0, 0.0, 0.0];
        let mutant = array![1.0, 1.0, 1.0, 1.0];
        for _ in 0..50 {
            let trial = binomial_crossover(&target, &mutant, 0.0, &mut rng);
            assert_eq!(trial.iter().filter(|&&v| v == 1.0).count(), 1);
        }
    }

    #[test]
    fn test_exponential_run_is_contiguous_mod_n() {
        let mut rng = StdRng::seed_from_u64(2);
        let target = Array1::zeros(8);
        let mutant = Array1::ones(8);
        for _ in 0..50 {
            let trial = exponential_crossover(&target, &mutant, 0.7, &mut rng);
            let taken: Vec<usize> = (0..8).filter(|&j| trial[j] == 1.0).collect();
            assert!(!taken.is_empty());
            // a contiguous run mod n has at most one "gap" in sorted order
            let gaps = taken
                .windows(2)
                .filter(|w| w[1] != w[0] + 1)
                .count();
            let wraps = (taken[0] == 0 && *taken.last().unwrap() == 7) as usize;
            assert!(gaps <= wraps, "not contiguous: {:?}", taken);
        }
    }

    #[test]
    fn test_exponential_full_copy_at_cr_one_caps_at_dim() {
        let mut rng = StdRng::seed_from_u64(3);
        let trial = exponential_crossover(&Array1::zeros(4), &Array1::<f64>::ones(4), 1.0, &mut rng);
        assert_eq!(trial, Array1::<f64>::ones(4));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("best1exp".parse::<Strategy>().unwrap(), Strategy::Best1Exp);
        assert_eq!("Rand1Bin".parse::<Strategy>().unwrap(), Strategy::Rand1Bin);
        assert_eq!(
            "rand_to_best1exp".parse::<Strategy>().unwrap(),
            Strategy::RandToBest1Exp
        );
        assert!("firefly".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_trials_are_reproducible_under_a_fixed_seed() {
        let pop =
            Array2::from_shape_fn((6, 3), |(i, j)| (i * 3 + j) as f64 / 10.0);
        let best = array![0.0, 0.1, 0.2];
        for strategy in [
            Strategy::Best1Exp,
            Strategy::Rand1Bin,
            Strategy::RandToBest1Bin,
            Strategy::Best2Exp,
            Strategy::Rand2Bin,
        ] {
            let mut rng1 = StdRng::seed_from_u64(42);
            let mut rng2 = StdRng::seed_from_u64(42);
            let t1 = strategy.build_trial(&pop, &best, 1, 0.8, 0.9, &mut rng1);
            let t2 = strategy.build_trial(&pop, &best, 1, 0.8, 0.9, &mut rng2);
            assert_eq!(t1, t2);
        }
    }
}
