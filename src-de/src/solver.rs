//! Shared solver state and configuration surface.
//!
//! [`SolverCore`] holds everything the concrete DE solvers have in common:
//! the population and its energies, best-so-far, evaluation limits, strict
//! ranges, monitors, RNG and the cancellation token. Configuration
//! mistakes (wrong vector lengths, inverted bounds) fail fast here; they
//! are never deferred into `solve`.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::bounds::clip_inplace;
use crate::cancel::CancelToken;
use crate::error::ConfigError;
use crate::message::StopReason;
use crate::monitor::{Monitor, MonitorReader};
use crate::strategy::Strategy;

/// Relative jitter applied to the non-anchor slots by `set_initial_points`.
const INITIAL_RADIUS: f64 = 0.05;

/// How a solve run ended, in `scipy.optimize.fmin` flag terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Warnflag {
    /// Stopped by the termination predicate (or an interrupt).
    #[default]
    Terminated,
    /// Ran out of cost-function evaluations.
    MaxFunExceeded,
    /// Ran out of iterations.
    MaxIterExceeded,
}

impl Warnflag {
    pub fn code(&self) -> u8 {
        match self {
            Warnflag::Terminated => 0,
            Warnflag::MaxFunExceeded => 1,
            Warnflag::MaxIterExceeded => 2,
        }
    }
}

/// Pluggable population sampler for `set_sampled_initial_points`.
pub trait Sampler {
    /// Draw `count` points inside `[lower, upper]`, one per row.
    fn sample(
        &self,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
        count: usize,
        rng: &mut StdRng,
    ) -> Array2<f64>;
}

/// Independent uniform sampling per component.
pub struct UniformRandom;

impl Sampler for UniformRandom {
    fn sample(
        &self,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
        count: usize,
        rng: &mut StdRng,
    ) -> Array2<f64> {
        let dim = lower.len();
        Array2::from_shape_fn((count, dim), |(_, j)| {
            lower[j] + rng.random::<f64>() * (upper[j] - lower[j])
        })
    }
}

/// Latin hypercube sampling: each dimension is split into `count` strata
/// and every stratum receives exactly one sample.
pub struct LatinHypercube;

impl Sampler for LatinHypercube {
    fn sample(
        &self,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
        count: usize,
        rng: &mut StdRng,
    ) -> Array2<f64> {
        let dim = lower.len();
        let mut samples = Array2::<f64>::zeros((count, dim));
        for j in 0..dim {
            let mut vals: Vec<f64> = (0..count)
                .map(|k| ((k as f64) + rng.random::<f64>()) / (count as f64))
                .collect();
            vals.shuffle(rng);
            for i in 0..count {
                samples[[i, j]] = lower[j] + vals[i] * (upper[j] - lower[j]);
            }
        }
        samples
    }
}

/// Options for a solve run; the explicit counterpart of the original's
/// free-form keyword arguments.
pub struct SolveOptions {
    pub strategy: Strategy,
    /// CR in [0, 1].
    pub crossover_probability: f64,
    /// F in (0, 2].
    pub scaling_factor: f64,
    /// Called with the best vector after each iteration.
    pub user_callback: Option<Box<dyn FnMut(&Array1<f64>)>>,
    /// Per-iteration progress and a final summary on stderr.
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Best1Exp,
            crossover_probability: 0.5,
            scaling_factor: 0.7,
            user_callback: None,
            verbose: false,
        }
    }
}

impl SolveOptions {
    pub(crate) fn validate(&self, npop: usize) -> Result<(), ConfigError> {
        if !(self.scaling_factor > 0.0 && self.scaling_factor <= 2.0) {
            return Err(ConfigError::ScalingFactor(self.scaling_factor));
        }
        if !(0.0..=1.0).contains(&self.crossover_probability) {
            return Err(ConfigError::CrossProbability(self.crossover_probability));
        }
        let min = self.strategy.donors() + 1;
        if npop < min {
            return Err(ConfigError::PopulationTooSmall {
                strategy: self.strategy.name(),
                npop,
                min,
            });
        }
        Ok(())
    }
}

/// Snapshot of solver state handed to termination predicates.
pub struct SolverView<'a> {
    pub best_energy: f64,
    pub best_vector: &'a Array1<f64>,
    pub energy_history: &'a [f64],
    pub generations: usize,
    pub fcalls: usize,
    pub population: &'a Array2<f64>,
    pub energies: &'a Array1<f64>,
    /// Reader over the step monitor, for detector-backed predicates.
    pub step_monitor: MonitorReader,
}

/// State and configuration shared by the DE solvers.
pub struct SolverCore {
    dim: usize,
    npop: usize,
    pub(crate) population: Array2<f64>,
    pub(crate) energies: Array1<f64>,
    pub(crate) best_vector: Array1<f64>,
    pub(crate) best_energy: f64,
    pub(crate) energy_history: Vec<f64>,
    pub(crate) generations: usize,
    pub(crate) fcalls: usize,
    pub(crate) strict_bounds: Option<(Array1<f64>, Array1<f64>)>,
    maxiter: Option<usize>,
    maxfun: Option<usize>,
    pub(crate) rng: StdRng,
    pub(crate) cancel: CancelToken,
    pub(crate) eval_monitor: Option<Monitor>,
    pub(crate) step_monitor: Monitor,
    pub(crate) genealogy: Option<Vec<Vec<Array1<f64>>>>,
    pub(crate) stop_reason: Option<StopReason>,
    pub(crate) warnflag: Warnflag,
}

impl SolverCore {
    pub(crate) fn new(dim: usize, npop: usize) -> Self {
        Self {
            dim,
            npop,
            population: Array2::zeros((npop, dim)),
            energies: Array1::from_elem(npop, f64::INFINITY),
            best_vector: Array1::zeros(dim),
            best_energy: f64::INFINITY,
            energy_history: Vec::new(),
            generations: 0,
            fcalls: 0,
            strict_bounds: None,
            maxiter: None,
            maxfun: None,
            rng: StdRng::from_rng(&mut rand::rng()),
            cancel: CancelToken::new(),
            eval_monitor: None,
            step_monitor: Monitor::new(),
            genealogy: None,
            stop_reason: None,
            warnflag: Warnflag::default(),
        }
    }

    fn check_dim(&self, got: usize) -> Result<(), ConfigError> {
        if got != self.dim {
            return Err(ConfigError::DimensionMismatch {
                expected: self.dim,
                got,
            });
        }
        Ok(())
    }

    fn check_bounds(&self, lower: &Array1<f64>, upper: &Array1<f64>) -> Result<(), ConfigError> {
        self.check_dim(lower.len())?;
        self.check_dim(upper.len())?;
        for i in 0..self.dim {
            if upper[i] < lower[i] {
                return Err(ConfigError::InvertedBound {
                    index: i,
                    lower: lower[i],
                    upper: upper[i],
                });
            }
        }
        Ok(())
    }

    /// Fill every slot with `x0` plus a small relative jitter; slot 0 is
    /// exact.
    pub fn set_initial_points(&mut self, x0: &Array1<f64>) -> Result<(), ConfigError> {
        self.check_dim(x0.len())?;
        self.population.row_mut(0).assign(x0);
        for i in 1..self.npop {
            for j in 0..self.dim {
                let span = x0[j].abs().max(1.0);
                let jitter = (self.rng.random::<f64>() - 0.5) * INITIAL_RADIUS * span;
                self.population[[i, j]] = x0[j] + jitter;
            }
        }
        Ok(())
    }

    /// Uniform random population inside `[lower, upper]`.
    ///
    /// A previously installed strict range does not re-clip here; clipping
    /// happens at the first evaluation wrap.
    pub fn set_random_initial_points(
        &mut self,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
    ) -> Result<(), ConfigError> {
        self.set_sampled_initial_points(lower, upper, &UniformRandom)
    }

    /// Population drawn by a pluggable sampler inside `[lower, upper]`.
    pub fn set_sampled_initial_points(
        &mut self,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
        sampler: &dyn Sampler,
    ) -> Result<(), ConfigError> {
        self.check_bounds(lower, upper)?;
        let sampled = sampler.sample(lower, upper, self.npop, &mut self.rng);
        if sampled.nrows() != self.npop || sampled.ncols() != self.dim {
            return Err(ConfigError::DimensionMismatch {
                expected: self.dim,
                got: sampled.ncols(),
            });
        }
        self.population = sampled;
        Ok(())
    }

    /// Install strict bounds. The current population is not clipped
    /// retroactively; the next evaluation wrap will.
    pub fn set_strict_ranges(
        &mut self,
        lower: &Array1<f64>,
        upper: &Array1<f64>,
    ) -> Result<(), ConfigError> {
        self.check_bounds(lower, upper)?;
        self.strict_bounds = Some((lower.clone(), upper.clone()));
        Ok(())
    }

    /// Set iteration and evaluation limits; `None` keeps the defaults
    /// `D*NP*10` and `D*NP*1000`.
    pub fn set_evaluation_limits(&mut self, maxiter: Option<usize>, maxfun: Option<usize>) {
        self.maxiter = maxiter;
        self.maxfun = maxfun;
    }

    /// Reseed the solver RNG for a reproducible trajectory.
    pub fn set_random_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Monitor fed with every cost evaluation.
    pub fn set_evaluation_monitor(&mut self, monitor: Monitor) {
        self.eval_monitor = Some(monitor);
    }

    /// Monitor fed with `(best_vector, best_energy)` once per iteration.
    pub fn set_step_monitor(&mut self, monitor: Monitor) {
        self.step_monitor = monitor;
    }

    pub fn step_monitor(&self) -> &Monitor {
        &self.step_monitor
    }

    /// Keep a per-slot log of accepted replacements (diagnostic only).
    pub fn enable_genealogy(&mut self) {
        self.genealogy = Some(vec![Vec::new(); self.npop]);
    }

    /// Inject an external cancellation token.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Route SIGINT to the cancellation token; the solver then exits
    /// cleanly at the end of the current iteration.
    pub fn enable_signal_handler(&mut self) -> Result<(), ConfigError> {
        self.cancel.hook_ctrlc()?;
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn npop(&self) -> usize {
        self.npop
    }

    pub fn population(&self) -> &Array2<f64> {
        &self.population
    }

    pub fn energies(&self) -> &Array1<f64> {
        &self.energies
    }

    pub fn best_vector(&self) -> &Array1<f64> {
        &self.best_vector
    }

    pub fn best_energy(&self) -> f64 {
        self.best_energy
    }

    /// Best energy after each completed iteration.
    pub fn energy_history(&self) -> &[f64] {
        &self.energy_history
    }

    pub fn generations(&self) -> usize {
        self.generations
    }

    pub fn fcalls(&self) -> usize {
        self.fcalls
    }

    pub fn genealogy(&self) -> Option<&[Vec<Array1<f64>>]> {
        self.genealogy.as_deref()
    }

    /// Why the last run stopped, if a predicate (or interrupt) fired.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub fn warnflag(&self) -> Warnflag {
        self.warnflag
    }

    pub(crate) fn resolved_limits(&self) -> (usize, usize) {
        let maxiter = self.maxiter.unwrap_or(self.dim * self.npop * 10);
        let maxfun = self.maxfun.unwrap_or(self.dim * self.npop * 1000);
        (maxiter, maxfun)
    }

    pub(crate) fn clip_population_to_bounds(&mut self) {
        if let Some((lower, upper)) = &self.strict_bounds {
            for mut row in self.population.rows_mut() {
                let mut x = row.to_owned();
                clip_inplace(&mut x, lower, upper);
                row.assign(&x);
            }
        }
    }

    pub(crate) fn record_acceptance(&mut self, slot: usize, accepted: &Array1<f64>) {
        if let Some(genealogy) = &mut self.genealogy {
            genealogy[slot].push(accepted.clone());
        }
    }

    pub(crate) fn view(&self) -> SolverView<'_> {
        SolverView {
            best_energy: self.best_energy,
            best_vector: &self.best_vector,
            energy_history: &self.energy_history,
            generations: self.generations,
            fcalls: self.fcalls,
            population: &self.population,
            energies: &self.energies,
            step_monitor: self.step_monitor.reader(),
        }
    }
}
