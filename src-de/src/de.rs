//! Differential evolution solvers.
//!
//! Two variants share the [`SolverCore`] state and differ only in their
//! update discipline:
//!
//! - [`DifferentialEvolutionSolver`] updates in place: a winning trial
//!   replaces its parent immediately, so later candidates of the same
//!   generation already see it (the classic Storn & Price loop).
//! - [`DifferentialEvolutionSolver2`] freezes the current generation while
//!   all trials are built, evaluates them through an order-preserving
//!   [`GenerationMapper`] and applies replacements only afterwards. Given a
//!   fixed seed its trajectory is identical under any such mapper, which
//!   makes the generation step safe to parallelize.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::Ordering;

use ndarray::Array1;

use crate::bounds::wrap_bounds_hard;
use crate::error::ConfigError;
use crate::mapper::{GenerationMapper, SequentialMapper};
use crate::message::StopReason;
use crate::solver::{SolveOptions, SolverCore, Warnflag};
use crate::termination::Termination;
use crate::wrapper::wrap_function;

fn argmin(values: &Array1<f64>) -> (usize, f64) {
    let mut best_i = 0usize;
    let mut best_v = values[0];
    for (i, &v) in values.iter().enumerate() {
        if v < best_v {
            best_v = v;
            best_i = i;
        }
    }
    (best_i, best_v)
}

fn reset_run_state(core: &mut SolverCore) {
    core.cancel.reset();
    core.energy_history.clear();
    core.generations = 0;
    core.fcalls = 0;
    core.stop_reason = None;
    core.warnflag = Warnflag::Terminated;
}

fn verbose_summary(core: &SolverCore) {
    let message = match core.warnflag() {
        Warnflag::MaxFunExceeded => "Maximum function evaluations reached".to_string(),
        Warnflag::MaxIterExceeded => "Maximum iterations reached".to_string(),
        Warnflag::Terminated => match core.stop_reason() {
            Some(reason) => reason.to_string(),
            None => "stopped".to_string(),
        },
    };
    eprintln!(
        "DE done: {}  best_f={:.6e}  nit={}  nfev={}",
        message,
        core.best_energy(),
        core.generations(),
        core.fcalls()
    );
}

/// Sequential DE: winning trials replace their parents immediately.
pub struct DifferentialEvolutionSolver {
    core: SolverCore,
}

impl DifferentialEvolutionSolver {
    pub fn new(dim: usize, npop: usize) -> Self {
        Self {
            core: SolverCore::new(dim, npop),
        }
    }

    /// Minimize `cost` until `termination` fires or a limit is hit.
    ///
    /// Results are read from the solver afterwards: `best_vector`,
    /// `best_energy`, `generations`, `fcalls`, `stop_reason`, `warnflag`
    /// and the monitors.
    pub fn solve<F>(
        &mut self,
        cost: F,
        termination: &mut dyn Termination,
        mut options: SolveOptions,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&Array1<f64>) -> f64 + Sync,
    {
        options.validate(self.core.npop())?;
        let core = &mut self.core;
        let (maxiter, maxfun) = core.resolved_limits();
        reset_run_state(core);
        core.clip_population_to_bounds();

        let (counter, counted) = wrap_function(cost, core.eval_monitor.clone());
        let energy: Box<dyn Fn(&Array1<f64>) -> f64 + Sync + '_> = match &core.strict_bounds {
            Some((lower, upper)) => {
                Box::new(wrap_bounds_hard(counted, lower.clone(), upper.clone()))
            }
            None => Box::new(counted),
        };

        for i in 0..core.npop() {
            let xi = core.population.row(i).to_owned();
            core.energies[i] = energy(&xi);
        }
        let (best_idx, best_energy) = argmin(&core.energies);
        core.best_vector = core.population.row(best_idx).to_owned();
        core.best_energy = best_energy;
        core.fcalls = counter.load(Ordering::SeqCst);

        let f = options.scaling_factor;
        let cr = options.crossover_probability;
        let mut outcome = Warnflag::MaxIterExceeded;

        for iteration in 0..maxiter {
            core.step_monitor
                .record_step(&core.best_vector, core.best_energy);

            let mut maxed_out = false;
            for i in 0..core.npop() {
                if counter.load(Ordering::SeqCst) >= maxfun {
                    maxed_out = true;
                    break;
                }
                let trial = options.strategy.build_trial(
                    &core.population,
                    &core.best_vector,
                    i,
                    f,
                    cr,
                    &mut core.rng,
                );
                let trial_energy = energy(&trial);
                // strict improvement only, so plateaus are not churned
                if trial_energy < core.energies[i] {
                    core.population.row_mut(i).assign(&trial);
                    core.energies[i] = trial_energy;
                    core.record_acceptance(i, &trial);
                    if trial_energy < core.best_energy {
                        core.best_energy = trial_energy;
                        core.best_vector = trial;
                    }
                }
            }
            core.fcalls = counter.load(Ordering::SeqCst);
            core.generations = iteration + 1;
            if !maxed_out {
                core.energy_history.push(core.best_energy);
            }

            if let Some(callback) = options.user_callback.as_mut() {
                callback(&core.best_vector);
            }
            if options.verbose {
                eprintln!(
                    "DE iter {:4}  best_f={:.6e}",
                    iteration + 1,
                    core.best_energy
                );
            }

            if maxed_out {
                outcome = Warnflag::MaxFunExceeded;
                break;
            }
            if core.cancel.is_cancelled() {
                outcome = Warnflag::Terminated;
                core.stop_reason = Some(StopReason::message("interrupted"));
                break;
            }
            if let Some(reason) = termination.check(&core.view()) {
                outcome = Warnflag::Terminated;
                core.stop_reason = Some(reason);
                break;
            }
        }

        core.warnflag = outcome;
        if options.verbose {
            verbose_summary(core);
        }
        Ok(())
    }
}

impl Deref for DifferentialEvolutionSolver {
    type Target = SolverCore;
    fn deref(&self) -> &SolverCore {
        &self.core
    }
}

impl DerefMut for DifferentialEvolutionSolver {
    fn deref_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }
}

/// Invariant-generation DE: the current generation stays frozen while all
/// trials are built and evaluated, then replacements are applied at once.
pub struct DifferentialEvolutionSolver2 {
    core: SolverCore,
    mapper: Box<dyn GenerationMapper>,
}

impl DifferentialEvolutionSolver2 {
    pub fn new(dim: usize, npop: usize) -> Self {
        Self {
            core: SolverCore::new(dim, npop),
            mapper: Box::new(SequentialMapper),
        }
    }

    /// Replace the per-generation evaluation mapper. The mapper must
    /// preserve order and be free of cross-trial side effects.
    pub fn set_generation_mapper(&mut self, mapper: Box<dyn GenerationMapper>) {
        self.mapper = mapper;
    }

    /// Minimize `cost`; see [`DifferentialEvolutionSolver::solve`].
    pub fn solve<F>(
        &mut self,
        cost: F,
        termination: &mut dyn Termination,
        mut options: SolveOptions,
    ) -> Result<(), ConfigError>
    where
        F: Fn(&Array1<f64>) -> f64 + Sync,
    {
        options.validate(self.core.npop())?;
        let Self { core, mapper } = self;
        let (maxiter, maxfun) = core.resolved_limits();
        reset_run_state(core);
        core.clip_population_to_bounds();

        let (counter, counted) = wrap_function(cost, core.eval_monitor.clone());
        let energy: Box<dyn Fn(&Array1<f64>) -> f64 + Sync + '_> = match &core.strict_bounds {
            Some((lower, upper)) => {
                Box::new(wrap_bounds_hard(counted, lower.clone(), upper.clone()))
            }
            None => Box::new(counted),
        };

        let members: Vec<Array1<f64>> = core
            .population
            .rows()
            .into_iter()
            .map(|row| row.to_owned())
            .collect();
        core.energies = Array1::from(mapper.map(&*energy, &members));
        let (best_idx, best_energy) = argmin(&core.energies);
        core.best_vector = core.population.row(best_idx).to_owned();
        core.best_energy = best_energy;
        core.fcalls = counter.load(Ordering::SeqCst);

        let f = options.scaling_factor;
        let cr = options.crossover_probability;
        let mut outcome = Warnflag::MaxIterExceeded;

        for iteration in 0..maxiter {
            core.step_monitor
                .record_step(&core.best_vector, core.best_energy);
            if counter.load(Ordering::SeqCst) >= maxfun {
                outcome = Warnflag::MaxFunExceeded;
                break;
            }

            // the whole generation is built against the frozen population
            let trials: Vec<Array1<f64>> = (0..core.npop())
                .map(|i| {
                    options.strategy.build_trial(
                        &core.population,
                        &core.best_vector,
                        i,
                        f,
                        cr,
                        &mut core.rng,
                    )
                })
                .collect();
            let trial_energies = mapper.map(&*energy, &trials);

            for (i, trial) in trials.iter().enumerate() {
                let trial_energy = trial_energies[i];
                if trial_energy < core.energies[i] {
                    core.population.row_mut(i).assign(trial);
                    core.energies[i] = trial_energy;
                    core.record_acceptance(i, trial);
                    if trial_energy < core.best_energy {
                        core.best_energy = trial_energy;
                        core.best_vector = trial.clone();
                    }
                }
            }
            core.fcalls = counter.load(Ordering::SeqCst);
            core.generations = iteration + 1;
            core.energy_history.push(core.best_energy);

            if let Some(callback) = options.user_callback.as_mut() {
                callback(&core.best_vector);
            }
            if options.verbose {
                eprintln!(
                    "DE iter {:4}  best_f={:.6e}",
                    iteration + 1,
                    core.best_energy
                );
            }

            if core.cancel.is_cancelled() {
                outcome = Warnflag::Terminated;
                core.stop_reason = Some(StopReason::message("interrupted"));
                break;
            }
            if let Some(reason) = termination.check(&core.view()) {
                outcome = Warnflag::Terminated;
                core.stop_reason = Some(reason);
                break;
            }
        }

        core.warnflag = outcome;
        if options.verbose {
            verbose_summary(core);
        }
        Ok(())
    }
}

impl Deref for DifferentialEvolutionSolver2 {
    type Target = SolverCore;
    fn deref(&self) -> &SolverCore {
        &self.core
    }
}

impl DerefMut for DifferentialEvolutionSolver2 {
    fn deref_mut(&mut self) -> &mut SolverCore {
        &mut self.core
    }
}
