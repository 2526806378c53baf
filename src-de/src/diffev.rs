//! Minimal functional interface over the DE solvers.
//!
//! [`diffev`] mirrors a `scipy.optimize`-style entry point: hand it a cost,
//! an initial point (or `(min, max)` pairs for a random start) and a
//! population size, read the optimum and the warnflag off the result.

use ndarray::Array1;

use crate::de::{DifferentialEvolutionSolver, DifferentialEvolutionSolver2};
use crate::error::ConfigError;
use crate::monitor::Monitor;
use crate::solver::{SolveOptions, SolverCore, Warnflag};
use crate::strategy::Strategy;
use crate::termination::{ChangeOverGeneration, Termination, VTR};

/// Where the population starts.
pub enum InitialPoint {
    /// An explicit initial vector; the population jitters around it.
    Point(Array1<f64>),
    /// Uniform random initial population inside the `(min, max)` pairs.
    RandomIn(Vec<(f64, f64)>),
}

/// Options for [`diffev`].
pub struct DiffevOptions {
    /// Strict `(min, max)` bounds enforced during the run.
    pub bounds: Option<Vec<(f64, f64)>>,
    /// Tolerance fed to the default termination predicate.
    pub ftol: f64,
    /// If set, terminate on `ChangeOverGeneration(ftol, gtol)` instead of
    /// `VTR(ftol)`.
    pub gtol: Option<usize>,
    pub maxiter: Option<usize>,
    pub maxfun: Option<usize>,
    pub cross_probability: f64,
    pub scaling_factor: f64,
    pub strategy: Strategy,
    /// Use the invariant-generation solver (the default) instead of the
    /// in-place one.
    pub invariant_generation: bool,
    /// Keep the per-iteration best vectors in the result.
    pub retall: bool,
    pub verbose: bool,
    pub seed: Option<u64>,
}

impl Default for DiffevOptions {
    fn default() -> Self {
        Self {
            bounds: None,
            ftol: 5e-3,
            gtol: None,
            maxiter: None,
            maxfun: None,
            cross_probability: 1.0,
            scaling_factor: 0.9,
            strategy: Strategy::Best1Exp,
            invariant_generation: true,
            retall: false,
            verbose: false,
            seed: None,
        }
    }
}

/// Result of a [`diffev`] run.
#[derive(Debug)]
pub struct DiffevResult {
    /// Minimizer found.
    pub x: Array1<f64>,
    /// Cost at the minimizer.
    pub fun: f64,
    /// Iterations performed.
    pub nit: usize,
    /// Cost evaluations performed.
    pub nfev: usize,
    /// 0 = stopped by the predicate, 1 = `maxfun`, 2 = `maxiter`.
    pub warnflag: Warnflag,
    /// Best vector after each iteration, when `retall` was requested.
    pub allvecs: Option<Vec<Array1<f64>>>,
}

fn unpair(pairs: &[(f64, f64)]) -> (Array1<f64>, Array1<f64>) {
    let lower = Array1::from_iter(pairs.iter().map(|&(lo, _)| lo));
    let upper = Array1::from_iter(pairs.iter().map(|&(_, hi)| hi));
    (lower, upper)
}

fn configure(
    core: &mut SolverCore,
    x0: &InitialPoint,
    options: &DiffevOptions,
    evalmon: &Monitor,
    stepmon: &Monitor,
) -> Result<(), ConfigError> {
    if let Some(seed) = options.seed {
        core.set_random_seed(seed);
    }
    core.set_evaluation_limits(options.maxiter, options.maxfun);
    if let Some(bounds) = &options.bounds {
        let (lower, upper) = unpair(bounds);
        core.set_strict_ranges(&lower, &upper)?;
    }
    match x0 {
        InitialPoint::Point(x) => core.set_initial_points(x)?,
        InitialPoint::RandomIn(pairs) => {
            let (lower, upper) = unpair(pairs);
            core.set_random_initial_points(&lower, &upper)?;
        }
    }
    core.set_evaluation_monitor(evalmon.clone());
    core.set_step_monitor(stepmon.clone());
    Ok(())
}

/// Minimize `func` by differential evolution.
///
/// Termination defaults to `VTR(ftol)`, or `ChangeOverGeneration(ftol,
/// gtol)` when `gtol` is given.
pub fn diffev<F>(
    func: F,
    x0: InitialPoint,
    npop: usize,
    options: DiffevOptions,
) -> Result<DiffevResult, ConfigError>
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    let dim = match &x0 {
        InitialPoint::Point(x) => x.len(),
        InitialPoint::RandomIn(pairs) => pairs.len(),
    };
    let mut termination: Box<dyn Termination> = match options.gtol {
        Some(gtol) => Box::new(ChangeOverGeneration::new(options.ftol, gtol)),
        None => Box::new(VTR::new(options.ftol)),
    };
    let stepmon = Monitor::new();
    let evalmon = Monitor::new();
    let solve_options = SolveOptions {
        strategy: options.strategy,
        crossover_probability: options.cross_probability,
        scaling_factor: options.scaling_factor,
        user_callback: None,
        verbose: options.verbose,
    };

    let (x, fun, nit, nfev, warnflag) = if options.invariant_generation {
        let mut solver = DifferentialEvolutionSolver2::new(dim, npop);
        configure(&mut solver, &x0, &options, &evalmon, &stepmon)?;
        solver.solve(func, &mut *termination, solve_options)?;
        (
            solver.best_vector().clone(),
            solver.best_energy(),
            solver.generations(),
            solver.fcalls(),
            solver.warnflag(),
        )
    } else {
        let mut solver = DifferentialEvolutionSolver::new(dim, npop);
        configure(&mut solver, &x0, &options, &evalmon, &stepmon)?;
        solver.solve(func, &mut *termination, solve_options)?;
        (
            solver.best_vector().clone(),
            solver.best_energy(),
            solver.generations(),
            solver.fcalls(),
            solver.warnflag(),
        )
    };

    let allvecs = options
        .retall
        .then(|| stepmon.reader().records().into_iter().map(|r| r.x).collect());

    Ok(DiffevResult {
        x,
        fun,
        nit,
        nfev,
        warnflag,
        allvecs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sphere(x: &Array1<f64>) -> f64 {
        x.iter().map(|&v| v * v).sum()
    }

    #[test]
    fn test_diffev_from_random_bounds() {
        let result = diffev(
            sphere,
            InitialPoint::RandomIn(vec![(-5.0, 5.0); 3]),
            25,
            DiffevOptions {
                ftol: 1e-5,
                seed: Some(8),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.warnflag, Warnflag::Terminated);
        assert!(result.fun <= 1e-5);
        assert_eq!(result.x.len(), 3);
        assert!(result.allvecs.is_none());
    }

    #[test]
    fn test_diffev_from_explicit_point_with_retall() {
        let result = diffev(
            sphere,
            InitialPoint::Point(array![2.0, -2.0]),
            20,
            DiffevOptions {
                ftol: 1e-3,
                retall: true,
                seed: Some(15),
                invariant_generation: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.warnflag, Warnflag::Terminated);
        let allvecs = result.allvecs.unwrap();
        assert_eq!(allvecs.len(), result.nit);
        assert_eq!(allvecs[0].len(), 2);
    }

    #[test]
    fn test_diffev_maxiter_warnflag() {
        let result = diffev(
            sphere,
            InitialPoint::RandomIn(vec![(-5.0, 5.0); 4]),
            15,
            DiffevOptions {
                ftol: 0.0,
                maxiter: Some(3),
                seed: Some(21),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.warnflag, Warnflag::MaxIterExceeded);
        assert_eq!(result.warnflag.code(), 2);
        assert_eq!(result.nit, 3);
    }

    #[test]
    fn test_diffev_maxfun_warnflag() {
        let result = diffev(
            sphere,
            InitialPoint::RandomIn(vec![(-5.0, 5.0); 4]),
            15,
            DiffevOptions {
                ftol: 0.0,
                maxfun: Some(40),
                seed: Some(22),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.warnflag, Warnflag::MaxFunExceeded);
        assert_eq!(result.warnflag.code(), 1);
    }

    #[test]
    fn test_diffev_gtol_selects_change_over_generation() {
        let result = diffev(
            sphere,
            InitialPoint::RandomIn(vec![(-5.0, 5.0); 2]),
            20,
            DiffevOptions {
                ftol: 1e-6,
                gtol: Some(30),
                seed: Some(5),
                ..Default::default()
            },
        )
        .unwrap();
        // plateaued rather than crossing a value-to-reach
        assert_eq!(result.warnflag, Warnflag::Terminated);
        assert!(result.nit > 30);
        assert!(result.fun < 1e-3);
    }

    #[test]
    fn test_diffev_dimension_mismatch_is_synchronous() {
        let err = diffev(
            sphere,
            InitialPoint::Point(array![0.0, 0.0]),
            10,
            DiffevOptions {
                bounds: Some(vec![(-1.0, 1.0); 3]),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DimensionMismatch { .. }));
    }
}
