//! Termination predicates.
//!
//! A predicate inspects a [`SolverView`] after each iteration and returns
//! `None` to continue or a [`StopReason`] to stop. Predicates are pure with
//! respect to solver state; the detector-backed ones cache their last
//! result keyed on the iteration count, so repeated evaluation within one
//! iteration is idempotent. [`Or`], [`And`] and [`When`] compose them.

use std::time::{Duration, Instant};

use crate::collapse::{
    self, CollapseResult, DEFAULT_GENERATIONS, DEFAULT_TOLERANCE, Target, Tolerance,
};
use crate::error::DetectorError;
use crate::message::StopReason;
use crate::monitor::Monitor;
use crate::solver::SolverView;

/// Decides after each iteration whether the solver should stop.
pub trait Termination {
    /// `None` to continue, or the labeled reason to stop.
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason>;
}

/// Stop once the best energy reaches the value-to-reach.
pub struct VTR {
    pub ftol: f64,
}

impl VTR {
    pub fn new(ftol: f64) -> Self {
        Self { ftol }
    }
}

impl Termination for VTR {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        (solver.best_energy <= self.ftol)
            .then(|| StopReason::message(format!("VTR with {}", self.ftol)))
    }
}

/// Stop when the best energy improved by at most `ftol` over the last
/// `gtol` iterations. Needs at least `gtol + 1` completed iterations.
pub struct ChangeOverGeneration {
    pub ftol: f64,
    pub gtol: usize,
}

impl ChangeOverGeneration {
    pub fn new(ftol: f64, gtol: usize) -> Self {
        Self { ftol, gtol }
    }
}

impl Termination for ChangeOverGeneration {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        let history = solver.energy_history;
        if history.len() <= self.gtol {
            return None;
        }
        let delta = history[history.len() - 1 - self.gtol] - history[history.len() - 1];
        (delta <= self.ftol).then(|| {
            StopReason::message(format!(
                "ChangeOverGeneration with {} over {} generations",
                self.ftol, self.gtol
            ))
        })
    }
}

/// [`ChangeOverGeneration`] normalized by the magnitude of the current best
/// energy.
pub struct NormalizedChangeOverGeneration {
    pub ftol: f64,
    pub gtol: usize,
}

impl NormalizedChangeOverGeneration {
    pub fn new(ftol: f64, gtol: usize) -> Self {
        Self { ftol, gtol }
    }
}

impl Termination for NormalizedChangeOverGeneration {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        let history = solver.energy_history;
        if history.len() <= self.gtol {
            return None;
        }
        let last = history[history.len() - 1];
        let delta = history[history.len() - 1 - self.gtol] - last;
        let relative = if last.abs() > 0.0 {
            delta / last.abs()
        } else {
            delta
        };
        (relative <= self.ftol).then(|| {
            StopReason::message(format!(
                "NormalizedChangeOverGeneration with {} over {} generations",
                self.ftol, self.gtol
            ))
        })
    }
}

/// Stop when the whole population huddles around member 0: every member is
/// within `xtol` (sup-norm) and `ftol` (energy) of it.
pub struct CandidateRelativeTolerance {
    pub xtol: f64,
    pub ftol: f64,
}

impl CandidateRelativeTolerance {
    pub fn new(xtol: f64, ftol: f64) -> Self {
        Self { xtol, ftol }
    }
}

impl Termination for CandidateRelativeTolerance {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        let pop = solver.population;
        let energies = solver.energies;
        let anchor = pop.row(0);
        let mut max_dx: f64 = 0.0;
        let mut max_de: f64 = 0.0;
        for i in 1..pop.nrows() {
            for j in 0..pop.ncols() {
                max_dx = max_dx.max((pop[[i, j]] - anchor[j]).abs());
            }
            max_de = max_de.max((energies[i] - energies[0]).abs());
        }
        (max_dx <= self.xtol && max_de <= self.ftol).then(|| {
            StopReason::message(format!(
                "CandidateRelativeTolerance with {} and {}",
                self.xtol, self.ftol
            ))
        })
    }
}

/// Stop when the last iteration improved the best energy by at most `tol`.
pub struct SolutionImprovement {
    pub tolerance: f64,
}

impl SolutionImprovement {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl Termination for SolutionImprovement {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        let history = solver.energy_history;
        if history.len() < 2 {
            return None;
        }
        let delta = history[history.len() - 2] - history[history.len() - 1];
        (delta <= self.tolerance).then(|| {
            StopReason::message(format!("SolutionImprovement with {}", self.tolerance))
        })
    }
}

// Shared shape of the detector-backed predicates: run the detector against
// the step monitor, stop when it finds anything, cache per iteration.
macro_rules! detector_check {
    ($self:ident, $solver:ident, $name:literal, $run:expr) => {{
        if let Some((generation, cached)) = &$self.cache {
            if *generation == $solver.generations {
                return cached.clone();
            }
        }
        let result = match $run {
            Ok(result) => result,
            Err(err) => panic!(concat!($name, " predicate misconfigured: {}"), err),
        };
        let outcome =
            (!result.is_empty()).then(|| StopReason::collapse($name, result));
        $self.cache = Some(($solver.generations, outcome.clone()));
        outcome
    }};
}

// Validate a mask eagerly by running the detector against an empty monitor;
// detectors check masks before touching history.
fn probe() -> crate::monitor::MonitorReader {
    Monitor::new().reader()
}

/// Stop when parameters collapse to a point (or to a given target).
pub struct CollapseAt {
    target: Option<Target>,
    tolerance: Tolerance,
    generations: usize,
    mask: Option<CollapseResult>,
    cache: Option<(usize, Option<StopReason>)>,
}

impl CollapseAt {
    pub fn new(target: Option<Target>, tolerance: impl Into<Tolerance>) -> Self {
        Self {
            target,
            tolerance: tolerance.into(),
            generations: DEFAULT_GENERATIONS,
            mask: None,
            cache: None,
        }
    }

    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Ignore previously reported indices; accepts an `Indices` mask.
    pub fn with_mask(mut self, mask: CollapseResult) -> Result<Self, DetectorError> {
        collapse::collapse_at(
            &probe(),
            self.target.as_ref(),
            &self.tolerance,
            self.generations,
            Some(&mask),
        )?;
        self.mask = Some(mask);
        Ok(self)
    }
}

impl Termination for CollapseAt {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        detector_check!(
            self,
            solver,
            "CollapseAt",
            collapse::collapse_at(
                &solver.step_monitor,
                self.target.as_ref(),
                &self.tolerance,
                self.generations,
                self.mask.as_ref(),
            )
        )
    }
}

/// Stop when parameter pairs collapse onto each other (or track at a fixed
/// offset).
pub struct CollapseAs {
    offset: bool,
    tolerance: f64,
    generations: usize,
    mask: Option<CollapseResult>,
    cache: Option<(usize, Option<StopReason>)>,
}

impl CollapseAs {
    pub fn new(offset: bool, tolerance: f64) -> Self {
        Self {
            offset,
            tolerance,
            generations: DEFAULT_GENERATIONS,
            mask: None,
            cache: None,
        }
    }

    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Accepts an `Indices` mask (all pairs touching) or a `Pairs` mask.
    pub fn with_mask(mut self, mask: CollapseResult) -> Result<Self, DetectorError> {
        collapse::collapse_as(
            &probe(),
            self.offset,
            self.tolerance,
            self.generations,
            Some(&mask),
        )?;
        self.mask = Some(mask);
        Ok(self)
    }
}

impl Termination for CollapseAs {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        detector_check!(
            self,
            solver,
            "CollapseAs",
            collapse::collapse_as(
                &solver.step_monitor,
                self.offset,
                self.tolerance,
                self.generations,
                self.mask.as_ref(),
            )
        )
    }
}

/// Stop when product-measure weights vanish.
pub struct CollapseWeight {
    tolerance: f64,
    generations: usize,
    mask: Option<CollapseResult>,
    cache: Option<(usize, Option<StopReason>)>,
}

impl CollapseWeight {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            generations: DEFAULT_GENERATIONS,
            mask: None,
            cache: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Accepts `ByMeasure`, `MeasureIndex` or `Where` masks; the variant
    /// also selects the payload shape of the stop reason.
    pub fn with_mask(mut self, mask: CollapseResult) -> Result<Self, DetectorError> {
        collapse::collapse_weight(&probe(), self.tolerance, self.generations, Some(&mask))?;
        self.mask = Some(mask);
        Ok(self)
    }
}

impl Default for CollapseWeight {
    fn default() -> Self {
        Self::new()
    }
}

impl Termination for CollapseWeight {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        detector_check!(
            self,
            solver,
            "CollapseWeight",
            collapse::collapse_weight(
                &solver.step_monitor,
                self.tolerance,
                self.generations,
                self.mask.as_ref(),
            )
        )
    }
}

/// Stop when product-measure positions coalesce pairwise.
pub struct CollapsePosition {
    tolerance: f64,
    generations: usize,
    mask: Option<CollapseResult>,
    cache: Option<(usize, Option<StopReason>)>,
}

impl CollapsePosition {
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            generations: DEFAULT_GENERATIONS,
            mask: None,
            cache: None,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Accepts `ByMeasurePairs`, `MeasurePair` or `WherePairs` masks.
    pub fn with_mask(mut self, mask: CollapseResult) -> Result<Self, DetectorError> {
        collapse::collapse_position(&probe(), self.tolerance, self.generations, Some(&mask))?;
        self.mask = Some(mask);
        Ok(self)
    }
}

impl Default for CollapsePosition {
    fn default() -> Self {
        Self::new()
    }
}

impl Termination for CollapsePosition {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        detector_check!(
            self,
            solver,
            "CollapsePosition",
            collapse::collapse_position(
                &solver.step_monitor,
                self.tolerance,
                self.generations,
                self.mask.as_ref(),
            )
        )
    }
}

/// Stop after a wall-clock budget; the clock starts at the first check.
pub struct Timeout {
    limit: Duration,
    started: Option<Instant>,
}

impl Timeout {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            started: None,
        }
    }
}

impl Termination for Timeout {
    fn check(&mut self, _solver: &SolverView<'_>) -> Option<StopReason> {
        let started = *self.started.get_or_insert_with(Instant::now);
        (started.elapsed() >= self.limit)
            .then(|| StopReason::message(format!("Timeout after {:?}", self.limit)))
    }
}

/// First condition to fire stops the solver (short-circuit).
pub struct Or {
    conditions: Vec<Box<dyn Termination>>,
}

impl Or {
    pub fn new(conditions: Vec<Box<dyn Termination>>) -> Self {
        Self { conditions }
    }
}

impl Termination for Or {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        self.conditions
            .iter_mut()
            .find_map(|condition| condition.check(solver))
    }
}

/// Stops only when every condition fires; their reasons are concatenated.
pub struct And {
    conditions: Vec<Box<dyn Termination>>,
}

impl And {
    pub fn new(conditions: Vec<Box<dyn Termination>>) -> Self {
        Self { conditions }
    }
}

impl Termination for And {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        let mut reasons = Vec::with_capacity(self.conditions.len());
        for condition in &mut self.conditions {
            match condition.check(solver) {
                Some(reason) => reasons.push(reason),
                None => return None,
            }
        }
        Some(StopReason::merge(reasons))
    }
}

/// Single-condition wrapper, for symmetry with `Or`/`And` composition.
pub struct When {
    condition: Box<dyn Termination>,
}

impl When {
    pub fn new(condition: Box<dyn Termination>) -> Self {
        Self { condition }
    }
}

impl Termination for When {
    fn check(&mut self, solver: &SolverView<'_>) -> Option<StopReason> {
        self.condition.check(solver)
    }
}
