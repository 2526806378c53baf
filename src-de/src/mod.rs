//! Differential Evolution (DE) global optimizer with collapse detection
//!
//! A population-based global optimization core in pure Rust using ndarray,
//! built around Storn & Price's differential evolution algorithm.
//!
//! Supported features:
//! - Two solver disciplines: in-place updates ([`DifferentialEvolutionSolver`])
//!   and invariant generations with an injectable, order-preserving
//!   evaluation mapper ([`DifferentialEvolutionSolver2`])
//! - Ten mutation strategies (best/rand/rand-to-best, one or two difference
//!   pairs) with binomial or exponential crossover
//! - Strict box constraints: hard rejection in the main loop, clipped
//!   initial populations
//! - Composable termination predicates (`VTR`, change-over-generation,
//!   candidate spread, wall clock, `And`/`Or`/`When`)
//! - Append-only monitors with reader/writer capabilities and CSV dump
//! - Collapse detectors mining monitor history for degenerate dimensions:
//!   parameters pinned to a value, pairs tracking each other, vanishing
//!   product-measure weights, coalescing product-measure positions
//! - A structured stop-reason codec: detector results travel inside the
//!   termination reason and parse back losslessly
//! - Cooperative cancellation polled at iteration boundaries, with a
//!   Ctrl-C adapter
//! - A scipy-like one-call interface: [`diffev`]

pub mod bounds;
pub mod cancel;
pub mod collapse;
pub mod de;
pub mod diffev;
pub mod error;
pub mod mapper;
pub mod message;
pub mod monitor;
pub mod solver;
pub mod strategy;
pub mod termination;
pub mod wrapper;

pub use cancel::CancelToken;
pub use collapse::{
    CollapseResult, DEFAULT_GENERATIONS, DEFAULT_TOLERANCE, Target, Tolerance, collapse_as,
    collapse_at, collapse_position, collapse_weight,
};
pub use de::{DifferentialEvolutionSolver, DifferentialEvolutionSolver2};
pub use diffev::{DiffevOptions, DiffevResult, InitialPoint, diffev};
pub use error::{ConfigError, DetectorError};
pub use mapper::{GenerationMapper, RayonMapper, SequentialMapper};
pub use message::{Clause, StopReason, collapsed};
pub use monitor::{Monitor, MonitorReader, Record};
pub use solver::{
    LatinHypercube, Sampler, SolveOptions, SolverCore, SolverView, UniformRandom, Warnflag,
};
pub use strategy::{Crossover, Strategy};
pub use termination::{
    And, CandidateRelativeTolerance, ChangeOverGeneration, CollapseAs, CollapseAt,
    CollapsePosition, CollapseWeight, NormalizedChangeOverGeneration, Or, SolutionImprovement,
    Termination, Timeout, VTR, When,
};
pub use wrapper::wrap_function;
