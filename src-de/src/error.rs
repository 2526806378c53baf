//! Error types for solver configuration and collapse detection.
//!
//! Programmer mistakes (shapes, parameter ranges, unsupported masks) are
//! reported synchronously through these enums. Runtime conditions such as
//! exhausted evaluation limits or interrupts are not errors; they surface as
//! a [`crate::solver::Warnflag`] and a recorded stop reason.

use thiserror::Error;

/// Raised by `set_*` configuration calls and by `solve` before the main loop
/// starts. Never raised once iteration has begun.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("dimension mismatch: expected a vector of length {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("bound[{index}] has upper < lower ({upper} < {lower})")]
    InvertedBound {
        index: usize,
        lower: f64,
        upper: f64,
    },

    #[error("scaling factor F must lie in (0, 2], got {0}")]
    ScalingFactor(f64),

    #[error("crossover probability CR must lie in [0, 1], got {0}")]
    CrossProbability(f64),

    #[error("population of {npop} is too small for {strategy}: needs at least {min} members")]
    PopulationTooSmall {
        strategy: &'static str,
        npop: usize,
        min: usize,
    },

    #[error("failed to install interrupt handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),
}

/// Raised by the collapse detectors before any monitor data is read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectorError {
    #[error("{detector} does not accept a {variant} mask")]
    UnsupportedMask {
        detector: &'static str,
        variant: &'static str,
    },

    #[error("where-mask vectors differ in length: {measures} measures vs {entries} entries")]
    RaggedWhereMask { measures: usize, entries: usize },

    #[error("per-index tolerance has length {got}, expected {expected}")]
    ToleranceLength { expected: usize, got: usize },

    #[error("per-index target has length {got}, expected {expected}")]
    TargetLength { expected: usize, got: usize },
}
