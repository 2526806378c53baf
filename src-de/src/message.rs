//! Structured stop reasons and the collapse message codec.
//!
//! A [`StopReason`] carries the clauses that fired a termination predicate.
//! Its textual form follows the grammar
//! `reason := clause ("; " clause)*` where a detector-backed clause reads
//! `name at <payload>` with a JSON payload. The text is a pure projection:
//! [`collapsed`] parses it back into `{name: CollapseResult}` without loss.

use std::collections::BTreeMap;
use std::fmt;

use crate::collapse::CollapseResult;

/// One clause of a stop reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Plain predicate reason, e.g. `VTR with 0.001`.
    Message(String),
    /// Detector-backed reason, rendered as `{name} at {json payload}`.
    Collapse {
        name: String,
        result: CollapseResult,
    },
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Message(text) => f.write_str(text),
            Clause::Collapse { name, result } => {
                let payload = serde_json::to_string(result).map_err(|_| fmt::Error)?;
                write!(f, "{} at {}", name, payload)
            }
        }
    }
}

/// Why a solver stopped; clauses joined with `"; "` in the textual form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StopReason {
    clauses: Vec<Clause>,
}

impl StopReason {
    /// A single plain-text clause.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            clauses: vec![Clause::Message(text.into())],
        }
    }

    /// A single detector-backed clause.
    pub fn collapse(name: impl Into<String>, result: CollapseResult) -> Self {
        Self {
            clauses: vec![Clause::Collapse {
                name: name.into(),
                result,
            }],
        }
    }

    /// Concatenate the clauses of several reasons, in order.
    pub fn merge(reasons: impl IntoIterator<Item = StopReason>) -> Self {
        Self {
            clauses: reasons.into_iter().flat_map(|r| r.clauses).collect(),
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// The collapse clauses, keyed by detector name.
    pub fn collapses(&self) -> BTreeMap<String, CollapseResult> {
        self.clauses
            .iter()
            .filter_map(|clause| match clause {
                Clause::Collapse { name, result } => Some((name.clone(), result.clone())),
                Clause::Message(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, clause) in self.clauses.iter().enumerate() {
            if k > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

/// Extract the collapse results from a textual stop reason.
///
/// Splits on `"; "`, parses each `name at <payload>` clause and ignores
/// clauses without a parseable payload. Returns `None` when no collapse
/// clause is present.
pub fn collapsed(reason: &str) -> Option<BTreeMap<String, CollapseResult>> {
    let mut collapses = BTreeMap::new();
    for clause in reason.split("; ") {
        if let Some((name, payload)) = clause.rsplit_once(" at ") {
            if let Ok(result) = serde_json::from_str::<CollapseResult>(payload) {
                collapses.insert(name.to_string(), result);
            }
        }
    }
    (!collapses.is_empty()).then_some(collapses)
}
