//! Cost-function wrapping.
//!
//! [`wrap_function`] pairs a cost with a shared call counter and an optional
//! evaluation monitor: every call increments the counter and records
//! `(x, f(x))` before returning. Termination predicates read the counter
//! through the solver state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array1;

use crate::monitor::Monitor;

/// Wrap `func` so each evaluation is counted and fed to `evalmon`.
///
/// Returns the counter and the wrapped cost. The counter is an atomic so
/// the wrapped cost stays `Sync` and can be driven by a parallel mapper;
/// bounds guards compose *outside* this wrapper, so rejected candidates are
/// never counted.
pub fn wrap_function<F>(
    func: F,
    evalmon: Option<Monitor>,
) -> (Arc<AtomicUsize>, impl Fn(&Array1<f64>) -> f64 + Sync)
where
    F: Fn(&Array1<f64>) -> f64 + Sync,
{
    let fcalls = Arc::new(AtomicUsize::new(0));
    let counter = fcalls.clone();
    let wrapped = move |x: &Array1<f64>| {
        let fx = func(x);
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(monitor) = &evalmon {
            monitor.record(x, fx);
        }
        fx
    };
    (fcalls, wrapped)
}
