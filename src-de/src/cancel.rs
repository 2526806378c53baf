//! Cooperative cancellation for the solver loops.
//!
//! The solvers never react to an interrupt mid-generation; they poll a
//! [`CancelToken`] at iteration boundaries only, so population and energies
//! always stay consistent. `hook_ctrlc` is the default adapter that trips
//! the token on SIGINT.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared early-exit flag polled by the solvers at the end of each iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a clean stop after the current iteration.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Install a process-wide Ctrl-C handler that trips this token.
    ///
    /// The handler can be installed once per process; a second call reports
    /// the underlying `ctrlc` error.
    pub fn hook_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let flag = self.flag.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
    }
}
