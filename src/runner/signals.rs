//! SIGINT/SIGTERM handling for the host driver.
//!
//! Signals only set a flag; the driver polls it between ticks, aborts the
//! remote test and reports the run as aborted.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Shared abort flag set by OS signals or programmatically.
#[derive(Clone)]
pub struct SignalHandler {
    abort_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Register SIGINT and SIGTERM hooks. Registration is best-effort;
    /// failures are reported on stderr.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// Handler with no OS hooks, for hosts and tests that drive the flag
    /// themselves.
    #[must_use]
    pub fn unregistered() -> Self {
        Self {
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_abort(&self) -> bool {
        self.abort_flag.load(Ordering::Relaxed)
    }

    pub fn request_abort(&self) {
        self.abort_flag.store(true, Ordering::Relaxed);
    }

    /// The flag itself, for [`TestMonitor::with_abort_flag`](crate::runner::driver::TestMonitor::with_abort_flag).
    #[must_use]
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort_flag)
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.abort_flag)) {
            eprintln!("[LG-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.abort_flag)) {
            eprintln!("[LG-SIGNAL] failed to register SIGINT: {e}");
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
