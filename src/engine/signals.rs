//! Signal handling: SIGTERM/SIGINT graceful shutdown.
//!
//! Uses the `signal-hook` crate for safe signal registration. Run loops poll
//! the shared shutdown flag each iteration rather than blocking on signals,
//! so delivery is observed at the next iteration boundary.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Thread-safe signal state shared between the signal handler and the engine.
///
/// The flag uses `Ordering::Relaxed` because run loops poll it every
/// iteration and exact ordering with other atomics is not required.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Register OS signal hooks against an existing shutdown flag (typically
    /// [`crate::engine::Engine::shutdown_flag`]).
    ///
    /// SIGTERM/SIGINT -> shutdown. Registration is best-effort; failures are
    /// logged to stderr but not fatal.
    pub fn install(shutdown_flag: Arc<AtomicBool>) -> Self {
        let handler = Self { shutdown_flag };
        handler.register_signals();
        handler
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Programmatically request shutdown (e.g. from error escalation).
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[HS-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[HS-SIGNAL] failed to register SIGINT: {e}");
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_handler() -> SignalHandler {
        SignalHandler {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn default_state_is_not_shutdown() {
        let handler = bare_handler();
        assert!(!handler.should_shutdown());
    }

    #[test]
    fn programmatic_shutdown_request() {
        let handler = bare_handler();
        handler.request_shutdown();
        assert!(handler.should_shutdown());
    }

    #[test]
    fn handler_is_clone_and_shares_the_flag() {
        let handler = bare_handler();
        let clone = handler.clone();
        handler.request_shutdown();
        assert!(clone.should_shutdown());
    }

    #[test]
    fn install_wires_an_external_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let handler = SignalHandler::install(Arc::clone(&flag));
        flag.store(true, Ordering::Relaxed);
        assert!(handler.should_shutdown());
    }
}
