//! Engine: the explicit context object owning watchers, the watchdog
//! registry, probe handles, and the shutdown flag.
//!
//! There is no process-global registry; everything hangs off an [`Engine`]
//! value, so multiple engines can coexist (tests) and shutdown composes.
//! `start()` launches one thread per watchdog and blocks the caller until
//! every run loop has exited — the program's main wait point.

#[cfg(feature = "daemon")]
pub mod signals;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::config::EngineConfig;
use crate::core::errors::{HsError, Result};
use crate::logger::hub::{ActivityEvent, LoggerHandle, spawn_logger};
use crate::probe::system::SystemProbe;
use crate::probe::{HostProbe, NoopVisionProbe, VisionProbe};
use crate::watch::condition::Subject;
use crate::watch::watchdog::{RunContext, Watchdog};
use crate::watch::watcher::{Watcher, WatcherState};

/// Shared engine internals. Watchers hold an `Arc` to this.
pub(crate) struct EngineCore {
    config: EngineConfig,
    probe: Arc<dyn HostProbe>,
    vision: Arc<dyn VisionProbe>,
    logger: LoggerHandle,
    logger_join: Mutex<Option<thread::JoinHandle<()>>>,
    /// One watcher per subject, created on first `attend`.
    watchers: Mutex<Vec<Arc<WatcherState>>>,
    /// Every watchdog ever created, in creation order. Append-only.
    watchdogs: Mutex<Vec<Arc<Watchdog>>>,
    /// Join handles of launched run loops.
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
    started: AtomicBool,
    shutdown: Arc<AtomicBool>,
    created_at: Instant,
}

impl EngineCore {
    pub(crate) fn probe(&self) -> &dyn HostProbe {
        self.probe.as_ref()
    }

    pub(crate) fn vision(&self) -> Arc<dyn VisionProbe> {
        Arc::clone(&self.vision)
    }

    pub(crate) fn logger(&self) -> &LoggerHandle {
        &self.logger
    }

    /// Append a newly created watchdog; launch it right away when the engine
    /// is already running.
    pub(crate) fn register_watchdog(&self, dog: &Arc<Watchdog>) {
        self.watchdogs.lock().push(Arc::clone(dog));
        if self.started.load(Ordering::SeqCst) && !self.shutdown.load(Ordering::SeqCst)
            && let Err(err) = self.launch(dog)
        {
            self.logger.send(ActivityEvent::Error {
                code: err.code().to_string(),
                message: format!("failed to launch watchdog '{}': {err}", dog.label()),
            });
        }
    }

    /// Launch a watchdog's run loop. Idempotent: an already-launched watchdog
    /// is a no-op.
    fn launch(&self, dog: &Arc<Watchdog>) -> Result<()> {
        if !dog.mark_launched() {
            return Ok(());
        }
        let ctx = RunContext {
            probe: Arc::clone(&self.probe),
            logger: self.logger.clone(),
            shutdown: Arc::clone(&self.shutdown),
            poll_interval: self.config.engine.poll_interval(),
            pause_backoff: self.config.engine.pause_backoff(),
            event_wait_timeout: self.config.engine.event_wait_timeout(),
        };
        let runner = Arc::clone(dog);
        let handle = thread::Builder::new()
            .name(format!("sentry({})", dog.label()))
            .spawn(move || runner.run(&ctx))
            .map_err(|source| HsError::Runtime {
                details: format!("failed to spawn watchdog thread: {source}"),
            })?;
        self.handles.lock().push(handle);
        Ok(())
    }

    fn stop_logger(&self) {
        self.logger.shutdown();
        if let Some(join) = self.logger_join.lock().take() {
            let _ = join.join();
        }
    }
}

impl Drop for EngineCore {
    fn drop(&mut self) {
        // Engines that were never started still own the logger thread.
        self.stop_logger();
    }
}

/// The condition-monitoring engine. Cheap to clone; clones share one core.
#[derive(Clone)]
pub struct Engine {
    core: Arc<EngineCore>,
}

impl Engine {
    /// Engine with the production probe backends.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_probes(config, Arc::new(SystemProbe::new()), Arc::new(NoopVisionProbe))
    }

    /// Engine with injected probes (mock backends, platform window
    /// enumerators, real vision probes).
    pub fn with_probes(
        config: EngineConfig,
        probe: Arc<dyn HostProbe>,
        vision: Arc<dyn VisionProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let (logger, logger_join) = spawn_logger(config.hub_config())?;
        Ok(Self {
            core: Arc::new(EngineCore {
                config,
                probe,
                vision,
                logger,
                logger_join: Mutex::new(Some(logger_join)),
                watchers: Mutex::new(Vec::new()),
                watchdogs: Mutex::new(Vec::new()),
                handles: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                shutdown: Arc::new(AtomicBool::new(false)),
                created_at: Instant::now(),
            }),
        })
    }

    /// Acquire the watcher for a subject, resolving the subject kind against
    /// the fixed hardware keyword set. Repeated calls for the same subject
    /// (case-insensitive) return the same underlying watcher.
    pub fn attend(&self, name: &str) -> Watcher {
        let subject = Subject::resolve(name);
        let mut watchers = self.core.watchers.lock();
        let state = watchers
            .iter()
            .find(|existing| {
                existing.subject().is_process() == subject.is_process()
                    && existing.subject().name().eq_ignore_ascii_case(subject.name())
            })
            .map(Arc::clone);
        let state = match state {
            Some(state) => state,
            None => {
                let state = Arc::new(WatcherState::new(subject));
                watchers.push(Arc::clone(&state));
                state
            }
        };
        drop(watchers);
        Watcher::new(Arc::clone(&self.core), state)
    }

    /// Launch every registered watchdog and block until all run loops exit.
    ///
    /// Idempotent per watchdog; watchdogs registered while the engine runs
    /// are launched immediately. With nothing registered this warns and
    /// returns instead of blocking forever.
    pub fn start(&self) -> Result<()> {
        let dogs: Vec<Arc<Watchdog>> = self.core.watchdogs.lock().clone();
        if dogs.is_empty() {
            eprintln!("[HS-ENGINE] no watchdogs configured, nothing to start");
            return Ok(());
        }

        self.core.started.store(true, Ordering::SeqCst);
        self.core.logger.send(ActivityEvent::EngineStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            watchdogs: dogs.len(),
        });

        for dog in &dogs {
            if let Err(err) = self.core.launch(dog) {
                self.core.logger.send(ActivityEvent::Error {
                    code: err.code().to_string(),
                    message: format!("failed to launch watchdog '{}': {err}", dog.label()),
                });
            }
        }

        // Block until every run loop (including late registrations) exits.
        loop {
            let handle = self.core.handles.lock().pop();
            match handle {
                Some(handle) => {
                    let _ = handle.join();
                }
                None => break,
            }
        }

        let uptime_secs = self.core.created_at.elapsed().as_secs();
        self.core.logger.send(ActivityEvent::EngineStopped {
            reason: "clean shutdown".to_string(),
            uptime_secs,
        });
        self.core.stop_logger();
        eprintln!("[HS-ENGINE] shutdown complete (uptime={uptime_secs}s)");
        Ok(())
    }

    /// Request cooperative shutdown. Observed by every run loop at its next
    /// iteration boundary (bounded by poll interval / event-wait timeout).
    pub fn request_shutdown(&self) {
        self.core.shutdown.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.core.shutdown.load(Ordering::SeqCst)
    }

    /// Shared shutdown flag, for wiring into a signal handler.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.core.shutdown)
    }

    /// Number of watchdogs registered so far.
    pub fn watchdog_count(&self) -> usize {
        self.core.watchdogs.lock().len()
    }

    /// Watchdogs in creation order (snapshot).
    pub fn watchdogs(&self) -> Vec<Arc<Watchdog>> {
        self.core.watchdogs.lock().clone()
    }

    /// The engine's logger handle.
    pub fn logger(&self) -> LoggerHandle {
        self.core.logger.clone()
    }

    /// Dropped-log-event counter (back-pressure diagnostics).
    pub fn dropped_log_events(&self) -> u64 {
        self.core.logger.dropped_events()
    }

    /// Default polling interval from the engine configuration.
    pub fn poll_interval(&self) -> Duration {
        self.core.config.engine.poll_interval()
    }

    /// Default grace period for rules that do not specify one.
    pub fn default_grace_ticks(&self) -> u32 {
        self.core.config.engine.default_grace_ticks
    }
}

// ──────────────────── tests ────────────────────
