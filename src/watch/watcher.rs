//! Watcher façade: per-subject condition registration and reference-counted
//! pause/resume.
//!
//! One watcher exists per subject for the engine's lifetime; `attend` on the
//! same subject hands every caller the same underlying state, so independent
//! rule sets compose. Each distinct condition key maps to exactly one
//! watchdog, created lazily and never reset — re-requesting a condition with
//! identical parameters returns the existing instance with its accumulated
//! debounce state.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::errors::Result;
use crate::engine::EngineCore;
use crate::logger::hub::ActivityEvent;
use crate::probe::Template;
use crate::watch::condition::{
    BusyThreshold, ConditionKey, ConditionSpec, FireMode, Subject,
};
use crate::watch::watchdog::Watchdog;

/// Registration point for one condition on one subject.
///
/// At most one action per condition key: registering again replaces the
/// previous callback rather than adding a second one.
pub struct ConditionHandle {
    dog: Arc<Watchdog>,
}

impl ConditionHandle {
    /// Register (or replace) the action fired when the condition triggers.
    pub fn register<F>(&self, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.dog.set_action(Arc::new(action));
    }

    /// The underlying watchdog (shared identity across registration sites).
    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.dog
    }
}

/// Per-subject shared state: the condition map and the activation ref-count.
pub(crate) struct WatcherState {
    subject: Subject,
    /// Condition key → watchdog, in declaration order.
    conditions: Mutex<Vec<(ConditionKey, Arc<Watchdog>)>>,
    /// Activation references. The creator holds one from birth so a plain
    /// register-then-run flow evaluates without an explicit `start()`.
    active_refs: AtomicUsize,
}

impl WatcherState {
    pub(crate) fn new(subject: Subject) -> Self {
        Self {
            subject,
            conditions: Mutex::new(Vec::new()),
            active_refs: AtomicUsize::new(1),
        }
    }

    pub(crate) fn subject(&self) -> &Subject {
        &self.subject
    }
}

/// Cheap cloneable handle to a subject's watcher.
#[derive(Clone)]
pub struct Watcher {
    core: Arc<EngineCore>,
    state: Arc<WatcherState>,
}

impl Watcher {
    pub(crate) fn new(core: Arc<EngineCore>, state: Arc<WatcherState>) -> Self {
        Self { core, state }
    }

    /// The subject this watcher is bound to.
    pub fn subject(&self) -> &Subject {
        &self.state.subject
    }

    /// Whether at least one activation reference is outstanding.
    pub fn is_active(&self) -> bool {
        self.state.active_refs.load(Ordering::SeqCst) > 0
    }

    /// Current activation reference count.
    pub fn active_refs(&self) -> usize {
        self.state.active_refs.load(Ordering::SeqCst)
    }

    // ──────────────────── condition registration ────────────────────

    /// Subject runs but owns no visible window for `grace_ticks` consecutive
    /// ticks.
    pub fn has_no_window(&self, grace_ticks: u32) -> Result<ConditionHandle> {
        self.condition(ConditionSpec::HasNoWindow { grace_ticks })
    }

    /// Subject transitions from observed-running to zero instances.
    pub fn is_exited(&self) -> Result<ConditionHandle> {
        self.condition(ConditionSpec::IsExited)
    }

    /// Subject has at least one running instance.
    pub fn is_running(&self, mode: FireMode) -> Result<ConditionHandle> {
        self.condition(ConditionSpec::IsRunning { mode })
    }

    /// Resource utilization stays over threshold for `duration_ticks`
    /// consecutive readings.
    pub fn is_too_busy(
        &self,
        threshold: BusyThreshold,
        duration_ticks: u32,
    ) -> Result<ConditionHandle> {
        self.condition(ConditionSpec::IsTooBusy {
            threshold,
            duration_ticks,
        })
    }

    /// A reference image is visible on screen. The template file is loaded
    /// here, so a missing file rejects the rule instead of failing at the
    /// first tick.
    pub fn looks_like(
        &self,
        template_path: impl AsRef<Path>,
        match_threshold: f64,
        interval: Duration,
    ) -> Result<ConditionHandle> {
        let template = Arc::new(Template::load(template_path)?);
        self.condition(ConditionSpec::LooksLike {
            template,
            match_threshold,
            interval,
        })
    }

    fn condition(&self, spec: ConditionSpec) -> Result<ConditionHandle> {
        spec.validate(&self.state.subject, self.core.probe())?;

        let key = spec.key();
        let mut conditions = self.state.conditions.lock();
        if let Some((_, existing)) = conditions.iter().find(|(k, _)| *k == key) {
            return Ok(ConditionHandle {
                dog: Arc::clone(existing),
            });
        }

        let dog = Arc::new(Watchdog::new(
            self.state.subject.clone(),
            spec,
            self.core.vision(),
        ));
        // Watchdogs inherit the watcher's current activation state.
        if self.state.active_refs.load(Ordering::SeqCst) == 0 {
            dog.set_paused(true);
        }
        conditions.push((key, Arc::clone(&dog)));
        drop(conditions);

        self.core.register_watchdog(&dog);
        Ok(ConditionHandle { dog })
    }

    // ──────────────────── activation ────────────────────

    /// Add one activation reference. The 0→1 transition resumes every owned
    /// watchdog.
    pub fn start(&self) {
        let previous = self.state.active_refs.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            for (_, dog) in self.state.conditions.lock().iter() {
                dog.set_paused(false);
            }
            self.core.logger().send(ActivityEvent::SubjectActivated {
                subject: self.state.subject.name().to_string(),
            });
        }
    }

    /// Drop one activation reference (floored at zero). The 1→0 transition
    /// pauses every owned watchdog; accumulated debounce state is kept.
    pub fn stop(&self) {
        loop {
            let current = self.state.active_refs.load(Ordering::SeqCst);
            if current == 0 {
                return;
            }
            if self
                .state
                .active_refs
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                if current == 1 {
                    for (_, dog) in self.state.conditions.lock().iter() {
                        dog.set_paused(true);
                    }
                    self.core.logger().send(ActivityEvent::SubjectPaused {
                        subject: self.state.subject.name().to_string(),
                    });
                }
                return;
            }
        }
    }
}

// Behavioral tests for the watcher live with the engine (`crate::engine`),
// which owns construction; the scenarios in `tests/` drive the public API.
