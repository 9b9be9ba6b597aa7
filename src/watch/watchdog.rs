//! Watchdog: one state machine evaluating one condition for one subject.
//!
//! Every watchdog owns its debounce state and at most one action callback,
//! and runs on its own thread. Two loop strategies exist: polling (query the
//! probe on a fixed interval) and event-subscribed (block on the instance
//! notification stream with a short timeout so pause/stop stays responsive).
//! A tick or callback that panics is caught and logged; the loop never dies
//! silently.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::errors::HsError;
use crate::logger::hub::{ActivityEvent, LoggerHandle};
use crate::probe::{HostProbe, InstanceEvent, ProbeSession, VisionProbe};
use crate::watch::condition::{ConditionKey, ConditionSpec, LoopStrategy, Subject};
use crate::watch::debounce::{self, DebounceState};

/// Registered action callback. `Arc` so firing can run it without holding the
/// registration lock (a callback may re-register itself).
pub type ActionFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Lifecycle state of a watchdog's run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    /// Not launched yet, or the loop has exited (terminal after shutdown).
    Stopped = 0,
    /// Loop is evaluating.
    Running = 1,
    /// Loop is alive but evaluation is suspended.
    Paused = 2,
}

impl RunState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }
}

/// Result of one evaluation (tick or event).
#[derive(Debug)]
pub enum TickOutcome {
    /// Condition not met, nothing fired.
    Idle,
    /// Trigger condition met; the registered action (if any) was invoked.
    Fired {
        /// Whether the action callback panicked (isolated, logged).
        action_panicked: bool,
    },
    /// The probe could not answer; state is unchanged.
    NoData(HsError),
}

/// Everything a run loop needs from the engine, cloned per launch.
#[derive(Clone)]
pub(crate) struct RunContext {
    pub(crate) probe: Arc<dyn HostProbe>,
    pub(crate) logger: LoggerHandle,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) poll_interval: Duration,
    pub(crate) pause_backoff: Duration,
    pub(crate) event_wait_timeout: Duration,
}

/// One watchdog per `(subject, condition key)` for the process lifetime.
pub struct Watchdog {
    subject: Subject,
    spec: ConditionSpec,
    key: ConditionKey,
    vision: Arc<dyn VisionProbe>,
    /// Condition-specific counters/flags. Locked only by the owning loop
    /// (and by tests driving `tick` directly).
    state: Mutex<DebounceState>,
    /// At most one callback; re-registration replaces.
    action: Mutex<Option<ActionFn>>,
    paused: AtomicBool,
    launched: AtomicBool,
    run_state: AtomicU8,
}

impl Watchdog {
    pub(crate) fn new(subject: Subject, spec: ConditionSpec, vision: Arc<dyn VisionProbe>) -> Self {
        let key = spec.key();
        let state = DebounceState::for_spec(&spec);
        Self {
            subject,
            spec,
            key,
            vision,
            state: Mutex::new(state),
            action: Mutex::new(None),
            paused: AtomicBool::new(false),
            launched: AtomicBool::new(false),
            run_state: AtomicU8::new(RunState::Stopped as u8),
        }
    }

    /// The subject this watchdog observes.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// The condition spec (immutable after creation).
    pub fn spec(&self) -> &ConditionSpec {
        &self.spec
    }

    /// Identity key within the owning watcher.
    pub fn key(&self) -> &ConditionKey {
        &self.key
    }

    /// `subject:kind` label used in thread names and logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.subject.name(), self.spec.kind().label())
    }

    /// Current run-loop state.
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::SeqCst))
    }

    /// Whether evaluation is currently suspended.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Snapshot of the debounce state (for tests and diagnostics).
    pub fn debounce_snapshot(&self) -> DebounceState {
        self.state.lock().clone()
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub(crate) fn set_action(&self, action: ActionFn) {
        *self.action.lock() = Some(action);
    }

    /// Mark launched. Returns false if the loop was already launched
    /// (launching twice is a no-op).
    pub(crate) fn mark_launched(&self) -> bool {
        !self.launched.swap(true, Ordering::SeqCst)
    }

    // ──────────────────── evaluation ────────────────────

    /// Evaluate one polling tick against the probe session.
    ///
    /// Must never panic past the caller: probe failures come back as
    /// [`TickOutcome::NoData`] with state unchanged; action panics are
    /// isolated and reported in the outcome.
    pub fn tick(&self, session: &mut dyn ProbeSession) -> TickOutcome {
        match &self.spec {
            ConditionSpec::HasNoWindow { grace_ticks } => {
                let instances = match session.list_instances(self.subject.name()) {
                    Ok(set) => set,
                    Err(err) => return TickOutcome::NoData(err),
                };
                let running = !instances.is_empty();
                // The window set is only needed while the subject runs; when
                // it does not, the observation is a reset either way.
                let has_window = if running {
                    match session.instances_with_visible_window() {
                        Ok(owners) => instances.iter().any(|pid| owners.contains(pid)),
                        Err(err) => return TickOutcome::NoData(err),
                    }
                } else {
                    false
                };
                let fired = match &mut *self.state.lock() {
                    DebounceState::NoWindow(state) => {
                        state.observe(*grace_ticks, running, has_window)
                    }
                    _ => false,
                };
                self.finish(fired)
            }
            ConditionSpec::IsExited => {
                let running = match session.list_instances(self.subject.name()) {
                    Ok(set) => !set.is_empty(),
                    Err(err) => return TickOutcome::NoData(err),
                };
                let fired = match &mut *self.state.lock() {
                    DebounceState::Exited(state) => state.observe(running),
                    _ => false,
                };
                self.finish(fired)
            }
            ConditionSpec::IsRunning { mode } => {
                let running = match session.list_instances(self.subject.name()) {
                    Ok(set) => !set.is_empty(),
                    Err(err) => return TickOutcome::NoData(err),
                };
                let fired = match &mut *self.state.lock() {
                    DebounceState::Running(state) => state.observe(*mode, running),
                    _ => false,
                };
                self.finish(fired)
            }
            ConditionSpec::IsTooBusy {
                threshold,
                duration_ticks,
            } => {
                let Subject::Hardware(resource) = &self.subject else {
                    // Rejected at construction; defensively idle.
                    return TickOutcome::Idle;
                };
                let per_unit = matches!(threshold, crate::watch::condition::BusyThreshold::PerUnit(_));
                let reading = match session.utilization(*resource, per_unit) {
                    Ok(reading) => reading,
                    Err(err) => return TickOutcome::NoData(err),
                };
                let Some(over) = debounce::reading_is_over(threshold, &reading) else {
                    return TickOutcome::NoData(HsError::probe(
                        self.subject.name(),
                        "utilization reading shape does not match the configured threshold",
                    ));
                };
                let fired = match &mut *self.state.lock() {
                    DebounceState::TooBusy(state) => state.observe(*duration_ticks, over),
                    _ => false,
                };
                self.finish(fired)
            }
            ConditionSpec::LooksLike {
                template,
                match_threshold,
                ..
            } => match self.vision.find_template(template, *match_threshold) {
                Ok(true) => self.finish(true),
                Ok(false) => TickOutcome::Idle,
                Err(err) => TickOutcome::NoData(err),
            },
        }
    }

    /// Process one instance event, synchronously, in arrival order.
    ///
    /// Deletion events re-check the live instance list so that losing one of
    /// several instances is not mistaken for a full exit.
    pub fn handle_event(
        &self,
        event: InstanceEvent,
        session: &mut dyn ProbeSession,
    ) -> TickOutcome {
        match (&self.spec, event) {
            (ConditionSpec::IsExited | ConditionSpec::IsRunning { .. }, _) => {
                let running = match event {
                    InstanceEvent::Created(_) => true,
                    InstanceEvent::Deleted(_) => {
                        match session.list_instances(self.subject.name()) {
                            Ok(set) => !set.is_empty(),
                            Err(err) => return TickOutcome::NoData(err),
                        }
                    }
                };
                let fired = match &mut *self.state.lock() {
                    DebounceState::Exited(state) => state.observe(running),
                    DebounceState::Running(state) => {
                        if let ConditionSpec::IsRunning { mode } = &self.spec {
                            state.observe(*mode, running)
                        } else {
                            false
                        }
                    }
                    _ => false,
                };
                self.finish(fired)
            }
            // Events delivered to a polling-kind watchdog carry no meaning.
            _ => TickOutcome::Idle,
        }
    }

    /// Arm edge state from the live instance list before entering the event
    /// loop, so a subject that was already running still produces an exit
    /// edge (and does not produce a spurious appearance edge).
    pub(crate) fn prime(&self, session: &mut dyn ProbeSession) {
        let Ok(instances) = session.list_instances(self.subject.name()) else {
            return;
        };
        if instances.is_empty() {
            return;
        }
        match &mut *self.state.lock() {
            DebounceState::Exited(state) => state.has_appeared = true,
            DebounceState::Running(state) => state.was_running = true,
            _ => {}
        }
    }

    fn finish(&self, fired: bool) -> TickOutcome {
        if fired {
            TickOutcome::Fired {
                action_panicked: self.fire(),
            }
        } else {
            TickOutcome::Idle
        }
    }

    /// Invoke the registered callback, if any. Returns whether it panicked.
    /// The panic is swallowed here so one failing action cannot stop this
    /// watchdog or any other.
    fn fire(&self) -> bool {
        let action = self.action.lock().clone();
        action.is_some_and(|action| {
            panic::catch_unwind(AssertUnwindSafe(|| action())).is_err()
        })
    }

    // ──────────────────── run loops ────────────────────

    /// Run loop entry point. Opens one probe session for the whole loop and
    /// releases it on exit.
    pub(crate) fn run(&self, ctx: &RunContext) {
        let subject = self.subject.name().to_string();
        let label = self.spec.describe();
        ctx.logger.send(ActivityEvent::WatchdogLaunched {
            subject: subject.clone(),
            condition: label.clone(),
        });

        let mut session = match ctx.probe.open_session() {
            Ok(session) => session,
            Err(err) => {
                ctx.logger.send(ActivityEvent::Error {
                    code: err.code().to_string(),
                    message: format!("watchdog '{}' could not open a probe session: {err}", self.label()),
                });
                self.run_state.store(RunState::Stopped as u8, Ordering::SeqCst);
                return;
            }
        };

        match self.spec.strategy() {
            LoopStrategy::Polling => self.run_polling(ctx, session.as_mut(), &subject, &label),
            LoopStrategy::EventSubscribed => {
                self.run_events(ctx, session.as_mut(), &subject, &label);
            }
        }

        self.run_state.store(RunState::Stopped as u8, Ordering::SeqCst);
        ctx.logger.send(ActivityEvent::WatchdogStopped {
            subject,
            condition: label,
        });
        // The session drops here: probe resources are scoped to the loop.
    }

    fn run_polling(
        &self,
        ctx: &RunContext,
        session: &mut dyn ProbeSession,
        subject: &str,
        label: &str,
    ) {
        let interval = self.spec.poll_interval(ctx.poll_interval);
        while !ctx.shutdown.load(Ordering::SeqCst) {
            if self.paused.load(Ordering::SeqCst) {
                self.run_state.store(RunState::Paused as u8, Ordering::SeqCst);
                thread::sleep(ctx.pause_backoff);
                continue;
            }
            self.run_state.store(RunState::Running as u8, Ordering::SeqCst);

            match panic::catch_unwind(AssertUnwindSafe(|| self.tick(session))) {
                Ok(outcome) => self.log_outcome(ctx, outcome, subject, label),
                Err(_) => ctx.logger.send(ActivityEvent::LoopPanic {
                    subject: subject.to_string(),
                    condition: label.to_string(),
                }),
            }

            thread::sleep(interval);
        }
    }

    fn run_events(
        &self,
        ctx: &RunContext,
        session: &mut dyn ProbeSession,
        subject: &str,
        label: &str,
    ) {
        self.prime(session);

        while !ctx.shutdown.load(Ordering::SeqCst) {
            let paused = self.paused.load(Ordering::SeqCst);
            let observed = if paused {
                RunState::Paused
            } else {
                RunState::Running
            };
            self.run_state.store(observed as u8, Ordering::SeqCst);

            let waited = panic::catch_unwind(AssertUnwindSafe(|| {
                session.next_instance_event(subject, ctx.event_wait_timeout)
            }));
            match waited {
                Err(_) => {
                    ctx.logger.send(ActivityEvent::LoopPanic {
                        subject: subject.to_string(),
                        condition: label.to_string(),
                    });
                    thread::sleep(ctx.pause_backoff);
                }
                Ok(Err(err)) => {
                    ctx.logger.send(ActivityEvent::ProbeError {
                        subject: subject.to_string(),
                        condition: label.to_string(),
                        details: err.to_string(),
                    });
                    // Back off so a persistently failing stream cannot spin.
                    thread::sleep(ctx.pause_backoff);
                }
                // Timeout: not an error, re-check pause/shutdown and wait again.
                Ok(Ok(None)) => {}
                Ok(Ok(Some(event))) => {
                    if paused {
                        // Evaluation is suspended; the edge is discarded, not
                        // deferred.
                        continue;
                    }
                    match panic::catch_unwind(AssertUnwindSafe(|| {
                        self.handle_event(event, session)
                    })) {
                        Ok(outcome) => self.log_outcome(ctx, outcome, subject, label),
                        Err(_) => ctx.logger.send(ActivityEvent::LoopPanic {
                            subject: subject.to_string(),
                            condition: label.to_string(),
                        }),
                    }
                }
            }
        }
    }

    fn log_outcome(&self, ctx: &RunContext, outcome: TickOutcome, subject: &str, label: &str) {
        match outcome {
            TickOutcome::Idle => {}
            TickOutcome::Fired { action_panicked } => {
                ctx.logger.send(ActivityEvent::ConditionFired {
                    subject: subject.to_string(),
                    condition: label.to_string(),
                });
                if action_panicked {
                    ctx.logger.send(ActivityEvent::ActionPanic {
                        subject: subject.to_string(),
                        condition: label.to_string(),
                    });
                }
            }
            TickOutcome::NoData(err) => ctx.logger.send(ActivityEvent::ProbeError {
                subject: subject.to_string(),
                condition: label.to_string(),
                details: err.to_string(),
            }),
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::hub::{HubConfig, spawn_logger};
    use crate::probe::mock::{MockProbe, MockVisionProbe};
    use crate::probe::{HardwareResource, NoopVisionProbe, Template, Utilization};
    use crate::watch::condition::{BusyThreshold, FireMode};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    fn dog(spec: ConditionSpec) -> Watchdog {
        Watchdog::new(
            Subject::Process("app.exe".to_string()),
            spec,
            Arc::new(NoopVisionProbe),
        )
    }

    fn counting_action(counter: &Arc<AtomicUsize>) -> ActionFn {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn no_window_tick_fires_after_grace_and_invokes_action() {
        let probe = MockProbe::new();
        probe.set_instances("app.exe", [100]);
        probe.set_windows([]);
        let mut session = probe.open_session().unwrap();

        let watchdog = dog(ConditionSpec::HasNoWindow { grace_ticks: 3 });
        let fires = Arc::new(AtomicUsize::new(0));
        watchdog.set_action(counting_action(&fires));

        for expected_fire in [false, false, true] {
            let outcome = watchdog.tick(session.as_mut());
            assert_eq!(matches!(outcome, TickOutcome::Fired { .. }), expected_fire);
        }
        assert_eq!(fires.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn probe_failure_is_no_data_and_leaves_state_unchanged() {
        let probe = MockProbe::new();
        probe.set_instances("app.exe", [100]);
        probe.set_windows([]);
        let mut session = probe.open_session().unwrap();

        let watchdog = dog(ConditionSpec::HasNoWindow { grace_ticks: 3 });
        watchdog.tick(session.as_mut());
        watchdog.tick(session.as_mut());
        let before = watchdog.debounce_snapshot();

        probe.fail_capability("windows", true);
        let outcome = watchdog.tick(session.as_mut());
        assert!(matches!(outcome, TickOutcome::NoData(_)));
        assert_eq!(watchdog.debounce_snapshot(), before);

        // Recovery: the third good observation completes the grace period.
        probe.fail_capability("windows", false);
        let outcome = watchdog.tick(session.as_mut());
        assert!(matches!(outcome, TickOutcome::Fired { .. }));
    }

    #[test]
    fn action_panic_is_isolated_and_reported() {
        let probe = MockProbe::new();
        probe.set_instances("app.exe", [100]);
        probe.set_windows([]);
        let mut session = probe.open_session().unwrap();

        let watchdog = dog(ConditionSpec::HasNoWindow { grace_ticks: 1 });
        watchdog.set_action(Arc::new(|| panic!("action blew up")));

        let outcome = watchdog.tick(session.as_mut());
        assert!(matches!(
            outcome,
            TickOutcome::Fired {
                action_panicked: true
            }
        ));

        // The watchdog keeps working after the panic.
        let outcome = watchdog.tick(session.as_mut());
        assert!(matches!(
            outcome,
            TickOutcome::Fired {
                action_panicked: true
            }
        ));
    }

    #[test]
    fn registering_a_second_action_replaces_the_first() {
        let probe = MockProbe::new();
        probe.set_instances("app.exe", [100]);
        probe.set_windows([]);
        let mut session = probe.open_session().unwrap();

        let watchdog = dog(ConditionSpec::HasNoWindow { grace_ticks: 1 });
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        watchdog.set_action(counting_action(&first));
        watchdog.set_action(counting_action(&second));

        watchdog.tick(session.as_mut());
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn too_busy_tick_follows_the_scripted_readings() {
        let probe = MockProbe::new();
        probe.queue_utilization(
            HardwareResource::Cpu,
            [95.0, 98.0, 99.0, 50.0, 92.0, 93.0]
                .into_iter()
                .map(Utilization::Aggregate),
        );
        let mut session = probe.open_session().unwrap();

        let watchdog = Watchdog::new(
            Subject::Hardware(HardwareResource::Cpu),
            ConditionSpec::IsTooBusy {
                threshold: BusyThreshold::Aggregate(90.0),
                duration_ticks: 2,
            },
            Arc::new(NoopVisionProbe),
        );
        let fires = Arc::new(AtomicUsize::new(0));
        watchdog.set_action(counting_action(&fires));

        let mut fired_at = Vec::new();
        for i in 1..=6 {
            if matches!(watchdog.tick(session.as_mut()), TickOutcome::Fired { .. }) {
                fired_at.push(i);
            }
        }
        assert_eq!(fired_at, vec![2, 6]);
        assert_eq!(fires.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn looks_like_fires_on_match_and_stays_stateless() {
        let vision = MockVisionProbe::new();
        vision.queue_results([Ok(false), Ok(true), Ok(true)]);
        let probe = MockProbe::new();
        let mut session = probe.open_session().unwrap();

        let watchdog = Watchdog::new(
            Subject::Hardware(HardwareResource::Screen),
            ConditionSpec::LooksLike {
                template: Arc::new(Template {
                    path: PathBuf::from("button.png"),
                    bytes: vec![1],
                }),
                match_threshold: 0.8,
                interval: Duration::ZERO,
            },
            Arc::new(vision),
        );

        assert!(matches!(watchdog.tick(session.as_mut()), TickOutcome::Idle));
        // Every match attempt is independent: back-to-back matches both fire.
        assert!(matches!(
            watchdog.tick(session.as_mut()),
            TickOutcome::Fired { .. }
        ));
        assert!(matches!(
            watchdog.tick(session.as_mut()),
            TickOutcome::Fired { .. }
        ));
    }

    #[test]
    fn exited_event_fires_only_when_no_instances_remain() {
        let probe = MockProbe::new();
        probe.set_instances("app.exe", [1, 2]);
        let mut session = probe.open_session().unwrap();

        let watchdog = dog(ConditionSpec::IsExited);
        watchdog.prime(session.as_mut());

        // One of two instances dies: not an exit.
        probe.set_instances("app.exe", [2]);
        let outcome = watchdog.handle_event(InstanceEvent::Deleted(1), session.as_mut());
        assert!(matches!(outcome, TickOutcome::Idle));

        // The last instance dies: exit confirmed.
        probe.set_instances("app.exe", []);
        let outcome = watchdog.handle_event(InstanceEvent::Deleted(2), session.as_mut());
        assert!(matches!(outcome, TickOutcome::Fired { .. }));

        // Re-arms on reappearance.
        let outcome = watchdog.handle_event(InstanceEvent::Created(3), session.as_mut());
        assert!(matches!(outcome, TickOutcome::Idle));
        probe.set_instances("app.exe", []);
        let outcome = watchdog.handle_event(InstanceEvent::Deleted(3), session.as_mut());
        assert!(matches!(outcome, TickOutcome::Fired { .. }));
    }

    #[test]
    fn running_edge_event_fires_once_per_appearance() {
        let probe = MockProbe::new();
        probe.set_instances("app.exe", []);
        let mut session = probe.open_session().unwrap();

        let watchdog = dog(ConditionSpec::IsRunning {
            mode: FireMode::Edge,
        });
        watchdog.prime(session.as_mut());

        let outcome = watchdog.handle_event(InstanceEvent::Created(1), session.as_mut());
        assert!(matches!(outcome, TickOutcome::Fired { .. }));
        // A second instance of an already-running subject is not a new edge.
        let outcome = watchdog.handle_event(InstanceEvent::Created(2), session.as_mut());
        assert!(matches!(outcome, TickOutcome::Idle));
    }

    #[test]
    fn priming_suppresses_the_stale_appearance_edge() {
        let probe = MockProbe::new();
        probe.set_instances("app.exe", [7]);
        let mut session = probe.open_session().unwrap();

        let watchdog = dog(ConditionSpec::IsRunning {
            mode: FireMode::Edge,
        });
        watchdog.prime(session.as_mut());

        // The subject was running before the loop started; a creation event
        // for yet another instance must not fire.
        let outcome = watchdog.handle_event(InstanceEvent::Created(8), session.as_mut());
        assert!(matches!(outcome, TickOutcome::Idle));
    }

    #[test]
    fn polling_loop_honors_pause_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (logger, logger_join) = spawn_logger(HubConfig {
            jsonl: Some(crate::logger::jsonl::JsonlConfig {
                path: dir.path().join("activity.jsonl"),
                ..Default::default()
            }),
            stderr_mirror: false,
            ..Default::default()
        })
        .unwrap();

        let probe = MockProbe::new();
        probe.set_instances("app.exe", [100]);
        probe.set_windows([100]);

        let watchdog = Arc::new(dog(ConditionSpec::HasNoWindow { grace_ticks: 3 }));
        let shutdown = Arc::new(AtomicBool::new(false));
        let ctx = RunContext {
            probe: Arc::new(probe),
            logger: logger.clone(),
            shutdown: Arc::clone(&shutdown),
            poll_interval: Duration::from_millis(5),
            pause_backoff: Duration::from_millis(5),
            event_wait_timeout: Duration::from_millis(20),
        };

        assert!(watchdog.mark_launched());
        assert!(!watchdog.mark_launched(), "second launch is a no-op");

        let loop_dog = Arc::clone(&watchdog);
        let handle = thread::spawn(move || loop_dog.run(&ctx));

        // Reaches Running, then honors pause, then exits on shutdown.
        wait_for(|| watchdog.run_state() == RunState::Running);
        watchdog.set_paused(true);
        wait_for(|| watchdog.run_state() == RunState::Paused);
        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();
        assert_eq!(watchdog.run_state(), RunState::Stopped);

        logger.shutdown();
        logger_join.join().unwrap();
    }

    fn wait_for(predicate: impl Fn() -> bool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !predicate() {
            assert!(
                std::time::Instant::now() < deadline,
                "condition not reached within 5s"
            );
            thread::sleep(Duration::from_millis(2));
        }
    }
}
