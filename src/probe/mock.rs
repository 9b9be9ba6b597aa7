//! Deterministic scripted probe for tests and demos.
//!
//! The mock models a tiny host "world" (running instances, window owners,
//! utilization readings, queued instance events) that a test mutates while
//! watchdogs observe it. All sessions opened from one [`MockProbe`] share the
//! same world, mirroring how real sessions observe one host.

#![allow(missing_docs)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::errors::{HsError, Result};
use crate::probe::{
    HardwareResource, HostProbe, InstanceEvent, InstanceId, ProbeSession, Template, Utilization,
    VisionProbe,
};

/// Granularity of the mock's event-wait poll loop.
const MOCK_EVENT_POLL_STEP: Duration = Duration::from_millis(5);

#[derive(Default)]
struct MockWorld {
    instances: HashMap<String, HashSet<InstanceId>>,
    windows: HashSet<InstanceId>,
    /// Scripted readings consumed front-to-back; `steady` is used once a
    /// script runs dry.
    scripted_utilization: HashMap<HardwareResource, VecDeque<Utilization>>,
    steady_utilization: HashMap<HardwareResource, Utilization>,
    unit_counts: HashMap<HardwareResource, usize>,
    events: HashMap<String, VecDeque<InstanceEvent>>,
    /// Capabilities that currently fail with a transient query error.
    failing: HashSet<&'static str>,
}

/// Shared scripted probe. Clone it to keep a mutation handle while the engine
/// owns another clone.
#[derive(Clone, Default)]
pub struct MockProbe {
    world: Arc<Mutex<MockWorld>>,
    sessions_opened: Arc<AtomicUsize>,
}

impl MockProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions opened so far (one per launched run loop).
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    // ──────────── world mutation ────────────

    pub fn set_instances(&self, name: &str, pids: impl IntoIterator<Item = InstanceId>) {
        self.world
            .lock()
            .instances
            .insert(name.to_ascii_lowercase(), pids.into_iter().collect());
    }

    pub fn set_windows(&self, pids: impl IntoIterator<Item = InstanceId>) {
        self.world.lock().windows = pids.into_iter().collect();
    }

    pub fn set_utilization(&self, resource: HardwareResource, reading: Utilization) {
        self.world
            .lock()
            .steady_utilization
            .insert(resource, reading);
    }

    pub fn queue_utilization(
        &self,
        resource: HardwareResource,
        readings: impl IntoIterator<Item = Utilization>,
    ) {
        self.world
            .lock()
            .scripted_utilization
            .entry(resource)
            .or_default()
            .extend(readings);
    }

    pub fn set_unit_count(&self, resource: HardwareResource, count: usize) {
        self.world.lock().unit_counts.insert(resource, count);
    }

    pub fn push_event(&self, name: &str, event: InstanceEvent) {
        self.world
            .lock()
            .events
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push_back(event);
    }

    /// Make a capability fail with a transient probe error until cleared.
    /// Capabilities: `"instances"`, `"windows"`, `"utilization"`.
    pub fn fail_capability(&self, capability: &'static str, failing: bool) {
        let mut world = self.world.lock();
        if failing {
            world.failing.insert(capability);
        } else {
            world.failing.remove(capability);
        }
    }
}

impl HostProbe for MockProbe {
    fn open_session(&self) -> Result<Box<dyn ProbeSession>> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            world: Arc::clone(&self.world),
        }))
    }
}

struct MockSession {
    world: Arc<Mutex<MockWorld>>,
}

impl MockSession {
    fn check_failing(&self, capability: &'static str, subject: &str) -> Result<()> {
        if self.world.lock().failing.contains(capability) {
            return Err(HsError::probe(
                subject,
                format!("scripted {capability} failure"),
            ));
        }
        Ok(())
    }
}

impl ProbeSession for MockSession {
    fn list_instances(&mut self, name: &str) -> Result<HashSet<InstanceId>> {
        self.check_failing("instances", name)?;
        Ok(self
            .world
            .lock()
            .instances
            .get(&name.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    fn instances_with_visible_window(&mut self) -> Result<HashSet<InstanceId>> {
        self.check_failing("windows", "windows")?;
        Ok(self.world.lock().windows.clone())
    }

    fn utilization(&mut self, resource: HardwareResource, _per_unit: bool) -> Result<Utilization> {
        self.check_failing("utilization", resource.name())?;
        let mut world = self.world.lock();
        if let Some(script) = world.scripted_utilization.get_mut(&resource)
            && let Some(reading) = script.pop_front()
        {
            return Ok(reading);
        }
        world
            .steady_utilization
            .get(&resource)
            .cloned()
            .ok_or_else(|| HsError::probe(resource.name(), "no scripted utilization reading"))
    }

    fn unit_count(&mut self, resource: HardwareResource) -> Result<usize> {
        Ok(self
            .world
            .lock()
            .unit_counts
            .get(&resource)
            .copied()
            .unwrap_or(1))
    }

    fn next_instance_event(
        &mut self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<InstanceEvent>> {
        let key = name.to_ascii_lowercase();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self
                .world
                .lock()
                .events
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
            {
                return Ok(Some(event));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(MOCK_EVENT_POLL_STEP.min(deadline - now));
        }
    }
}

// ──────────────────── scripted vision ────────────────────

/// Vision probe whose answers are a scripted sequence of match results.
#[derive(Clone, Default)]
pub struct MockVisionProbe {
    script: Arc<Mutex<VecDeque<Result<bool>>>>,
    steady: Arc<Mutex<Option<bool>>>,
}

impl MockVisionProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_found(&self, found: bool) {
        *self.steady.lock() = Some(found);
    }

    pub fn queue_results(&self, results: impl IntoIterator<Item = Result<bool>>) {
        self.script.lock().extend(results);
    }
}

impl VisionProbe for MockVisionProbe {
    fn find_template(&self, _template: &Template, _threshold: f64) -> Result<bool> {
        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        self.steady
            .lock()
            .ok_or_else(|| HsError::probe("screen", "no scripted match result"))
    }
}

// ──────────────────── tests ────────────────────
