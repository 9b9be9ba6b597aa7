//! Production probe backend over the `sysinfo` crate.
//!
//! Process enumeration, CPU and RAM utilization come straight from sysinfo.
//! Instance creation/deletion events are synthesized by set-diffing process
//! snapshots inside the caller's timeout window. Window enumeration has no
//! portable source; a platform-specific enumerator can be plugged in and is
//! then shared across all process watchdogs through the [`WindowSnapshot`]
//! TTL cache. GPU utilization is reported as unsupported.

#![allow(clippy::cast_precision_loss)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sysinfo::{ProcessesToUpdate, System};

use crate::core::errors::{HsError, Result};
use crate::probe::{
    HardwareResource, HostProbe, InstanceEvent, InstanceId, ProbeSession, Utilization,
    WindowSnapshot,
};

/// Pluggable window-owner enumerator (e.g. Win32 `EnumWindows` behind FFI in a
/// consumer crate). Returns the set of instance ids owning a visible window.
pub type WindowEnumerator = dyn Fn() -> Result<HashSet<InstanceId>> + Send + Sync;

/// Sleep granularity while waiting inside `next_instance_event`.
const EVENT_POLL_STEP: Duration = Duration::from_millis(200);

/// Freshness window for the shared window-owner snapshot.
const WINDOW_SNAPSHOT_TTL: Duration = Duration::from_millis(500);

/// sysinfo-backed [`HostProbe`].
pub struct SystemProbe {
    windows: Arc<WindowSnapshot>,
    window_enumerator: Option<Arc<WindowEnumerator>>,
}

impl SystemProbe {
    /// Probe with no window enumerator: window queries report unsupported,
    /// which no-window watchdogs treat as "no data this tick".
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: WindowSnapshot::new(WINDOW_SNAPSHOT_TTL),
            window_enumerator: None,
        }
    }

    /// Probe with a platform window enumerator plugged in.
    #[must_use]
    pub fn with_window_enumerator(
        enumerator: impl Fn() -> Result<HashSet<InstanceId>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            windows: WindowSnapshot::new(WINDOW_SNAPSHOT_TTL),
            window_enumerator: Some(Arc::new(enumerator)),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SystemProbe {
    fn open_session(&self) -> Result<Box<dyn ProbeSession>> {
        Ok(Box::new(SystemSession {
            sys: System::new(),
            windows: Arc::clone(&self.windows),
            window_enumerator: self.window_enumerator.clone(),
            prev_instances: HashMap::new(),
            pending_events: VecDeque::new(),
        }))
    }
}

/// One sysinfo session per run loop. The `System` refresh state lives here,
/// scoped to the loop's lifetime.
struct SystemSession {
    sys: System,
    windows: Arc<WindowSnapshot>,
    window_enumerator: Option<Arc<WindowEnumerator>>,
    /// Last seen instance set per subject name, for event synthesis.
    prev_instances: HashMap<String, HashSet<InstanceId>>,
    /// Events synthesized but not yet delivered, in arrival order.
    pending_events: VecDeque<InstanceEvent>,
}

impl SystemSession {
    fn snapshot_instances(&mut self, name: &str) -> HashSet<InstanceId> {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        self.sys
            .processes()
            .iter()
            .filter(|(_, p)| {
                p.name()
                    .to_string_lossy()
                    .eq_ignore_ascii_case(name)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }
}

impl ProbeSession for SystemSession {
    fn list_instances(&mut self, name: &str) -> Result<HashSet<InstanceId>> {
        Ok(self.snapshot_instances(name))
    }

    fn instances_with_visible_window(&mut self) -> Result<HashSet<InstanceId>> {
        match &self.window_enumerator {
            Some(enumerator) => {
                let enumerator = Arc::clone(enumerator);
                self.windows.get(move || enumerator())
            }
            None => Err(HsError::ProbeUnsupported {
                capability: "window enumeration",
            }),
        }
    }

    fn utilization(&mut self, resource: HardwareResource, per_unit: bool) -> Result<Utilization> {
        match resource {
            HardwareResource::Cpu => {
                self.sys.refresh_cpu_usage();
                if per_unit {
                    Ok(Utilization::PerUnit(
                        self.sys
                            .cpus()
                            .iter()
                            .map(|c| f64::from(c.cpu_usage()))
                            .collect(),
                    ))
                } else {
                    Ok(Utilization::Aggregate(f64::from(
                        self.sys.global_cpu_usage(),
                    )))
                }
            }
            HardwareResource::Ram => {
                self.sys.refresh_memory();
                let total = self.sys.total_memory();
                let pct = if total == 0 {
                    0.0
                } else {
                    self.sys.used_memory() as f64 * 100.0 / total as f64
                };
                if per_unit {
                    Ok(Utilization::PerUnit(vec![pct]))
                } else {
                    Ok(Utilization::Aggregate(pct))
                }
            }
            HardwareResource::Gpu => Err(HsError::ProbeUnsupported {
                capability: "gpu utilization",
            }),
            HardwareResource::Screen => Err(HsError::ProbeUnsupported {
                capability: "screen utilization",
            }),
        }
    }

    fn unit_count(&mut self, resource: HardwareResource) -> Result<usize> {
        match resource {
            HardwareResource::Cpu => {
                self.sys.refresh_cpu_usage();
                Ok(self.sys.cpus().len().max(1))
            }
            HardwareResource::Ram => Ok(1),
            HardwareResource::Gpu => Err(HsError::ProbeUnsupported {
                capability: "gpu utilization",
            }),
            HardwareResource::Screen => Err(HsError::ProbeUnsupported {
                capability: "screen utilization",
            }),
        }
    }

    fn next_instance_event(
        &mut self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<InstanceEvent>> {
        if let Some(ev) = self.pending_events.pop_front() {
            return Ok(Some(ev));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let current = self.snapshot_instances(name);
            match self.prev_instances.get_mut(name) {
                // First snapshot for this subject seeds the baseline; already
                // running instances are not reported as creations.
                None => {
                    self.prev_instances.insert(name.to_string(), current);
                }
                Some(prev) => {
                    diff_into_events(prev, &current, &mut self.pending_events);
                    *prev = current;
                }
            }

            if let Some(ev) = self.pending_events.pop_front() {
                return Ok(Some(ev));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(EVENT_POLL_STEP.min(deadline - now));
        }
    }
}

/// Append creation/deletion events for the transition `prev` → `current`.
/// Creations are queued before deletions within one snapshot.
fn diff_into_events(
    prev: &HashSet<InstanceId>,
    current: &HashSet<InstanceId>,
    out: &mut VecDeque<InstanceEvent>,
) {
    let mut created: Vec<InstanceId> = current.difference(prev).copied().collect();
    let mut deleted: Vec<InstanceId> = prev.difference(current).copied().collect();
    created.sort_unstable();
    deleted.sort_unstable();
    out.extend(created.into_iter().map(InstanceEvent::Created));
    out.extend(deleted.into_iter().map(InstanceEvent::Deleted));
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_reports_created_and_deleted() {
        let prev = HashSet::from([1, 2, 3]);
        let current = HashSet::from([2, 3, 4, 5]);
        let mut out = VecDeque::new();
        diff_into_events(&prev, &current, &mut out);

        let events: Vec<InstanceEvent> = out.into_iter().collect();
        assert_eq!(
            events,
            vec![
                InstanceEvent::Created(4),
                InstanceEvent::Created(5),
                InstanceEvent::Deleted(1),
            ]
        );
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        let set = HashSet::from([10, 20]);
        let mut out = VecDeque::new();
        diff_into_events(&set, &set.clone(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn ram_utilization_is_a_percentage() {
        let probe = SystemProbe::new();
        let mut session = probe.open_session().unwrap();
        match session.utilization(HardwareResource::Ram, false).unwrap() {
            Utilization::Aggregate(pct) => assert!((0.0..=100.0).contains(&pct)),
            Utilization::PerUnit(_) => panic!("aggregate query returned per-unit data"),
        }
    }

    #[test]
    fn cpu_unit_count_is_positive() {
        let probe = SystemProbe::new();
        let mut session = probe.open_session().unwrap();
        assert!(session.unit_count(HardwareResource::Cpu).unwrap() >= 1);
    }

    #[test]
    fn gpu_utilization_is_unsupported() {
        let probe = SystemProbe::new();
        let mut session = probe.open_session().unwrap();
        let err = session
            .utilization(HardwareResource::Gpu, false)
            .unwrap_err();
        assert_eq!(err.code(), "HS-2002");
    }

    #[test]
    fn window_query_without_enumerator_is_unsupported() {
        let probe = SystemProbe::new();
        let mut session = probe.open_session().unwrap();
        let err = session.instances_with_visible_window().unwrap_err();
        assert_eq!(err.code(), "HS-2002");
    }

    #[test]
    fn plugged_window_enumerator_is_used_and_cached() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_inner = Arc::clone(&calls);
        let probe = SystemProbe::with_window_enumerator(move || {
            calls_inner.fetch_add(1, Ordering::SeqCst);
            Ok(HashSet::from([42]))
        });

        let mut a = probe.open_session().unwrap();
        let mut b = probe.open_session().unwrap();
        assert!(a.instances_with_visible_window().unwrap().contains(&42));
        assert!(b.instances_with_visible_window().unwrap().contains(&42));
        // The second session hit the shared snapshot within the TTL.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_wait_times_out_for_unknown_process() {
        let probe = SystemProbe::new();
        let mut session = probe.open_session().unwrap();
        let started = Instant::now();
        let event = session
            .next_instance_event("hs-no-such-process-name", Duration::from_millis(50))
            .unwrap();
        assert!(event.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn listing_a_nonexistent_process_yields_empty_set() {
        let probe = SystemProbe::new();
        let mut session = probe.open_session().unwrap();
        assert!(
            session
                .list_instances("hs-no-such-process-name")
                .unwrap()
                .is_empty()
        );
    }
}
