//! Condition Probe seam: point-in-time host-state queries behind narrow traits.
//!
//! A [`HostProbe`] is a factory; every watchdog run loop opens exactly one
//! [`ProbeSession`] when it starts and drops it when it exits, so any stateful
//! per-thread resources the backend needs (WMI/COM apartments, sysinfo
//! refresh state) are scoped to that loop's lifetime. Swapping the backend
//! (mock, real OS) never touches watchdog logic.

pub mod mock;
pub mod system;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{HsError, Result};

/// Opaque identifier for one running instance of a subject (a PID on every
/// supported OS).
pub type InstanceId = u32;

/// A change notification from an instance event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceEvent {
    /// A new instance of the subject appeared.
    Created(InstanceId),
    /// An instance of the subject went away.
    Deleted(InstanceId),
}

/// The fixed set of hardware resources a watcher can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareResource {
    /// Processor utilization (aggregate or per core).
    Cpu,
    /// Memory utilization.
    Ram,
    /// GPU utilization (backend-dependent).
    Gpu,
    /// The display, for image matching.
    Screen,
}

impl HardwareResource {
    /// Resolve a subject name against the fixed hardware keyword set.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "cpu" => Some(Self::Cpu),
            "ram" => Some(Self::Ram),
            "gpu" => Some(Self::Gpu),
            "screen" => Some(Self::Screen),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Ram => "ram",
            Self::Gpu => "gpu",
            Self::Screen => "screen",
        }
    }
}

impl fmt::Display for HardwareResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A utilization reading, in percent (0–100).
#[derive(Debug, Clone, PartialEq)]
pub enum Utilization {
    /// One aggregate figure for the whole resource.
    Aggregate(f64),
    /// One figure per discrete unit (e.g. per CPU core).
    PerUnit(Vec<f64>),
}

// ──────────────────── host probe ────────────────────

/// Factory for per-run-loop probe sessions.
pub trait HostProbe: Send + Sync {
    /// Open a session. Called once per watchdog run loop on loop start; the
    /// session is dropped on loop exit.
    fn open_session(&self) -> Result<Box<dyn ProbeSession>>;
}

/// Point-in-time host-state queries. One session per run loop; never shared
/// across threads.
pub trait ProbeSession: Send {
    /// Instance identifiers of every running instance of the named process.
    fn list_instances(&mut self, name: &str) -> Result<HashSet<InstanceId>>;

    /// Instance identifiers that currently own a visible top-level window.
    fn instances_with_visible_window(&mut self) -> Result<HashSet<InstanceId>>;

    /// Current utilization of a hardware resource.
    fn utilization(&mut self, resource: HardwareResource, per_unit: bool) -> Result<Utilization>;

    /// Number of discrete units the resource reports (e.g. CPU core count).
    fn unit_count(&mut self, resource: HardwareResource) -> Result<usize>;

    /// Block up to `timeout` for the next creation/deletion event of the
    /// named process. `Ok(None)` on timeout (not an error). Events are
    /// delivered one per call, in arrival order.
    fn next_instance_event(
        &mut self,
        name: &str,
        timeout: Duration,
    ) -> Result<Option<InstanceEvent>>;
}

// ──────────────────── vision probe ────────────────────

/// A reference image pattern, loaded eagerly so a missing file fails at
/// watchdog construction instead of at first tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Where the template was loaded from.
    pub path: PathBuf,
    /// Raw image bytes; interpretation is the vision backend's business.
    pub bytes: Vec<u8>,
}

impl Template {
    /// Load a template from disk, rejecting missing or empty files.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| HsError::Template {
            path: path.to_path_buf(),
            details: source.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(HsError::Template {
                path: path.to_path_buf(),
                details: "template file is empty".to_string(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }
}

/// Black-box screen matching: capture a frame and look for the template.
pub trait VisionProbe: Send + Sync {
    /// Whether the template is currently visible on screen at or above the
    /// similarity threshold.
    fn find_template(&self, template: &Template, threshold: f64) -> Result<bool>;
}

/// Vision backend for hosts without screen capture support. Every lookup
/// reports `ProbeUnsupported`, which watchdogs treat as "no data this tick".
#[derive(Debug, Default)]
pub struct NoopVisionProbe;

impl VisionProbe for NoopVisionProbe {
    fn find_template(&self, _template: &Template, _threshold: f64) -> Result<bool> {
        Err(HsError::ProbeUnsupported {
            capability: "screen capture",
        })
    }
}

// ──────────────────── shared window snapshot ────────────────────

/// TTL cache for the window-owner set, shared by every process watchdog.
///
/// Window enumeration is the most expensive probe query and its result is
/// identical for all subjects, so sessions evaluated within one tick window
/// share a single enumeration. This is an optimization, not a correctness
/// requirement; a stale-by-under-a-tick snapshot only shifts a debounce
/// observation by one tick.
pub struct WindowSnapshot {
    ttl: Duration,
    inner: Mutex<Option<(HashSet<InstanceId>, Instant)>>,
}

impl WindowSnapshot {
    /// Create a snapshot cache with the given freshness window.
    #[must_use]
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            ttl,
            inner: Mutex::new(None),
        })
    }

    /// Return the cached set if fresh, otherwise refresh through `enumerate`.
    /// Failures are never cached.
    pub fn get<F>(&self, enumerate: F) -> Result<HashSet<InstanceId>>
    where
        F: FnOnce() -> Result<HashSet<InstanceId>>,
    {
        let mut guard = self.inner.lock();
        if let Some((set, at)) = guard.as_ref()
            && at.elapsed() <= self.ttl
        {
            return Ok(set.clone());
        }
        let fresh = enumerate()?;
        *guard = Some((fresh.clone(), Instant::now()));
        Ok(fresh)
    }

    /// Drop any cached value.
    pub fn invalidate(&self) {
        *self.inner.lock() = None;
    }
}

// ──────────────────── tests ────────────────────
