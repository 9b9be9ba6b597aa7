//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use host_sentry::prelude::*;
//! ```

// Core
pub use crate::core::config::EngineConfig;
pub use crate::core::errors::{HsError, Result};
pub use crate::core::rules::RulesFile;

// Engine
pub use crate::engine::Engine;

// Watch
pub use crate::watch::condition::{
    BusyThreshold, ConditionKind, ConditionSpec, FireMode, Subject,
};
pub use crate::watch::watchdog::{RunState, TickOutcome, Watchdog};
pub use crate::watch::watcher::{ConditionHandle, Watcher};

// Probes
pub use crate::probe::{
    HardwareResource, HostProbe, InstanceEvent, InstanceId, ProbeSession, Template, Utilization,
    VisionProbe,
};
pub use crate::probe::system::SystemProbe;

// Actions
pub use crate::action::{lock_volume, show_alert, stop_service, terminate, top_processes, write_file};
