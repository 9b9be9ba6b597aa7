//! Logging hub: a dedicated logger thread behind a bounded crossbeam channel.
//!
//! All engine threads send [`ActivityEvent`] through a cheaply-cloneable
//! [`LoggerHandle`]. Non-blocking `try_send()` ensures no watchdog loop is ever
//! stalled by logging back-pressure. The logger thread owns the JSONL writer
//! and an optional stderr mirror, and applies the configured minimum severity.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{HsError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

// ──────────────────── channel capacity ────────────────────

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events that can be logged through the hub.
#[derive(Debug, Clone)]
pub enum ActivityEvent {
    EngineStarted {
        version: String,
        watchdogs: usize,
    },
    EngineStopped {
        reason: String,
        uptime_secs: u64,
    },
    WatchdogLaunched {
        subject: String,
        condition: String,
    },
    WatchdogStopped {
        subject: String,
        condition: String,
    },
    SubjectActivated {
        subject: String,
    },
    SubjectPaused {
        subject: String,
    },
    ConditionFired {
        subject: String,
        condition: String,
    },
    ProbeError {
        subject: String,
        condition: String,
        details: String,
    },
    LoopPanic {
        subject: String,
        condition: String,
    },
    ActionPanic {
        subject: String,
        condition: String,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
///
/// Internally wraps a bounded crossbeam `Sender`. The `send()` method uses
/// `try_send()` so callers are never blocked by logging back-pressure.
#[derive(Clone)]
pub struct LoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl LoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── configuration ────────────────────

/// Options for building the logging hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// JSONL writer config. `None` disables the file sink.
    pub jsonl: Option<JsonlConfig>,
    /// Mirror entries to stderr with an `[HS]` prefix.
    pub stderr_mirror: bool,
    /// Minimum severity; events below this are discarded.
    pub min_severity: Severity,
    /// Bounded channel capacity.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            jsonl: Some(JsonlConfig::default()),
            stderr_mirror: true,
            min_severity: Severity::Info,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The returned handle is `Clone + Send` and can be shared across threads.
/// The logger thread runs until `handle.shutdown()` is called or all senders
/// are dropped.
pub fn spawn_logger(config: HubConfig) -> Result<(LoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = LoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("hs-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, &config, &dropped_clone);
        })
        .map_err(|e| HsError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: &HubConfig, dropped: &AtomicU64) {
    let mut jsonl = config.jsonl.clone().map(JsonlWriter::open);

    // Process events until Shutdown or channel disconnect.
    while let Ok(event) = rx.recv() {
        // Report dropped events periodically.
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            write_entry(&mut jsonl, config, &warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        let entry = event_to_log_entry(&event);
        if entry.severity < config.min_severity {
            continue;
        }
        write_entry(&mut jsonl, config, &entry);
    }

    // Final flush.
    if let Some(w) = jsonl.as_mut() {
        w.flush();
        w.fsync();
    }
}

fn write_entry(jsonl: &mut Option<JsonlWriter>, config: &HubConfig, entry: &LogEntry) {
    if let Some(w) = jsonl.as_mut() {
        w.write_entry(entry);
    }
    if config.stderr_mirror {
        let label = match entry.severity {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Critical => "CRIT",
        };
        let subject = entry.subject.as_deref().unwrap_or("-");
        let detail = entry
            .details
            .as_deref()
            .or(entry.error_message.as_deref())
            .or(entry.condition.as_deref())
            .unwrap_or("");
        eprintln!("[HS] {} {:?} {} {}", label, entry.event, subject, detail);
    }
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::EngineStarted { version, watchdogs } => {
            let mut e = LogEntry::new(EventType::EngineStart, Severity::Info);
            e.details = Some(format!("version={version}"));
            e.count = Some(*watchdogs as u64);
            e.ok = Some(true);
            e
        }
        ActivityEvent::EngineStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::EngineStop, Severity::Info);
            e.details = Some(reason.clone());
            e.duration_secs = Some(*uptime_secs);
            e.ok = Some(true);
            e
        }
        ActivityEvent::WatchdogLaunched { subject, condition } => {
            let mut e = LogEntry::new(EventType::WatchdogLaunch, Severity::Debug);
            e.subject = Some(subject.clone());
            e.condition = Some(condition.clone());
            e
        }
        ActivityEvent::WatchdogStopped { subject, condition } => {
            let mut e = LogEntry::new(EventType::WatchdogStop, Severity::Debug);
            e.subject = Some(subject.clone());
            e.condition = Some(condition.clone());
            e
        }
        ActivityEvent::SubjectActivated { subject } => {
            let mut e = LogEntry::new(EventType::SubjectActivate, Severity::Info);
            e.subject = Some(subject.clone());
            e
        }
        ActivityEvent::SubjectPaused { subject } => {
            let mut e = LogEntry::new(EventType::SubjectPause, Severity::Info);
            e.subject = Some(subject.clone());
            e
        }
        ActivityEvent::ConditionFired { subject, condition } => {
            let mut e = LogEntry::new(EventType::ConditionFire, Severity::Info);
            e.subject = Some(subject.clone());
            e.condition = Some(condition.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::ProbeError {
            subject,
            condition,
            details,
        } => {
            let mut e = LogEntry::new(EventType::ProbeError, Severity::Warning);
            e.subject = Some(subject.clone());
            e.condition = Some(condition.clone());
            e.details = Some(details.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::LoopPanic { subject, condition } => {
            let mut e = LogEntry::new(EventType::LoopPanic, Severity::Critical);
            e.subject = Some(subject.clone());
            e.condition = Some(condition.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::ActionPanic { subject, condition } => {
            let mut e = LogEntry::new(EventType::ActionPanic, Severity::Critical);
            e.subject = Some(subject.clone());
            e.condition = Some(condition.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::EngineStop, Severity::Debug),
    }
}

// ──────────────────── tests ────────────────────
