#![forbid(unsafe_code)]

//! Host Sentry (hsentry) — reactive watchdog engine for live host state.
//!
//! Declare rules like "when process P loses all visible windows for N
//! consecutive ticks, terminate it" and have them evaluated continuously in
//! the background:
//! 1. **Watchers** — one façade per subject (process name or hardware
//!    resource) with reference-counted pause/resume
//! 2. **Watchdogs** — one per condition, each with its own debounce state
//!    machine and its own thread
//! 3. **Probes** — narrow traits answering point-in-time host questions,
//!    swappable between the sysinfo backend and scripted mocks
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use host_sentry::prelude::*;
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! let canva = engine.attend("canva.exe");
//! canva.has_no_window(3)?.register(|| terminate("canva.exe"));
//! engine.start()?;
//! # Ok::<(), HsError>(())
//! ```

pub mod prelude;

pub mod action;
pub mod core;
pub mod engine;
pub mod logger;
pub mod probe;
pub mod watch;
