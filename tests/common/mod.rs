//! Shared helpers for the scenario tests: quiet fast-tick engines over the
//! scripted probe, deadline-bounded waiting, and a CLI runner.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

use host_sentry::core::config::{EngineConfig, LoggingConfig};
use host_sentry::engine::Engine;
use host_sentry::probe::mock::{MockProbe, MockVisionProbe};

/// Engine config with millisecond cadence and no log output, for tests that
/// run real watchdog threads.
pub fn fast_quiet_config() -> EngineConfig {
    let mut config = EngineConfig {
        logging: LoggingConfig {
            file_enabled: false,
            stderr: false,
            ..LoggingConfig::default()
        },
        ..EngineConfig::default()
    };
    config.engine.poll_interval_ms = 5;
    config.engine.pause_backoff_ms = 5;
    config.engine.event_wait_timeout_ms = 20;
    config
}

/// Engine over a fresh scripted probe; returns the probe handle for world
/// mutation.
pub fn mock_engine() -> (Engine, MockProbe, MockVisionProbe) {
    let probe = MockProbe::new();
    let vision = MockVisionProbe::new();
    let engine = Engine::with_probes(
        fast_quiet_config(),
        Arc::new(probe.clone()),
        Arc::new(vision.clone()),
    )
    .expect("engine construction");
    (engine, probe, vision)
}

/// Poll `predicate` until it holds, failing after five seconds.
pub fn wait_for(what: &str, predicate: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !predicate() {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for: {what}"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Result of one CLI invocation.
pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run the `hsentry` binary with the given arguments.
pub fn run_cli(args: &[&str]) -> CmdResult {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_hsentry"));
    let output = Command::new(&bin)
        .args(args)
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute hsentry");

    CmdResult {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    }
}
