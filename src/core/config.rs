//! Configuration system: TOML file + env var path override + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{HsError, Result};
use crate::logger::hub::HubConfig;
use crate::logger::jsonl::{JsonlConfig, Severity};
use crate::watch::condition::DEFAULT_GRACE_TICKS;

/// Environment variable naming an alternate config file path.
pub const CONFIG_PATH_ENV: &str = "HSENTRY_CONFIG";

/// Full engine configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub engine: EngineTuning,
    pub logging: LoggingConfig,
}

/// Evaluation cadence knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineTuning {
    /// Default polling interval between ticks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Fixed backoff while a watchdog is paused, in milliseconds.
    pub pause_backoff_ms: u64,
    /// Timeout for one event-stream wait, in milliseconds. Bounds how long
    /// pause/shutdown can go unnoticed by an event-subscribed loop.
    pub event_wait_timeout_ms: u64,
    /// Grace period for `has-no-window` rules that do not specify one.
    pub default_grace_ticks: u32,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            pause_backoff_ms: 250,
            event_wait_timeout_ms: 1000,
            default_grace_ticks: DEFAULT_GRACE_TICKS,
        }
    }
}

impl EngineTuning {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pause_backoff(&self) -> Duration {
        Duration::from_millis(self.pause_backoff_ms)
    }

    pub fn event_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.event_wait_timeout_ms)
    }
}

/// Log sink selection and severity floor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write JSONL entries to `jsonl_path`.
    pub file_enabled: bool,
    /// JSONL activity log path.
    pub jsonl_path: PathBuf,
    /// Mirror entries to stderr.
    pub stderr: bool,
    /// Events below this severity are discarded.
    pub min_severity: Severity,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let jsonl = JsonlConfig::default();
        Self {
            file_enabled: true,
            jsonl_path: jsonl.path,
            stderr: true,
            min_severity: Severity::Info,
        }
    }
}

impl EngineConfig {
    /// Load configuration. Resolution order: explicit path, then the
    /// `HSENTRY_CONFIG` env var, then built-in defaults.
    ///
    /// An explicitly named file must exist; a missing env-var path is also an
    /// error (it was asked for). No file at all means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from),
        };

        let Some(file) = resolved else {
            return Ok(Self::default());
        };
        if !file.exists() {
            return Err(HsError::MissingConfig { path: file });
        }
        let text = fs::read_to_string(&file).map_err(|source| HsError::io(&file, source))?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would wedge the engine.
    pub fn validate(&self) -> Result<()> {
        if self.engine.pause_backoff_ms == 0 {
            return Err(HsError::InvalidConfig {
                details: "pause_backoff_ms must be greater than 0".to_string(),
            });
        }
        if self.engine.event_wait_timeout_ms == 0 {
            return Err(HsError::InvalidConfig {
                details: "event_wait_timeout_ms must be greater than 0".to_string(),
            });
        }
        if self.engine.default_grace_ticks == 0 {
            return Err(HsError::InvalidConfig {
                details: "default_grace_ticks must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Hub configuration for the logging thread.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            jsonl: self.logging.file_enabled.then(|| JsonlConfig {
                path: self.logging.jsonl_path.clone(),
                ..JsonlConfig::default()
            }),
            stderr_mirror: self.logging.stderr,
            min_severity: self.logging.min_severity,
            ..HubConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.engine.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.engine.default_grace_ticks, 3);
        assert!(config.logging.stderr);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[engine]
poll_interval_ms = 250

[logging]
stderr = false
min_severity = "warning"
"#,
        )
        .unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.engine.poll_interval_ms, 250);
        assert_eq!(config.engine.default_grace_ticks, 3); // defaulted
        assert!(!config.logging.stderr);
        assert_eq!(config.logging.min_severity, Severity::Warning);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = EngineConfig::load(Some(Path::new("/no/such/config.toml"))).unwrap_err();
        assert_eq!(err.code(), "HS-1002");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "= broken").unwrap();
        let err = EngineConfig::load(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "HS-1003");
    }

    #[test]
    fn zero_backoff_is_rejected() {
        let mut config = EngineConfig::default();
        config.engine.pause_backoff_ms = 0;
        assert_eq!(config.validate().unwrap_err().code(), "HS-1001");
    }

    #[test]
    fn hub_config_honors_file_toggle() {
        let mut config = EngineConfig::default();
        config.logging.file_enabled = false;
        assert!(config.hub_config().jsonl.is_none());

        config.logging.file_enabled = true;
        config.logging.jsonl_path = PathBuf::from("/tmp/x.jsonl");
        let hub = config.hub_config();
        assert_eq!(hub.jsonl.unwrap().path, PathBuf::from("/tmp/x.jsonl"));
    }
}
