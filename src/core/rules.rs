//! Declarative rule files: `[[rule]]` TOML tables binding a subject, a
//! condition, and a built-in action.
//!
//! This is the configuration-file counterpart of the programmatic watcher
//! API, so a host can run a rule set from a file:
//!
//! ```toml
//! [[rule]]
//! subject = "canva.exe"
//! condition = { kind = "has-no-window", grace_ticks = 3 }
//! action = { kind = "terminate" }
//!
//! [[rule]]
//! subject = "cpu"
//! condition = { kind = "is-too-busy", over_pct = 90.0, duration_ticks = 120 }
//! action = { kind = "show-alert", text = "CPU has been pegged for two minutes" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::action;
use crate::core::errors::{HsError, Result};
use crate::engine::Engine;
use crate::watch::condition::{BusyThreshold, DEFAULT_MATCH_THRESHOLD, FireMode};

/// A parsed rules file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RulesFile {
    /// Declared rules, in file order.
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDecl>,
}

/// One declared rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDecl {
    /// Process name or hardware keyword.
    pub subject: String,
    /// Trigger condition.
    pub condition: ConditionDecl,
    /// Action fired when the condition confirms.
    pub action: ActionDecl,
}

/// Declarative condition parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConditionDecl {
    /// `has-no-window`; the engine default applies when `grace_ticks` is
    /// omitted.
    HasNoWindow {
        #[serde(default)]
        grace_ticks: Option<u32>,
    },
    /// `is-exited`.
    IsExited,
    /// `is-running`; edge-triggered unless `mode = "every-tick"`.
    IsRunning {
        #[serde(default)]
        mode: FireMode,
    },
    /// `is-too-busy`; exactly one of `over_pct` / `per_unit_pct`.
    IsTooBusy {
        #[serde(default)]
        over_pct: Option<f64>,
        #[serde(default)]
        per_unit_pct: Option<Vec<f64>>,
        duration_ticks: u32,
    },
    /// `looks-like`.
    LooksLike {
        template: PathBuf,
        #[serde(default)]
        match_threshold: Option<f64>,
        #[serde(default)]
        interval_ms: Option<u64>,
    },
}

/// Declarative action bound to a built-in primitive.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ActionDecl {
    /// Terminate a process; defaults to the rule's subject.
    Terminate {
        #[serde(default)]
        target: Option<String>,
    },
    /// Stop an OS service.
    StopService { service: String },
    /// Lock an encrypted volume.
    LockVolume { drive: String },
    /// Pop a desktop alert.
    ShowAlert { text: String },
    /// Write (or append) content to a file.
    WriteFile {
        path: PathBuf,
        content: String,
        #[serde(default)]
        append: bool,
    },
}

impl RulesFile {
    /// Load and parse a rules file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(HsError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|source| HsError::io(path, source))?;
        let file: Self = toml::from_str(&text)?;
        Ok(file)
    }

    /// Bind every rule against the engine: attend the subject, create or
    /// reuse the watchdog, register the action. Fails fast on the first
    /// invalid rule, before the engine starts.
    pub fn bind(&self, engine: &Engine) -> Result<usize> {
        for rule in &self.rules {
            rule.bind(engine)?;
        }
        Ok(self.rules.len())
    }
}

impl RuleDecl {
    fn bind(&self, engine: &Engine) -> Result<()> {
        let watcher = engine.attend(&self.subject);
        let handle = match &self.condition {
            ConditionDecl::HasNoWindow { grace_ticks } => {
                watcher.has_no_window(grace_ticks.unwrap_or_else(|| engine.default_grace_ticks()))?
            }
            ConditionDecl::IsExited => watcher.is_exited()?,
            ConditionDecl::IsRunning { mode } => watcher.is_running(*mode)?,
            ConditionDecl::IsTooBusy {
                over_pct,
                per_unit_pct,
                duration_ticks,
            } => {
                let threshold = match (over_pct, per_unit_pct) {
                    (Some(pct), None) => BusyThreshold::Aggregate(*pct),
                    (None, Some(list)) => BusyThreshold::PerUnit(list.clone()),
                    _ => {
                        return Err(HsError::InvalidConfig {
                            details: format!(
                                "rule for '{}': exactly one of over_pct or per_unit_pct is required",
                                self.subject
                            ),
                        });
                    }
                };
                watcher.is_too_busy(threshold, *duration_ticks)?
            }
            ConditionDecl::LooksLike {
                template,
                match_threshold,
                interval_ms,
            } => watcher.looks_like(
                template,
                match_threshold.unwrap_or(DEFAULT_MATCH_THRESHOLD),
                interval_ms.map_or_else(|| engine.poll_interval(), Duration::from_millis),
            )?,
        };
        handle.register(self.action.to_callback(&self.subject));
        Ok(())
    }
}

impl ActionDecl {
    /// Build the callback closure for this action.
    fn to_callback(&self, subject: &str) -> Box<dyn Fn() + Send + Sync> {
        match self {
            Self::Terminate { target } => {
                let name = target.clone().unwrap_or_else(|| subject.to_string());
                Box::new(move || action::terminate(&name))
            }
            Self::StopService { service } => {
                let service = service.clone();
                Box::new(move || action::stop_service(&service))
            }
            Self::LockVolume { drive } => {
                let drive = drive.clone();
                Box::new(move || action::lock_volume(&drive))
            }
            Self::ShowAlert { text } => {
                let text = text.clone();
                Box::new(move || action::show_alert(&text))
            }
            Self::WriteFile {
                path,
                content,
                append,
            } => {
                let path = path.clone();
                let content = content.clone();
                let append = *append;
                Box::new(move || action::write_file(&path, &content, append))
            }
        }
    }
}

// ──────────────────── tests ────────────────────
