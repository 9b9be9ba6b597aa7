//! Subjects, condition kinds, and condition parameters.
//!
//! A condition is a closed tagged variant: kind + immutable parameters. The
//! per-kind mutable debounce state lives in [`crate::watch::debounce`] and the
//! evaluation loops in [`crate::watch::watchdog`]. Identity of a watchdog is
//! the `(subject, ConditionKey)` pair, where the key folds the parameters in
//! (float parameters by bit pattern, so identical params always collide).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{HsError, Result};
use crate::probe::{HardwareResource, HostProbe, Template};

// ──────────────────── subject ────────────────────

/// What a watcher is bound to: a process name, or one of the fixed hardware
/// resources. Immutable once a watcher exists for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    /// A process, identified by executable name (matched case-insensitively).
    Process(String),
    /// A hardware resource from the fixed keyword set.
    Hardware(HardwareResource),
}

impl Subject {
    /// Resolve a name the way `attend` does: hardware keywords win, anything
    /// else is a process name.
    #[must_use]
    pub fn resolve(name: &str) -> Self {
        HardwareResource::from_name(name)
            .map_or_else(|| Self::Process(name.to_string()), Self::Hardware)
    }

    /// The subject's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Process(name) => name,
            Self::Hardware(resource) => resource.name(),
        }
    }

    /// Whether this subject is a process.
    #[must_use]
    pub const fn is_process(&self) -> bool {
        matches!(self, Self::Process(_))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ──────────────────── condition parameters ────────────────────

/// Condition kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum ConditionKind {
    HasNoWindow,
    IsExited,
    IsRunning,
    IsTooBusy,
    LooksLike,
}

impl ConditionKind {
    /// Kebab-case label used in keys and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::HasNoWindow => "has-no-window",
            Self::IsExited => "is-exited",
            Self::IsRunning => "is-running",
            Self::IsTooBusy => "is-too-busy",
            Self::LooksLike => "looks-like",
        }
    }
}

/// Fire policy for `is-running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FireMode {
    /// Fire once per 0→1 appearance edge, re-arm on 1→0.
    #[default]
    Edge,
    /// Fire on every tick while at least one instance is running.
    EveryTick,
}

/// Busy threshold: one aggregate figure, or one per discrete unit.
#[derive(Debug, Clone, PartialEq)]
pub enum BusyThreshold {
    /// Compare aggregate utilization against a single percentage.
    Aggregate(f64),
    /// Compare each unit against its own percentage; the reading is "over"
    /// only when every unit exceeds its threshold.
    PerUnit(Vec<f64>),
}

/// Default grace period for `has-no-window`, in ticks.
pub const DEFAULT_GRACE_TICKS: u32 = 3;

/// Default similarity threshold for `looks-like`.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

/// A condition kind plus its immutable parameters.
#[derive(Debug, Clone)]
pub enum ConditionSpec {
    /// Subject runs but no instance owns a visible window for `grace_ticks`
    /// consecutive ticks.
    HasNoWindow {
        /// Consecutive no-window ticks required before firing.
        grace_ticks: u32,
    },
    /// Subject transitions from observed-running to zero instances.
    IsExited,
    /// Subject has at least one running instance.
    IsRunning {
        /// Edge-triggered or every-tick firing.
        mode: FireMode,
    },
    /// Resource utilization stays over threshold for a qualifying duration.
    IsTooBusy {
        /// Aggregate or per-unit threshold, in percent.
        threshold: BusyThreshold,
        /// Consecutive over-threshold readings required before firing.
        duration_ticks: u32,
    },
    /// A reference image is visible on screen.
    LooksLike {
        /// Template loaded at construction (missing files fail fast).
        template: Arc<Template>,
        /// Similarity threshold in (0, 1].
        match_threshold: f64,
        /// Poll interval override; `Duration::ZERO` means measure
        /// back-to-back.
        interval: Duration,
    },
}

/// How a condition's run loop obtains observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStrategy {
    /// Query the probe on a fixed interval.
    Polling,
    /// Block on an instance creation/deletion notification stream.
    EventSubscribed,
}

impl ConditionSpec {
    /// The kind discriminant.
    #[must_use]
    pub const fn kind(&self) -> ConditionKind {
        match self {
            Self::HasNoWindow { .. } => ConditionKind::HasNoWindow,
            Self::IsExited => ConditionKind::IsExited,
            Self::IsRunning { .. } => ConditionKind::IsRunning,
            Self::IsTooBusy { .. } => ConditionKind::IsTooBusy,
            Self::LooksLike { .. } => ConditionKind::LooksLike,
        }
    }

    /// Which run-loop strategy evaluates this condition.
    ///
    /// `is-running` in every-tick mode has no edge to subscribe to, so it
    /// polls; the edge mode rides the notification stream like `is-exited`.
    #[must_use]
    pub const fn strategy(&self) -> LoopStrategy {
        match self {
            Self::IsExited
            | Self::IsRunning {
                mode: FireMode::Edge,
            } => LoopStrategy::EventSubscribed,
            _ => LoopStrategy::Polling,
        }
    }

    /// Effective polling interval, honoring per-condition overrides.
    #[must_use]
    pub const fn poll_interval(&self, default: Duration) -> Duration {
        match self {
            Self::LooksLike { interval, .. } => *interval,
            _ => default,
        }
    }

    /// Stable identity key: same kind + same parameters always produce the
    /// same key. Float parameters are keyed by bit pattern.
    #[must_use]
    pub fn key(&self) -> ConditionKey {
        let text = match self {
            Self::HasNoWindow { grace_ticks } => {
                format!("has-no-window/grace={grace_ticks}")
            }
            Self::IsExited => "is-exited".to_string(),
            Self::IsRunning { mode } => match mode {
                FireMode::Edge => "is-running/mode=edge".to_string(),
                FireMode::EveryTick => "is-running/mode=every-tick".to_string(),
            },
            Self::IsTooBusy {
                threshold,
                duration_ticks,
            } => match threshold {
                BusyThreshold::Aggregate(pct) => {
                    format!("is-too-busy/over={:016x}/dur={duration_ticks}", pct.to_bits())
                }
                BusyThreshold::PerUnit(list) => {
                    let units: Vec<String> =
                        list.iter().map(|pct| format!("{:016x}", pct.to_bits())).collect();
                    format!(
                        "is-too-busy/per-unit={}/dur={duration_ticks}",
                        units.join(",")
                    )
                }
            },
            Self::LooksLike {
                template,
                match_threshold,
                interval,
            } => format!(
                "looks-like/template={}/thr={:016x}/ivl={}ms",
                template.path.display(),
                match_threshold.to_bits(),
                interval.as_millis()
            ),
        };
        ConditionKey(text)
    }

    /// Human-readable label for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::HasNoWindow { grace_ticks } => format!("has-no-window(grace={grace_ticks})"),
            Self::IsExited => "is-exited".to_string(),
            Self::IsRunning { mode } => match mode {
                FireMode::Edge => "is-running(edge)".to_string(),
                FireMode::EveryTick => "is-running(every-tick)".to_string(),
            },
            Self::IsTooBusy {
                threshold,
                duration_ticks,
            } => match threshold {
                BusyThreshold::Aggregate(pct) => {
                    format!("is-too-busy(over={pct}%, {duration_ticks} ticks)")
                }
                BusyThreshold::PerUnit(list) => {
                    format!("is-too-busy(per-unit x{}, {duration_ticks} ticks)", list.len())
                }
            },
            Self::LooksLike {
                template,
                match_threshold,
                ..
            } => format!(
                "looks-like({}, thr={match_threshold})",
                template.path.display()
            ),
        }
    }

    /// Validate parameters against the subject and the live host.
    ///
    /// Rejections here are the only error channel to the rule author; a spec
    /// that passes never fails for configuration reasons inside its run loop.
    pub fn validate(&self, subject: &Subject, probe: &dyn HostProbe) -> Result<()> {
        let reject = |details: String| {
            Err(HsError::InvalidCondition {
                subject: subject.name().to_string(),
                details,
            })
        };

        match self {
            Self::HasNoWindow { grace_ticks } => {
                if !subject.is_process() {
                    return reject("has-no-window applies to process subjects only".to_string());
                }
                if *grace_ticks == 0 {
                    return reject("grace period must be at least 1 tick".to_string());
                }
            }
            Self::IsExited | Self::IsRunning { .. } => {
                if !subject.is_process() {
                    return reject(format!(
                        "{} applies to process subjects only",
                        self.kind().label()
                    ));
                }
            }
            Self::IsTooBusy {
                threshold,
                duration_ticks,
            } => {
                let resource = match subject {
                    Subject::Hardware(
                        resource @ (HardwareResource::Cpu
                        | HardwareResource::Ram
                        | HardwareResource::Gpu),
                    ) => *resource,
                    Subject::Hardware(HardwareResource::Screen) | Subject::Process(_) => {
                        return reject(
                            "is-too-busy applies to cpu, ram, or gpu subjects".to_string(),
                        );
                    }
                };
                if *duration_ticks == 0 {
                    return reject("duration must be at least 1 tick".to_string());
                }
                match threshold {
                    BusyThreshold::Aggregate(pct) => {
                        if !pct.is_finite() || *pct <= 0.0 || *pct > 100.0 {
                            return reject(format!("threshold {pct}% is outside (0, 100]"));
                        }
                    }
                    BusyThreshold::PerUnit(list) => {
                        if list.is_empty() {
                            return reject("per-unit threshold list is empty".to_string());
                        }
                        if let Some(pct) = list
                            .iter()
                            .find(|pct| !pct.is_finite() || **pct <= 0.0 || **pct > 100.0)
                        {
                            return reject(format!("threshold {pct}% is outside (0, 100]"));
                        }
                        let live = probe.open_session()?.unit_count(resource)?;
                        if list.len() != live {
                            return reject(format!(
                                "per-unit threshold list has {} entries but {} reports {live} units",
                                list.len(),
                                resource,
                            ));
                        }
                    }
                }
            }
            Self::LooksLike {
                match_threshold, ..
            } => {
                if *subject != Subject::Hardware(HardwareResource::Screen) {
                    return reject("looks-like applies to the screen subject only".to_string());
                }
                if !match_threshold.is_finite()
                    || *match_threshold <= 0.0
                    || *match_threshold > 1.0
                {
                    return reject(format!(
                        "match threshold {match_threshold} is outside (0, 1]"
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Stable identity of a condition within one watcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionKey(String);

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::mock::MockProbe;
    use std::path::PathBuf;

    fn template() -> Arc<Template> {
        Arc::new(Template {
            path: PathBuf::from("button.png"),
            bytes: vec![1, 2, 3],
        })
    }

    #[test]
    fn subject_resolution_matches_hardware_keywords() {
        assert_eq!(
            Subject::resolve("cpu"),
            Subject::Hardware(HardwareResource::Cpu)
        );
        assert_eq!(
            Subject::resolve("GPU"),
            Subject::Hardware(HardwareResource::Gpu)
        );
        assert_eq!(
            Subject::resolve("Canva.exe"),
            Subject::Process("Canva.exe".to_string())
        );
    }

    #[test]
    fn identical_parameters_produce_identical_keys() {
        let a = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::Aggregate(90.0),
            duration_ticks: 2,
        };
        let b = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::Aggregate(90.0),
            duration_ticks: 2,
        };
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn different_parameters_produce_different_keys() {
        let a = ConditionSpec::HasNoWindow { grace_ticks: 3 };
        let b = ConditionSpec::HasNoWindow { grace_ticks: 5 };
        assert_ne!(a.key(), b.key());

        let c = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::Aggregate(90.0),
            duration_ticks: 2,
        };
        let d = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::Aggregate(85.0),
            duration_ticks: 2,
        };
        assert_ne!(c.key(), d.key());
    }

    #[test]
    fn strategies_match_condition_kinds() {
        assert_eq!(ConditionSpec::IsExited.strategy(), LoopStrategy::EventSubscribed);
        assert_eq!(
            ConditionSpec::IsRunning {
                mode: FireMode::Edge
            }
            .strategy(),
            LoopStrategy::EventSubscribed
        );
        assert_eq!(
            ConditionSpec::IsRunning {
                mode: FireMode::EveryTick
            }
            .strategy(),
            LoopStrategy::Polling
        );
        assert_eq!(
            ConditionSpec::HasNoWindow { grace_ticks: 3 }.strategy(),
            LoopStrategy::Polling
        );
    }

    #[test]
    fn looks_like_interval_overrides_default() {
        let spec = ConditionSpec::LooksLike {
            template: template(),
            match_threshold: 0.8,
            interval: Duration::ZERO,
        };
        assert_eq!(spec.poll_interval(Duration::from_secs(1)), Duration::ZERO);

        let other = ConditionSpec::IsExited;
        assert_eq!(
            other.poll_interval(Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn zero_grace_period_is_rejected() {
        let probe = MockProbe::new();
        let spec = ConditionSpec::HasNoWindow { grace_ticks: 0 };
        let err = spec
            .validate(&Subject::Process("app.exe".to_string()), &probe)
            .unwrap_err();
        assert_eq!(err.code(), "HS-1101");
    }

    #[test]
    fn process_conditions_reject_hardware_subjects() {
        let probe = MockProbe::new();
        let spec = ConditionSpec::HasNoWindow { grace_ticks: 3 };
        let err = spec
            .validate(&Subject::Hardware(HardwareResource::Cpu), &probe)
            .unwrap_err();
        assert_eq!(err.code(), "HS-1101");
    }

    #[test]
    fn busy_threshold_range_is_enforced() {
        let probe = MockProbe::new();
        let cpu = Subject::Hardware(HardwareResource::Cpu);

        for pct in [0.0, -5.0, 150.0, f64::NAN] {
            let spec = ConditionSpec::IsTooBusy {
                threshold: BusyThreshold::Aggregate(pct),
                duration_ticks: 2,
            };
            assert!(spec.validate(&cpu, &probe).is_err(), "{pct} should fail");
        }

        let ok = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::Aggregate(90.0),
            duration_ticks: 2,
        };
        assert!(ok.validate(&cpu, &probe).is_ok());
    }

    #[test]
    fn per_unit_threshold_length_must_match_live_units() {
        let probe = MockProbe::new();
        probe.set_unit_count(HardwareResource::Cpu, 4);
        let cpu = Subject::Hardware(HardwareResource::Cpu);

        let mismatched = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::PerUnit(vec![90.0, 90.0]),
            duration_ticks: 2,
        };
        let err = mismatched.validate(&cpu, &probe).unwrap_err();
        assert_eq!(err.code(), "HS-1101");
        assert!(err.to_string().contains("4 units"));

        let matched = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::PerUnit(vec![90.0; 4]),
            duration_ticks: 2,
        };
        assert!(matched.validate(&cpu, &probe).is_ok());
    }

    #[test]
    fn is_too_busy_rejects_screen_and_process_subjects() {
        let probe = MockProbe::new();
        let spec = ConditionSpec::IsTooBusy {
            threshold: BusyThreshold::Aggregate(90.0),
            duration_ticks: 2,
        };
        assert!(
            spec.validate(&Subject::Hardware(HardwareResource::Screen), &probe)
                .is_err()
        );
        assert!(
            spec.validate(&Subject::Process("app.exe".to_string()), &probe)
                .is_err()
        );
    }

    #[test]
    fn looks_like_requires_screen_subject_and_sane_threshold() {
        let probe = MockProbe::new();
        let screen = Subject::Hardware(HardwareResource::Screen);

        let bad_subject = ConditionSpec::LooksLike {
            template: template(),
            match_threshold: 0.8,
            interval: Duration::from_secs(1),
        };
        assert!(
            bad_subject
                .validate(&Subject::Hardware(HardwareResource::Cpu), &probe)
                .is_err()
        );

        let bad_threshold = ConditionSpec::LooksLike {
            template: template(),
            match_threshold: 1.5,
            interval: Duration::from_secs(1),
        };
        assert!(bad_threshold.validate(&screen, &probe).is_err());

        let ok = ConditionSpec::LooksLike {
            template: template(),
            match_threshold: 0.8,
            interval: Duration::from_secs(1),
        };
        assert!(ok.validate(&screen, &probe).is_ok());
    }
}
