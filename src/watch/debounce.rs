//! Per-condition debounce state machines.
//!
//! Pure logic, no I/O: every machine is a small mutable struct with one
//! `observe` function taking this tick's facts and answering "fire now?".
//! Counters are reset whenever the subject disappears entirely so a stale
//! count can never cause a spurious fire when the subject reappears later.

use crate::watch::condition::{BusyThreshold, ConditionSpec, FireMode};
use crate::probe::Utilization;

/// Mutable debounce state, one variant per condition kind. Touched only by
/// the owning watchdog's run loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceState {
    /// State for `has-no-window`.
    NoWindow(NoWindowState),
    /// State for `is-exited`.
    Exited(ExitedState),
    /// State for `is-running`.
    Running(RunningState),
    /// State for `is-too-busy`.
    TooBusy(TooBusyState),
    /// `looks-like` holds no state; every match attempt is independent.
    LooksLike,
}

impl DebounceState {
    /// Fresh state for a condition spec.
    #[must_use]
    pub fn for_spec(spec: &ConditionSpec) -> Self {
        match spec {
            ConditionSpec::HasNoWindow { .. } => Self::NoWindow(NoWindowState::default()),
            ConditionSpec::IsExited => Self::Exited(ExitedState::default()),
            ConditionSpec::IsRunning { .. } => Self::Running(RunningState::default()),
            ConditionSpec::IsTooBusy { .. } => Self::TooBusy(TooBusyState::default()),
            ConditionSpec::LooksLike { .. } => Self::LooksLike,
        }
    }
}

// ──────────────────── has-no-window ────────────────────

/// Counts consecutive ticks on which the subject ran without any visible
/// window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoWindowState {
    /// Consecutive no-window observations so far.
    pub negative_ticks: u32,
}

impl NoWindowState {
    /// Observe one polling tick. Returns true when the zombie is confirmed.
    ///
    /// The counter resets immediately when the subject stops running, when
    /// any instance owns a window (vindication), and after firing — so the
    /// next fire needs a fresh run of `grace_ticks` observations.
    pub fn observe(&mut self, grace_ticks: u32, running: bool, has_window: bool) -> bool {
        if !running || has_window {
            self.negative_ticks = 0;
            return false;
        }
        self.negative_ticks = self.negative_ticks.saturating_add(1);
        if self.negative_ticks >= grace_ticks {
            self.negative_ticks = 0;
            return true;
        }
        false
    }
}

// ──────────────────── is-exited ────────────────────

/// Arms on first appearance, fires on the running → gone transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitedState {
    /// Whether the subject has been observed running since the last fire.
    pub has_appeared: bool,
}

impl ExitedState {
    /// Observe whether the subject currently has running instances.
    pub fn observe(&mut self, running: bool) -> bool {
        if running {
            self.has_appeared = true;
            return false;
        }
        if self.has_appeared {
            self.has_appeared = false;
            return true;
        }
        false
    }
}

// ──────────────────── is-running ────────────────────

/// Edge-or-level detection of "subject has ≥ 1 instance".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunningState {
    /// Whether the previous observation saw the subject running.
    pub was_running: bool,
}

impl RunningState {
    /// Observe whether the subject currently has running instances.
    pub fn observe(&mut self, mode: FireMode, running: bool) -> bool {
        let fired = match mode {
            FireMode::Edge => running && !self.was_running,
            FireMode::EveryTick => running,
        };
        self.was_running = running;
        fired
    }
}

// ──────────────────── is-too-busy ────────────────────

/// Consecutive-over-threshold counter with hysteresis: after firing, no
/// re-fire until utilization dips below threshold at least once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TooBusyState {
    /// Consecutive over-threshold readings so far.
    pub over_ticks: u32,
    /// Set after firing; cleared by a sub-threshold reading.
    pub busy: bool,
}

impl TooBusyState {
    /// Observe one utilization reading already reduced to over/not-over.
    pub fn observe(&mut self, duration_ticks: u32, over: bool) -> bool {
        if !over {
            self.over_ticks = 0;
            self.busy = false;
            return false;
        }
        self.over_ticks = self.over_ticks.saturating_add(1);
        if self.over_ticks >= duration_ticks && !self.busy {
            self.busy = true;
            return true;
        }
        false
    }
}

/// Reduce a utilization reading against a threshold.
///
/// Per-unit readings are "over" only when every unit exceeds its own
/// threshold. `None` when the reading shape does not match the threshold
/// shape (e.g. the live unit count changed since construction); callers
/// treat that as "no data this tick".
#[must_use]
pub fn reading_is_over(threshold: &BusyThreshold, reading: &Utilization) -> Option<bool> {
    match (threshold, reading) {
        (BusyThreshold::Aggregate(limit), Utilization::Aggregate(value)) => Some(value > limit),
        (BusyThreshold::PerUnit(limits), Utilization::PerUnit(values)) => {
            if limits.len() != values.len() {
                return None;
            }
            Some(
                limits
                    .iter()
                    .zip(values.iter())
                    .all(|(limit, value)| value > limit),
            )
        }
        _ => None,
    }
}

// ──────────────────── tests ────────────────────
