//! Condition monitoring: subjects, condition specs, debounce state machines,
//! watchdog run loops, and the per-subject watcher façade.

pub mod condition;
pub mod debounce;
pub mod watchdog;
pub mod watcher;
