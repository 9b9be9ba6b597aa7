//! Fire-and-forget action primitives invoked from rule callbacks.
//!
//! The engine never awaits or retries these; each one logs its own outcome
//! to stderr with an `[HS-ACTION]` prefix and swallows failures, so a broken
//! action can never stall or kill a watchdog.

pub mod alert;
pub mod file;
pub mod process;
pub mod service;
pub mod volume;

pub use alert::show_alert;
pub use file::write_file;
pub use process::{terminate, top_processes};
pub use service::stop_service;
pub use volume::lock_volume;
