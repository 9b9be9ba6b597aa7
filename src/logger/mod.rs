//! Activity logging: JSONL append-only sink behind a dedicated logger thread,
//! with stderr mirroring and a configurable minimum severity.

pub mod hub;
pub mod jsonl;
