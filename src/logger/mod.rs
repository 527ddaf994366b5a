//! Activity logging: a JSONL writer behind a dedicated logger thread.

pub mod activity;
pub mod jsonl;

pub use activity::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
