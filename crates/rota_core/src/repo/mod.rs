//! Storage collaborators for the rotation engine.
//!
//! # Responsibility
//! - Define the history reader, rotation replace-all writer and versioned
//!   task writers the engine's callers depend on.
//! - Keep SQLite query details out of engine/service code.
//!
//! # Invariants
//! - Task writes call `Task::validate()` before SQL mutations.
//! - Per-task writes are compare-and-swap on `version`; a lost race surfaces
//!   as `RepoError::StaleVersion`, never as a silent overwrite.
//! - Superseded tasks are read-only history.

pub mod roster_repo;
pub mod task_repo;

use chrono::{DateTime, Utc};

pub(crate) fn to_epoch_ms(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

pub(crate) fn from_epoch_ms(value: i64, column: &str) -> task_repo::RepoResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(value).ok_or_else(|| {
        task_repo::RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}"))
    })
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &str) -> task_repo::RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(task_repo::RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
