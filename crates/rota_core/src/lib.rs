//! Core domain logic for the household chore rotation.
//! This crate is the single source of truth for assignment, swap and
//! verification invariants.

pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use engine::{EngineError, EngineResult, ErrorKind};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::area::{Area, AreaCatalog, Frequency};
pub use model::person::{Person, PersonId};
pub use model::task::{
    SwapRequest, SwapRequestId, SwapStatus, Task, TaskId, VerificationStatus, VerificationVote,
};
pub use repo::roster_repo::{RosterRepository, SqliteRosterRepository};
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskRepository};
pub use service::rotation_service::{RotationOutcome, RotationService};
pub use service::task_service::TaskService;
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
