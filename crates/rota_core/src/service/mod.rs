//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate read -> pure engine transition -> versioned write.
//! - Keep CLI callers decoupled from storage details.
//!
//! # Invariants
//! - Services never mutate a task outside an engine transition.
//! - Lost write races surface as `Conflict`; they are never retried here.

pub mod rotation_service;
pub mod task_service;

use crate::engine::error::{EngineError, ErrorKind};
use crate::model::task::TaskId;
use crate::repo::task_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for rotation and task use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Engine rejected the transition.
    Engine(EngineError),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Target task is missing or no longer part of the current rotation.
    TaskNotFound(TaskId),
}

impl ServiceError {
    /// Caller-facing classification, when the failure has one.
    ///
    /// Transport and data-corruption failures return `None`.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Engine(err) => Some(err.kind()),
            Self::TaskNotFound(_) => Some(ErrorKind::NotFound),
            Self::Repo(RepoError::StaleVersion { .. } | RepoError::StaleRotation) => {
                Some(ErrorKind::Conflict)
            }
            Self::Repo(RepoError::PersonNotFound(_) | RepoError::NotFound(_)) => {
                Some(ErrorKind::NotFound)
            }
            Self::Repo(RepoError::Validation(_) | RepoError::InvalidInput(_)) => {
                Some(ErrorKind::PreconditionFailed)
            }
            Self::Repo(_) => None,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Engine(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::TaskNotFound(_) => None,
        }
    }
}

impl From<EngineError> for ServiceError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            other => Self::Repo(other),
        }
    }
}
