//! Engine error taxonomy.

use crate::model::person::PersonId;
use crate::model::task::{SwapRequestId, SwapStatus, TaskId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EngineResult<T> = Result<T, EngineError>;

/// Caller-facing classification of every engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PreconditionFailed,
    NotFound,
    Conflict,
    InvalidState,
    /// Fatal planning failure. The rotation is aborted without writes.
    InvariantViolation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreconditionFailed => "precondition_failed",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidState => "invalid_state",
            Self::InvariantViolation => "invariant_violation",
        }
    }
}

/// Errors returned by engine transitions and planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Fewer available people than a rotation needs.
    InsufficientPeople { available: usize, required: usize },
    /// Acting person lacks the role the transition requires.
    NotPermitted { person: PersonId, task: TaskId },
    /// Swapping or reassigning work that was already completed.
    TaskAlreadyCompleted(TaskId),
    /// Both sides of a swap name the same task.
    SameTask(TaskId),
    TaskNotFound(TaskId),
    SwapRequestNotFound(SwapRequestId),
    DuplicateVote { verifier: PersonId, task: TaskId },
    DuplicateSwapRequest {
        requester: PersonId,
        requested_task: TaskId,
        offered_task: TaskId,
    },
    TooManyPendingSwapRequests {
        requester: PersonId,
        pending: usize,
        limit: usize,
    },
    SwapRequestNotPending {
        request: SwapRequestId,
        status: SwapStatus,
    },
    TaskNotCompleted(TaskId),
    /// An area needs more people than the pool offers.
    AreaUnderstaffed {
        area: String,
        people_needed: u32,
        available: usize,
    },
    /// Planning produced a record that breaks a model invariant.
    InvalidPlan(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientPeople { .. }
            | Self::NotPermitted { .. }
            | Self::TaskAlreadyCompleted(_)
            | Self::SameTask(_) => ErrorKind::PreconditionFailed,
            Self::TaskNotFound(_) | Self::SwapRequestNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateVote { .. }
            | Self::DuplicateSwapRequest { .. }
            | Self::TooManyPendingSwapRequests { .. } => ErrorKind::Conflict,
            Self::SwapRequestNotPending { .. } | Self::TaskNotCompleted(_) => {
                ErrorKind::InvalidState
            }
            Self::AreaUnderstaffed { .. } | Self::InvalidPlan(_) => ErrorKind::InvariantViolation,
        }
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientPeople {
                available,
                required,
            } => write!(
                f,
                "rotation needs at least {required} available people, found {available}"
            ),
            Self::NotPermitted { person, task } => {
                write!(f, "person `{person}` is not permitted to act on task {task}")
            }
            Self::TaskAlreadyCompleted(id) => write!(f, "task already completed: {id}"),
            Self::SameTask(id) => write!(f, "swap must name two different tasks: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::SwapRequestNotFound(id) => write!(f, "swap request not found: {id}"),
            Self::DuplicateVote { verifier, task } => {
                write!(f, "verifier `{verifier}` already voted on task {task}")
            }
            Self::DuplicateSwapRequest {
                requester,
                requested_task,
                offered_task,
            } => write!(
                f,
                "`{requester}` already has a pending swap of {offered_task} for {requested_task}"
            ),
            Self::TooManyPendingSwapRequests {
                requester,
                pending,
                limit,
            } => write!(
                f,
                "`{requester}` has {pending} pending swap requests (limit {limit})"
            ),
            Self::SwapRequestNotPending { request, status } => write!(
                f,
                "swap request {request} is already {}",
                status.as_str()
            ),
            Self::TaskNotCompleted(id) => write!(f, "task is not completed: {id}"),
            Self::AreaUnderstaffed {
                area,
                people_needed,
                available,
            } => write!(
                f,
                "area `{area}` needs {people_needed} people but only {available} are available"
            ),
            Self::InvalidPlan(details) => write!(f, "invalid rotation plan: {details}"),
        }
    }
}

impl Error for EngineError {}
