//! Swap negotiation and temporary reassignment transitions.
//!
//! # Responsibility
//! - Create swap requests on the requested task.
//! - Resolve requests (accept swaps responsible sets, reject has no effect).
//! - Swap two tasks immediately and set/clear temporary responsibles.
//!
//! # Invariants
//! - Request states only move `pending -> accepted | rejected`.
//! - A swap rewrites exactly two tasks; callers persist both or neither.
//! - Completed tasks are never swapped or reassigned.

use crate::engine::error::{EngineError, EngineResult};
use crate::model::person::PersonId;
use crate::model::task::{SwapRequest, SwapRequestId, SwapStatus, Task};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Pending requests one person may have outstanding across all tasks.
pub const DEFAULT_MAX_PENDING_SWAP_REQUESTS: usize = 3;

/// Tasks rewritten by resolving a swap request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResolution {
    pub requested: Task,
    /// Present only when the request was accepted.
    pub offered: Option<Task>,
}

impl SwapResolution {
    pub fn into_tasks(self) -> Vec<Task> {
        let mut tasks = vec![self.requested];
        tasks.extend(self.offered);
        tasks
    }
}

/// Records a proposal from `requester` to trade `offered` for `requested`.
///
/// `pending_for_requester` is the requester's pending count across the whole
/// current rotation, supplied by storage.
pub fn request_swap(
    requested: &Task,
    offered: &Task,
    requester: &str,
    pending_for_requester: usize,
    max_pending: usize,
    now: DateTime<Utc>,
) -> EngineResult<Task> {
    if requested.id == offered.id {
        return Err(EngineError::SameTask(requested.id));
    }
    if !offered.is_held_by(requester) {
        return Err(EngineError::NotPermitted {
            person: requester.to_string(),
            task: offered.id,
        });
    }
    let duplicate = requested
        .pending_swap_requests()
        .any(|request| request.requester == requester && request.offered_task == offered.id);
    if duplicate {
        return Err(EngineError::DuplicateSwapRequest {
            requester: requester.to_string(),
            requested_task: requested.id,
            offered_task: offered.id,
        });
    }
    if pending_for_requester >= max_pending {
        return Err(EngineError::TooManyPendingSwapRequests {
            requester: requester.to_string(),
            pending: pending_for_requester,
            limit: max_pending,
        });
    }

    let mut updated = requested.clone();
    updated.swap_requests.push(SwapRequest {
        id: Uuid::new_v4(),
        requester: requester.to_string(),
        offered_task: offered.id,
        status: SwapStatus::Pending,
        created_at: now,
        responded_at: None,
    });
    Ok(updated)
}

/// Accepts or rejects a pending request stored on `requested`.
///
/// `offered` is the task named by the request, or `None` when it no longer
/// exists. It is only required for acceptance.
pub fn respond_to_swap(
    requested: &Task,
    offered: Option<&Task>,
    request_id: SwapRequestId,
    responder: &str,
    accept: bool,
    now: DateTime<Utc>,
) -> EngineResult<SwapResolution> {
    let request = requested
        .swap_request(request_id)
        .ok_or(EngineError::SwapRequestNotFound(request_id))?;
    if !requested.is_held_by(responder) {
        return Err(EngineError::NotPermitted {
            person: responder.to_string(),
            task: requested.id,
        });
    }
    if !request.is_pending() {
        return Err(EngineError::SwapRequestNotPending {
            request: request_id,
            status: request.status,
        });
    }

    let mut updated_requested = requested.clone();
    if !accept {
        mark_request(&mut updated_requested, request_id, SwapStatus::Rejected, now);
        return Ok(SwapResolution {
            requested: updated_requested,
            offered: None,
        });
    }

    let offered_task_id = request.offered_task;
    let offered = offered
        .filter(|task| task.id == offered_task_id)
        .ok_or(EngineError::TaskNotFound(offered_task_id))?;
    // The offered task may have changed hands since the request was made.
    if !offered.is_held_by(&request.requester) {
        return Err(EngineError::NotPermitted {
            person: request.requester.clone(),
            task: offered_task_id,
        });
    }
    let mut updated_offered = offered.clone();
    exchange_responsibles(&mut updated_requested, &mut updated_offered);
    mark_request(&mut updated_requested, request_id, SwapStatus::Accepted, now);

    Ok(SwapResolution {
        requested: updated_requested,
        offered: Some(updated_offered),
    })
}

/// Swaps responsibles of two tasks immediately, without a request record.
pub fn direct_swap(first: &Task, second: &Task, actor: &str) -> EngineResult<(Task, Task)> {
    if first.id == second.id {
        return Err(EngineError::SameTask(first.id));
    }
    if !first.is_responsible(actor) && !second.is_responsible(actor) {
        return Err(EngineError::NotPermitted {
            person: actor.to_string(),
            task: first.id,
        });
    }
    for task in [first, second] {
        if task.completed {
            return Err(EngineError::TaskAlreadyCompleted(task.id));
        }
    }

    let mut updated_first = first.clone();
    let mut updated_second = second.clone();
    exchange_responsibles(&mut updated_first, &mut updated_second);
    Ok((updated_first, updated_second))
}

/// Sets (`Some`) or clears (`None`) the temporary responsible override.
///
/// Only a listed responsible may set it; the current temporary responsible
/// may also hand it back by clearing.
pub fn set_temporary_responsible(
    task: &Task,
    actor: &str,
    temporary: Option<PersonId>,
) -> EngineResult<Task> {
    if task.completed {
        return Err(EngineError::TaskAlreadyCompleted(task.id));
    }
    let listed = task.responsibles.iter().any(|id| id == actor);
    let releasing = temporary.is_none() && task.temporary_responsible.as_deref() == Some(actor);
    if !listed && !releasing {
        return Err(EngineError::NotPermitted {
            person: actor.to_string(),
            task: task.id,
        });
    }

    let mut updated = task.clone();
    updated.temporary_responsible = temporary;
    Ok(updated)
}

fn exchange_responsibles(first: &mut Task, second: &mut Task) {
    std::mem::swap(&mut first.responsibles, &mut second.responsibles);
    first.temporary_responsible = None;
    second.temporary_responsible = None;
}

fn mark_request(task: &mut Task, request_id: SwapRequestId, status: SwapStatus, now: DateTime<Utc>) {
    if let Some(request) = task.swap_request_mut(request_id) {
        request.status = status;
        request.responded_at = Some(now);
    }
}
