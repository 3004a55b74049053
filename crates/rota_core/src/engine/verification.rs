//! Verification state machine.
//!
//! # Responsibility
//! - Accept one vote per named verifier on a completed task.
//! - Aggregate votes into a status after every vote.
//! - Reset verification whenever the completion flag changes.
//!
//! # Invariants
//! - Votes only exist for the current completion event.
//! - While voting is open the status is provisional and may flip; only the
//!   status computed after the last verifier voted is final.

use crate::engine::error::{EngineError, EngineResult};
use crate::model::task::{Task, VerificationStatus, VerificationVote};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Vote counts against the full verifier roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub approvals: usize,
    pub rejections: usize,
    pub roster: usize,
}

impl VoteTally {
    pub fn of(task: &Task) -> Self {
        let approvals = task.votes.iter().filter(|vote| vote.approved).count();
        Self {
            approvals,
            rejections: task.votes.len() - approvals,
            roster: task.verifiers.len(),
        }
    }

    pub fn cast(&self) -> usize {
        self.approvals + self.rejections
    }
}

/// Derives the status for a tally.
///
/// Complete voting: approved iff approvals outnumber rejections (ties reject).
/// Open voting: a side that already holds a strict majority of the roster
/// decides the provisional status; otherwise `in_progress`.
///
/// Three verifiers voting approve, approve, reject move the task through
/// `in_progress`, `approved`, `approved`: the second approval is already a
/// strict majority of three. Two verifiers voting approve, reject move it
/// through `in_progress`, `rejected`, since a one-one split is a tie.
pub fn resolve_status(tally: VoteTally) -> VerificationStatus {
    if tally.cast() == 0 {
        return VerificationStatus::Pending;
    }
    if tally.cast() >= tally.roster {
        return if tally.approvals > tally.rejections {
            VerificationStatus::Approved
        } else {
            VerificationStatus::Rejected
        };
    }
    if tally.approvals * 2 > tally.roster {
        VerificationStatus::Approved
    } else if tally.rejections * 2 > tally.roster {
        VerificationStatus::Rejected
    } else {
        VerificationStatus::InProgress
    }
}

/// Records `verifier`'s vote and recomputes the task status.
pub fn cast_vote(
    task: &Task,
    verifier: &str,
    approved: bool,
    comment: Option<String>,
    now: DateTime<Utc>,
) -> EngineResult<Task> {
    if !task.completed {
        return Err(EngineError::TaskNotCompleted(task.id));
    }
    if !task.is_verifier(verifier) {
        return Err(EngineError::NotPermitted {
            person: verifier.to_string(),
            task: task.id,
        });
    }
    if task.vote_of(verifier).is_some() {
        return Err(EngineError::DuplicateVote {
            verifier: verifier.to_string(),
            task: task.id,
        });
    }

    let mut updated = task.clone();
    updated.votes.push(VerificationVote {
        id: Uuid::new_v4(),
        verifier: verifier.to_string(),
        approved,
        comment: comment.filter(|text| !text.trim().is_empty()),
        cast_at: now,
    });
    updated.verification_status = resolve_status(VoteTally::of(&updated));
    Ok(updated)
}

/// Marks a task completed or withdraws/declines completion.
///
/// Any change starts a new verification round: votes are cleared and the
/// status goes back to `pending`. Marking an already completed task completed
/// again returns it unchanged.
pub fn set_completion(
    task: &Task,
    actor: &str,
    completed: bool,
    now: DateTime<Utc>,
) -> EngineResult<Task> {
    if !task.is_held_by(actor) {
        return Err(EngineError::NotPermitted {
            person: actor.to_string(),
            task: task.id,
        });
    }
    if completed && task.completed {
        return Ok(task.clone());
    }

    let mut updated = task.clone();
    updated.completed = completed;
    updated.completed_at = completed.then_some(now);
    updated.marked_incomplete = !completed;
    updated.votes.clear();
    updated.verification_status = VerificationStatus::Pending;
    Ok(updated)
}

/// Whether an external archival sweep may archive `task`.
///
/// Requires a final approval (every verifier voted) and an end date at least
/// `min_age_days` in the past.
pub fn is_archive_eligible(task: &Task, now: DateTime<Utc>, min_age_days: i64) -> bool {
    task.completed
        && task.voting_complete()
        && task.verification_status == VerificationStatus::Approved
        && task.end_date + Duration::days(min_age_days) <= now
}

#[cfg(test)]
mod tests {
    use super::{cast_vote, is_archive_eligible, resolve_status, set_completion, VoteTally};
    use crate::engine::error::{EngineError, ErrorKind};
    use crate::model::area::Frequency;
    use crate::model::task::{Task, VerificationStatus};
    use chrono::{Duration, Utc};

    fn completed_task(verifiers: &[&str]) -> Task {
        let start = Utc::now() - Duration::days(60);
        let mut task = Task::assigned(
            "Cocina",
            Frequency::Weekly,
            vec!["ana".to_string()],
            verifiers.iter().map(|id| id.to_string()).collect(),
            start,
            start + Duration::days(7),
        );
        task.completed = true;
        task
    }

    #[test]
    fn three_verifiers_approve_approve_reject() {
        let task = completed_task(&["v1", "v2", "v3"]);
        let now = Utc::now();

        let task = cast_vote(&task, "v1", true, None, now).unwrap();
        assert_eq!(task.verification_status, VerificationStatus::InProgress);
        let task = cast_vote(&task, "v2", true, None, now).unwrap();
        assert_eq!(task.verification_status, VerificationStatus::Approved);
        let task = cast_vote(&task, "v3", false, Some("missed a spot".into()), now).unwrap();
        assert_eq!(task.verification_status, VerificationStatus::Approved);
        assert!(task.voting_complete());
    }

    #[test]
    fn tie_after_all_votes_rejects() {
        let task = completed_task(&["v1", "v2"]);
        let now = Utc::now();

        let task = cast_vote(&task, "v1", true, None, now).unwrap();
        assert_eq!(task.verification_status, VerificationStatus::InProgress);
        let task = cast_vote(&task, "v2", false, None, now).unwrap();
        assert_eq!(task.verification_status, VerificationStatus::Rejected);
    }

    #[test]
    fn provisional_status_follows_roster_majority() {
        let tally = |approvals, rejections, roster| VoteTally {
            approvals,
            rejections,
            roster,
        };
        assert_eq!(resolve_status(tally(0, 0, 3)), VerificationStatus::Pending);
        assert_eq!(resolve_status(tally(0, 2, 3)), VerificationStatus::Rejected);
        assert_eq!(resolve_status(tally(1, 1, 3)), VerificationStatus::InProgress);
        assert_eq!(resolve_status(tally(2, 2, 5)), VerificationStatus::InProgress);
        assert_eq!(resolve_status(tally(3, 1, 5)), VerificationStatus::Approved);
        assert_eq!(resolve_status(tally(1, 0, 1)), VerificationStatus::Approved);
    }

    #[test]
    fn vote_guards_report_expected_kinds() {
        let mut open = completed_task(&["v1"]);
        open.completed = false;
        let err = cast_vote(&open, "v1", true, None, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let task = completed_task(&["v1", "v2"]);
        let err = cast_vote(&task, "ana", true, None, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

        let voted = cast_vote(&task, "v1", false, None, Utc::now()).unwrap();
        let err = cast_vote(&voted, "v1", true, None, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateVote { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!voted.votes[0].approved);
    }

    #[test]
    fn withdrawing_completion_clears_votes_and_resets_status() {
        let task = completed_task(&["v1", "v2"]);
        let voted = cast_vote(&task, "v1", true, None, Utc::now()).unwrap();

        let withdrawn = set_completion(&voted, "ana", false, Utc::now()).unwrap();
        assert!(!withdrawn.completed);
        assert!(withdrawn.marked_incomplete);
        assert!(withdrawn.completed_at.is_none());
        assert!(withdrawn.votes.is_empty());
        assert_eq!(withdrawn.verification_status, VerificationStatus::Pending);

        let redone = set_completion(&withdrawn, "ana", true, Utc::now()).unwrap();
        assert!(redone.completed);
        assert!(!redone.marked_incomplete);
        assert!(redone.completed_at.is_some());

        let err = set_completion(&redone, "v1", false, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn archive_needs_final_approval_and_age() {
        let task = completed_task(&["v1", "v2"]);
        let now = Utc::now();
        let once = cast_vote(&task, "v1", true, None, now).unwrap();
        assert!(!is_archive_eligible(&once, now, 30));

        let twice = cast_vote(&once, "v2", true, None, now).unwrap();
        assert!(is_archive_eligible(&twice, now, 30));
        assert!(!is_archive_eligible(&twice, now, 90));
    }
}
