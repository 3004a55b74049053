//! Task domain model.
//!
//! # Responsibility
//! - Define one area instance assigned for one cycle.
//! - Own embedded verification votes and swap requests.
//! - Provide permission helpers used by swap/verification transitions.
//!
//! # Invariants
//! - `responsibles` is non-empty and free of duplicates.
//! - `end_date >= start_date`.
//! - At most one vote per verifier.
//! - `version` only moves forward; storage bumps it on every write.

use crate::model::area::Frequency;
use crate::model::person::PersonId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;
/// Stable identifier of an embedded swap request.
pub type SwapRequestId = Uuid;
/// Stable identifier of an embedded verification vote.
pub type VoteId = Uuid;

/// Aggregated verification state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    InProgress,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Swap request lifecycle. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SwapStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One verifier's verdict on a completed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationVote {
    pub id: VoteId,
    pub verifier: PersonId,
    pub approved: bool,
    pub comment: Option<String>,
    pub cast_at: DateTime<Utc>,
}

/// Proposal to exchange responsibles, stored on the *requested* task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub id: SwapRequestId,
    pub requester: PersonId,
    /// Task the requester gives away in exchange.
    pub offered_task: TaskId,
    pub status: SwapStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl SwapRequest {
    pub fn is_pending(&self) -> bool {
        self.status == SwapStatus::Pending
    }
}

/// Task validation errors raised before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyArea,
    NoResponsibles,
    DuplicateResponsible(PersonId),
    EndBeforeStart,
    DuplicateVote(PersonId),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyArea => write!(f, "task area must not be blank"),
            Self::NoResponsibles => write!(f, "task must have at least one responsible"),
            Self::DuplicateResponsible(person) => {
                write!(f, "person `{person}` listed twice as responsible")
            }
            Self::EndBeforeStart => write!(f, "task end_date must not be earlier than start_date"),
            Self::DuplicateVote(person) => write!(f, "verifier `{person}` voted twice"),
        }
    }
}

impl Error for TaskValidationError {}

/// One area instance assigned for one rotation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub area: String,
    pub frequency: Frequency,
    /// Ordered; size equals the area's `people_needed` at creation.
    pub responsibles: Vec<PersonId>,
    /// Supersedes `responsibles` for permission checks, never for metrics.
    pub temporary_responsible: Option<PersonId>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub verifiers: Vec<PersonId>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when a completion is withdrawn; counts against the responsibles.
    pub marked_incomplete: bool,
    pub verification_status: VerificationStatus,
    pub votes: Vec<VerificationVote>,
    pub swap_requests: Vec<SwapRequest>,
    /// Optimistic concurrency token.
    pub version: u64,
}

impl Task {
    /// Creates a freshly assigned task with no completion, votes or requests.
    pub fn assigned(
        area: impl Into<String>,
        frequency: Frequency,
        responsibles: Vec<PersonId>,
        verifiers: Vec<PersonId>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            area: area.into(),
            frequency,
            responsibles,
            temporary_responsible: None,
            start_date,
            end_date,
            verifiers,
            completed: false,
            completed_at: None,
            marked_incomplete: false,
            verification_status: VerificationStatus::Pending,
            votes: Vec::new(),
            swap_requests: Vec::new(),
            version: 0,
        }
    }

    /// People currently allowed to act as the task's owner.
    ///
    /// The temporary responsible, when set, replaces the responsible set.
    pub fn holders(&self) -> Vec<&PersonId> {
        match self.temporary_responsible.as_ref() {
            Some(temporary) => vec![temporary],
            None => self.responsibles.iter().collect(),
        }
    }

    /// Whether `person` currently holds this task.
    pub fn is_held_by(&self, person: &str) -> bool {
        match self.temporary_responsible.as_deref() {
            Some(temporary) => temporary == person,
            None => self.responsibles.iter().any(|id| id == person),
        }
    }

    /// Whether `person` is responsible either directly or temporarily.
    pub fn is_responsible(&self, person: &str) -> bool {
        self.responsibles.iter().any(|id| id == person)
            || self.temporary_responsible.as_deref() == Some(person)
    }

    pub fn is_verifier(&self, person: &str) -> bool {
        self.verifiers.iter().any(|id| id == person)
    }

    pub fn vote_of(&self, verifier: &str) -> Option<&VerificationVote> {
        self.votes.iter().find(|vote| vote.verifier == verifier)
    }

    /// All named verifiers have cast a vote.
    pub fn voting_complete(&self) -> bool {
        !self.verifiers.is_empty()
            && self
                .verifiers
                .iter()
                .all(|verifier| self.vote_of(verifier).is_some())
    }

    pub fn swap_request(&self, id: SwapRequestId) -> Option<&SwapRequest> {
        self.swap_requests.iter().find(|request| request.id == id)
    }

    pub fn swap_request_mut(&mut self, id: SwapRequestId) -> Option<&mut SwapRequest> {
        self.swap_requests.iter_mut().find(|request| request.id == id)
    }

    pub fn pending_swap_requests(&self) -> impl Iterator<Item = &SwapRequest> {
        self.swap_requests.iter().filter(|request| request.is_pending())
    }

    /// Validates model invariants before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.area.trim().is_empty() {
            return Err(TaskValidationError::EmptyArea);
        }
        if self.responsibles.is_empty() {
            return Err(TaskValidationError::NoResponsibles);
        }
        let mut seen = BTreeSet::new();
        for person in &self.responsibles {
            if !seen.insert(person.as_str()) {
                return Err(TaskValidationError::DuplicateResponsible(person.clone()));
            }
        }
        if self.end_date < self.start_date {
            return Err(TaskValidationError::EndBeforeStart);
        }
        let mut voters = BTreeSet::new();
        for vote in &self.votes {
            if !voters.insert(vote.verifier.as_str()) {
                return Err(TaskValidationError::DuplicateVote(vote.verifier.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskValidationError};
    use crate::model::area::Frequency;
    use chrono::{Duration, Utc};

    fn task(responsibles: &[&str]) -> Task {
        let start = Utc::now();
        Task::assigned(
            "Cocina",
            Frequency::Weekly,
            responsibles.iter().map(|id| id.to_string()).collect(),
            vec!["v1".to_string()],
            start,
            start + Duration::days(7),
        )
    }

    #[test]
    fn temporary_responsible_supersedes_holders() {
        let mut task = task(&["ana", "bea"]);
        assert!(task.is_held_by("ana"));

        task.temporary_responsible = Some("carl".to_string());
        assert!(!task.is_held_by("ana"));
        assert!(task.is_held_by("carl"));
        assert!(task.is_responsible("ana"));
        assert!(task.is_responsible("carl"));
        assert_eq!(task.holders(), vec!["carl"]);
    }

    #[test]
    fn validate_rejects_duplicate_responsibles_and_inverted_dates() {
        let duplicated = task(&["ana", "ana"]);
        assert_eq!(
            duplicated.validate(),
            Err(TaskValidationError::DuplicateResponsible("ana".to_string()))
        );

        let mut inverted = task(&["ana"]);
        inverted.end_date = inverted.start_date - Duration::days(1);
        assert_eq!(inverted.validate(), Err(TaskValidationError::EndBeforeStart));
    }
}
