//! Task use-case service.
//!
//! # Responsibility
//! - Apply swap, reassignment and verification transitions to stored tasks.
//! - Persist every transition with a version check.
//!
//! # Invariants
//! - Accepting a swap or swapping directly writes both tasks or neither.
//! - Only tasks of the current rotation are loaded or written.
//! - Log lines carry ids and outcomes only, never vote comments.

use crate::config::{EngineConfig, DEFAULT_ARCHIVE_AFTER_DAYS};
use crate::engine::swap::{self, SwapResolution, DEFAULT_MAX_PENDING_SWAP_REQUESTS};
use crate::engine::verification;
use crate::model::person::PersonId;
use crate::model::task::{SwapRequestId, Task, TaskId};
use crate::repo::task_repo::TaskRepository;
use crate::service::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use log::info;

/// Use-case service wrapper for per-task transitions.
pub struct TaskService<R: TaskRepository> {
    repo: R,
    max_pending_swap_requests: usize,
    archive_after_days: i64,
}

impl<R: TaskRepository> TaskService<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            max_pending_swap_requests: DEFAULT_MAX_PENDING_SWAP_REQUESTS,
            archive_after_days: DEFAULT_ARCHIVE_AFTER_DAYS,
        }
    }

    /// Builds a service with the swap ceiling and archive age of `config`.
    pub fn from_config(repo: R, config: &EngineConfig) -> Self {
        Self::new(repo)
            .with_swap_limit(config.max_pending_swap_requests)
            .with_archive_after_days(config.archive_after_days)
    }

    /// Overrides the pending swap request ceiling.
    pub fn with_swap_limit(mut self, max_pending_swap_requests: usize) -> Self {
        self.max_pending_swap_requests = max_pending_swap_requests;
        self
    }

    /// Overrides the minimum age, in days past the end date, for archival.
    pub fn with_archive_after_days(mut self, archive_after_days: i64) -> Self {
        self.archive_after_days = archive_after_days;
        self
    }

    pub fn get_task(&self, id: TaskId) -> ServiceResult<Task> {
        self.repo.get_task(id)?.ok_or(ServiceError::TaskNotFound(id))
    }

    pub fn list_current(&self) -> ServiceResult<Vec<Task>> {
        Ok(self.repo.list_current()?)
    }

    /// Files a request from `requester` to trade `offered` for `requested`.
    ///
    /// Returns the stored requested task with the new pending request.
    pub fn request_swap(
        &self,
        requested: TaskId,
        offered: TaskId,
        requester: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let requested_task = self.get_task(requested)?;
        let offered_task = self.get_task(offered)?;
        let pending = self.repo.count_pending_swap_requests(requester)?;

        let updated = swap::request_swap(
            &requested_task,
            &offered_task,
            requester,
            pending,
            self.max_pending_swap_requests,
            now,
        )?;
        let stored = self.repo.update_task(&updated)?;
        info!(
            "event=swap_request module=service status=ok task={} offered={} pending={}",
            requested,
            offered,
            pending + 1
        );
        Ok(stored)
    }

    /// Accepts or rejects a pending request stored on `requested`.
    pub fn respond_to_swap(
        &self,
        requested: TaskId,
        request_id: SwapRequestId,
        responder: &str,
        accept: bool,
        now: DateTime<Utc>,
    ) -> ServiceResult<SwapResolution> {
        let requested_task = self.get_task(requested)?;
        let offered_task = match requested_task.swap_request(request_id) {
            Some(request) if accept => self.repo.get_task(request.offered_task)?,
            _ => None,
        };

        let resolution = swap::respond_to_swap(
            &requested_task,
            offered_task.as_ref(),
            request_id,
            responder,
            accept,
            now,
        )?;
        let stored = match &resolution.offered {
            Some(offered) => {
                let (stored_requested, stored_offered) =
                    self.repo.update_task_pair(&resolution.requested, offered)?;
                SwapResolution {
                    requested: stored_requested,
                    offered: Some(stored_offered),
                }
            }
            None => SwapResolution {
                requested: self.repo.update_task(&resolution.requested)?,
                offered: None,
            },
        };
        info!(
            "event=swap_respond module=service status=ok task={} request={} accepted={}",
            requested, request_id, accept
        );
        Ok(stored)
    }

    /// Swaps the responsibles of two tasks without a request.
    pub fn direct_swap(
        &self,
        first: TaskId,
        second: TaskId,
        actor: &str,
    ) -> ServiceResult<(Task, Task)> {
        let first_task = self.get_task(first)?;
        let second_task = self.get_task(second)?;
        let (updated_first, updated_second) = swap::direct_swap(&first_task, &second_task, actor)?;
        let stored = self.repo.update_task_pair(&updated_first, &updated_second)?;
        info!(
            "event=swap_direct module=service status=ok first={} second={}",
            first, second
        );
        Ok(stored)
    }

    pub fn set_temporary_responsible(
        &self,
        task: TaskId,
        actor: &str,
        temporary: Option<PersonId>,
    ) -> ServiceResult<Task> {
        let current = self.get_task(task)?;
        let cleared = temporary.is_none();
        let updated = swap::set_temporary_responsible(&current, actor, temporary)?;
        let stored = self.repo.update_task(&updated)?;
        info!(
            "event=temporary_responsible module=service status=ok task={} cleared={}",
            task, cleared
        );
        Ok(stored)
    }

    /// Records a verification vote and returns the task with its new status.
    pub fn cast_vote(
        &self,
        task: TaskId,
        verifier: &str,
        approved: bool,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let current = self.get_task(task)?;
        let updated = verification::cast_vote(&current, verifier, approved, comment, now)?;
        let stored = self.repo.update_task(&updated)?;
        info!(
            "event=verification_vote module=service status=ok task={} approved={} result={} votes={}/{}",
            task,
            approved,
            stored.verification_status.as_str(),
            stored.votes.len(),
            stored.verifiers.len()
        );
        Ok(stored)
    }

    /// Marks a task completed, or withdraws completion.
    ///
    /// A no-op transition returns the stored task without writing.
    pub fn set_completion(
        &self,
        task: TaskId,
        actor: &str,
        completed: bool,
        now: DateTime<Utc>,
    ) -> ServiceResult<Task> {
        let current = self.get_task(task)?;
        let updated = verification::set_completion(&current, actor, completed, now)?;
        if updated == current {
            return Ok(current);
        }
        let stored = self.repo.update_task(&updated)?;
        info!(
            "event=task_completion module=service status=ok task={} completed={}",
            task, completed
        );
        Ok(stored)
    }

    /// Stored tasks, current or superseded, an archival sweep may archive.
    pub fn archive_candidates(&self, now: DateTime<Utc>) -> ServiceResult<Vec<Task>> {
        Ok(self
            .repo
            .list_history()?
            .into_iter()
            .filter(|task| verification::is_archive_eligible(task, now, self.archive_after_days))
            .collect())
    }
}
