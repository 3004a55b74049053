//! Rotation use-case service.
//!
//! # Responsibility
//! - Run one rotation end to end: read roster and history, plan, replace.
//!
//! # Invariants
//! - A failed plan writes nothing; the previous rotation stays current.
//! - Replacement is rejected when the current rotation changed after it was
//!   read, so two concurrent runs cannot both commit.

use crate::config::EngineConfig;
use crate::engine::planner::plan_rotation_with;
use crate::model::task::{Task, TaskId};
use crate::repo::roster_repo::RosterRepository;
use crate::repo::task_repo::TaskRepository;
use crate::service::ServiceResult;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::time::Instant;

/// Result of one committed rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationOutcome {
    /// New current tasks, hardest area first.
    pub tasks: Vec<Task>,
    pub target_workload: f64,
    /// Number of previously current tasks now kept as history.
    pub superseded: usize,
}

/// Use-case service wrapper for rotation runs.
pub struct RotationService<T: TaskRepository, P: RosterRepository> {
    tasks: T,
    roster: P,
    config: EngineConfig,
}

impl<T: TaskRepository, P: RosterRepository> RotationService<T, P> {
    pub fn new(tasks: T, roster: P, config: EngineConfig) -> Self {
        Self {
            tasks,
            roster,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plans the next cycle starting at `now` and makes it current.
    pub fn run_rotation(&self, now: DateTime<Utc>) -> ServiceResult<RotationOutcome> {
        let started_at = Instant::now();
        let current: Vec<TaskId> = self
            .tasks
            .list_current()?
            .iter()
            .map(|task| task.id)
            .collect();
        let available = self.roster.list_available()?;
        let history = self.tasks.list_history()?;

        let plan = match plan_rotation_with(
            &history,
            &available,
            &self.config.areas,
            now,
            self.config.planner_settings(),
        ) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(
                    "event=rotation_run module=service status=error error_code={} available={}",
                    err.kind().as_str(),
                    available.len()
                );
                return Err(err.into());
            }
        };

        let summary = self.tasks.replace_rotation(&current, &plan.tasks, now)?;
        info!(
            "event=rotation_run module=service status=ok tasks={} superseded={} available={} duration_ms={}",
            summary.inserted,
            summary.superseded,
            available.len(),
            started_at.elapsed().as_millis()
        );

        Ok(RotationOutcome {
            tasks: plan.tasks,
            target_workload: plan.target_workload,
            superseded: summary.superseded,
        })
    }
}
