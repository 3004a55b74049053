//! Per-person performance and fairness metrics.
//!
//! # Responsibility
//! - Reduce full task history into one `UserMetrics` per available person.
//!
//! # Invariants
//! - Output contains exactly the available people, in id order.
//! - People absent from the available pool are ignored even if they appear
//!   in history.
//! - `build_metrics` is pure: identical inputs give identical output.

use crate::model::person::{Person, PersonId};
use crate::model::task::{Task, VerificationStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Metrics keyed by person id.
pub type MetricsMap = BTreeMap<PersonId, UserMetrics>;

/// Historical performance summary for one person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserMetrics {
    /// Tasks where the person was listed among the responsibles.
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub incomplete_tasks: u32,
    /// `completed / (completed + incomplete)`, 1.0 without evaluable history.
    pub completion_rate: f64,
    /// Latest end date seen per area.
    pub last_assigned: BTreeMap<String, DateTime<Utc>>,
    /// Times assigned per area.
    pub area_counts: BTreeMap<String, u32>,
}

impl Default for UserMetrics {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            completed_tasks: 0,
            incomplete_tasks: 0,
            completion_rate: 1.0,
            last_assigned: BTreeMap::new(),
            area_counts: BTreeMap::new(),
        }
    }
}

impl UserMetrics {
    pub fn times_assigned(&self, area: &str) -> u32 {
        self.area_counts.get(area).copied().unwrap_or(0)
    }

    pub fn last_assigned_to(&self, area: &str) -> Option<DateTime<Utc>> {
        self.last_assigned.get(area).copied()
    }

    fn credit(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed_tasks += 1,
            Outcome::IncompleteOrRejected => self.incomplete_tasks += 1,
            Outcome::Open => {}
        }
    }

    fn record_assignment(&mut self, area: &str, end_date: DateTime<Utc>) {
        self.total_tasks += 1;
        *self.area_counts.entry(area.to_string()).or_insert(0) += 1;
        self.last_assigned
            .entry(area.to_string())
            .and_modify(|latest| {
                if end_date > *latest {
                    *latest = end_date;
                }
            })
            .or_insert(end_date);
    }

    fn refresh_completion_rate(&mut self) {
        let evaluated = self.completed_tasks + self.incomplete_tasks;
        self.completion_rate = if evaluated == 0 {
            1.0
        } else {
            f64::from(self.completed_tasks) / f64::from(evaluated)
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    IncompleteOrRejected,
    Open,
}

fn outcome_of(task: &Task) -> Outcome {
    if task.completed && task.verification_status == VerificationStatus::Approved {
        Outcome::Completed
    } else if task.verification_status == VerificationStatus::Rejected || task.marked_incomplete {
        Outcome::IncompleteOrRejected
    } else {
        Outcome::Open
    }
}

/// Builds metrics for every person in `available` from `history`.
///
/// Responsibles get completion credit plus area recency/count statistics. A
/// temporary responsible gets completion credit only. The two roles accrue
/// credit independently, so a person holding both is credited twice.
pub fn build_metrics(history: &[Task], available: &[Person]) -> MetricsMap {
    let mut metrics: MetricsMap = available
        .iter()
        .map(|person| (person.id.clone(), UserMetrics::default()))
        .collect();

    for task in history {
        let outcome = outcome_of(task);

        for person in &task.responsibles {
            if let Some(entry) = metrics.get_mut(person) {
                entry.credit(outcome);
                entry.record_assignment(&task.area, task.end_date);
            }
        }

        if let Some(temporary) = task.temporary_responsible.as_ref() {
            if let Some(entry) = metrics.get_mut(temporary) {
                entry.credit(outcome);
            }
        }
    }

    for entry in metrics.values_mut() {
        entry.refresh_completion_rate();
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::build_metrics;
    use crate::model::area::Frequency;
    use crate::model::person::Person;
    use crate::model::task::{Task, VerificationStatus};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap()
    }

    fn task(area: &str, responsibles: &[&str], day: u32) -> Task {
        Task::assigned(
            area,
            Frequency::Weekly,
            responsibles.iter().map(|id| id.to_string()).collect(),
            Vec::new(),
            start(day),
            start(day) + Duration::days(7),
        )
    }

    fn approved(mut task: Task) -> Task {
        task.completed = true;
        task.verification_status = VerificationStatus::Approved;
        task
    }

    fn rejected(mut task: Task) -> Task {
        task.completed = true;
        task.verification_status = VerificationStatus::Rejected;
        task
    }

    fn people(ids: &[&str]) -> Vec<Person> {
        ids.iter().map(|id| Person::new(*id, id.to_uppercase())).collect()
    }

    #[test]
    fn prepopulates_available_people_and_ignores_everyone_else() {
        let history = vec![approved(task("Cocina", &["ghost"], 1))];
        let metrics = build_metrics(&history, &people(&["ana", "bea"]));

        assert_eq!(metrics.len(), 2);
        assert!(!metrics.contains_key("ghost"));
        let ana = &metrics["ana"];
        assert_eq!(ana.total_tasks, 0);
        assert_eq!(ana.completion_rate, 1.0);
    }

    #[test]
    fn classifies_completed_rejected_incomplete_and_open_tasks() {
        let mut withdrawn = task("Lavandería", &["ana"], 4);
        withdrawn.marked_incomplete = true;
        let mut unverified = task("Cocina", &["ana"], 5);
        unverified.completed = true;
        unverified.verification_status = VerificationStatus::InProgress;

        let history = vec![
            approved(task("Cocina", &["ana"], 1)),
            approved(task("Cocina", &["ana"], 2)),
            rejected(task("Baño Principal", &["ana"], 3)),
            withdrawn,
            unverified,
        ];
        let metrics = build_metrics(&history, &people(&["ana"]));
        let ana = &metrics["ana"];

        assert_eq!(ana.total_tasks, 5);
        assert_eq!(ana.completed_tasks, 2);
        assert_eq!(ana.incomplete_tasks, 2);
        assert!((ana.completion_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(ana.times_assigned("Cocina"), 3);
    }

    #[test]
    fn keeps_latest_end_date_regardless_of_history_order() {
        let history = vec![task("Cocina", &["ana"], 10), task("Cocina", &["ana"], 20)];
        let metrics = build_metrics(&history, &people(&["ana"]));

        assert_eq!(
            metrics["ana"].last_assigned_to("Cocina"),
            Some(start(20) + Duration::days(7))
        );
    }

    #[test]
    fn temporary_responsible_only_gets_completion_credit() {
        let mut covered = rejected(task("Cocina", &["ana"], 1));
        covered.temporary_responsible = Some("bea".to_string());
        let metrics = build_metrics(&[covered], &people(&["ana", "bea"]));

        let bea = &metrics["bea"];
        assert_eq!(bea.incomplete_tasks, 1);
        assert_eq!(bea.total_tasks, 0);
        assert!(bea.area_counts.is_empty());
        assert!(bea.last_assigned.is_empty());
        assert_eq!(bea.completion_rate, 0.0);
        assert_eq!(metrics["ana"].incomplete_tasks, 1);
    }

    #[test]
    fn responsible_covering_own_task_is_credited_per_role() {
        let mut covered = rejected(task("Baño Principal", &["ana", "dani"], 2));
        covered.temporary_responsible = Some("dani".to_string());
        let history = vec![approved(task("Cocina", &["dani"], 1)), covered];
        let metrics = build_metrics(&history, &people(&["dani"]));

        let dani = &metrics["dani"];
        assert_eq!(dani.completed_tasks, 1);
        assert_eq!(dani.incomplete_tasks, 2);
        assert_eq!(dani.total_tasks, 2);
        assert_eq!(dani.times_assigned("Baño Principal"), 1);
        assert!((dani.completion_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn identical_inputs_yield_identical_metrics() {
        let history = vec![
            approved(task("Cocina", &["ana", "bea"], 1)),
            rejected(task("Lavandería", &["bea"], 2)),
        ];
        let roster = people(&["ana", "bea", "carl"]);
        assert_eq!(build_metrics(&history, &roster), build_metrics(&history, &roster));
    }
}
