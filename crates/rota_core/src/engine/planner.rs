//! Rotation planner.
//!
//! # Responsibility
//! - Assign responsibles and verifiers to every configured area for one cycle.
//! - Keep workload accumulators private to a single planning run.
//!
//! # Invariants
//! - Every task gets exactly `area.people_needed` distinct responsibles.
//! - Verifiers exclude the task's responsibles unless the pool is too small.
//! - Any failure aborts the whole plan; no partial plan is ever returned.

use crate::engine::error::{EngineError, EngineResult};
use crate::engine::metrics::{build_metrics, MetricsMap, UserMetrics};
use crate::engine::scorer::{score_person, ScoringContext};
use crate::model::area::{Area, AreaCatalog};
use crate::model::person::{Person, PersonId};
use crate::model::task::Task;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;

pub const DEFAULT_MIN_AVAILABLE_PEOPLE: usize = 2;
pub const DEFAULT_VERIFIERS_PER_TASK: usize = 3;

/// Tunable planning limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerSettings {
    pub min_available_people: usize,
    pub verifiers_per_task: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            min_available_people: DEFAULT_MIN_AVAILABLE_PEOPLE,
            verifiers_per_task: DEFAULT_VERIFIERS_PER_TASK,
        }
    }
}

/// Workload one person picked up during the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleLoad {
    /// Sum of difficulties of areas assigned this cycle.
    pub workload: u64,
    pub assigned_tasks: u32,
}

/// Output of one planning run.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationPlan {
    /// New tasks in staffing order (hardest area first).
    pub tasks: Vec<Task>,
    pub target_workload: f64,
    pub loads: BTreeMap<PersonId, CycleLoad>,
}

/// Plans one rotation with default settings and returns the new task set.
pub fn plan_rotation(
    history: &[Task],
    available: &[Person],
    catalog: &AreaCatalog,
    now: DateTime<Utc>,
) -> EngineResult<Vec<Task>> {
    plan_rotation_with(history, available, catalog, now, PlannerSettings::default())
        .map(|plan| plan.tasks)
}

/// Plans one rotation.
///
/// Areas are staffed hardest first; each area is scored against the live
/// workload left by earlier areas, so the fairness signal accumulates.
pub fn plan_rotation_with(
    history: &[Task],
    available: &[Person],
    catalog: &AreaCatalog,
    now: DateTime<Utc>,
    settings: PlannerSettings,
) -> EngineResult<RotationPlan> {
    let started_at = Instant::now();
    let required = settings.min_available_people.max(DEFAULT_MIN_AVAILABLE_PEOPLE);
    if available.len() < required {
        warn!(
            "event=rotation_plan module=engine status=error error_code=insufficient_people available={} required={}",
            available.len(),
            required
        );
        return Err(EngineError::InsufficientPeople {
            available: available.len(),
            required,
        });
    }
    ensure_staffable(catalog, available.len())?;

    let mut metrics = build_metrics(history, available);
    let target_workload = catalog.target_workload(available.len());
    let max_historical_tasks = metrics
        .values()
        .map(|entry| entry.total_tasks)
        .max()
        .unwrap_or(0);
    let context = ScoringContext {
        now,
        target_workload,
        max_historical_tasks,
    };
    let mut loads: BTreeMap<PersonId, CycleLoad> = available
        .iter()
        .map(|person| (person.id.clone(), CycleLoad::default()))
        .collect();

    let mut tasks = Vec::with_capacity(catalog.len());
    for area in catalog.by_difficulty_desc() {
        let responsibles = pick_responsibles(area, available, &metrics, &loads, &context);

        for person in &responsibles {
            let load = loads.entry(person.clone()).or_default();
            load.workload += u64::from(area.difficulty);
            load.assigned_tasks += 1;
            metrics
                .entry(person.clone())
                .or_default()
                .last_assigned
                .insert(area.name.clone(), now);
        }

        let verifiers = pick_verifiers(
            available,
            &responsibles,
            &metrics,
            settings.verifiers_per_task,
        );
        let end_date = area.frequency.end_date_from(now).ok_or_else(|| {
            EngineError::InvalidPlan(format!("end date out of range for area `{}`", area.name))
        })?;

        debug!(
            "event=rotation_area module=engine status=ok responsibles={} verifiers={} difficulty={}",
            responsibles.len(),
            verifiers.len(),
            area.difficulty
        );

        let task = Task::assigned(
            area.name.clone(),
            area.frequency,
            responsibles,
            verifiers,
            now,
            end_date,
        );
        task.validate()
            .map_err(|err| EngineError::InvalidPlan(err.to_string()))?;
        tasks.push(task);
    }

    info!(
        "event=rotation_plan module=engine status=ok tasks={} people={} target_workload={:.2} duration_ms={}",
        tasks.len(),
        available.len(),
        target_workload,
        started_at.elapsed().as_millis()
    );

    Ok(RotationPlan {
        tasks,
        target_workload,
        loads,
    })
}

fn ensure_staffable(catalog: &AreaCatalog, available: usize) -> EngineResult<()> {
    for area in catalog.areas() {
        if area.people_needed == 0 {
            return Err(EngineError::InvalidPlan(format!(
                "area `{}` needs zero people",
                area.name
            )));
        }
        let needed = usize::try_from(area.people_needed).unwrap_or(usize::MAX);
        if needed > available {
            return Err(EngineError::AreaUnderstaffed {
                area: area.name.clone(),
                people_needed: area.people_needed,
                available,
            });
        }
    }
    Ok(())
}

fn pick_responsibles(
    area: &Area,
    available: &[Person],
    metrics: &MetricsMap,
    loads: &BTreeMap<PersonId, CycleLoad>,
    context: &ScoringContext,
) -> Vec<PersonId> {
    let fallback = UserMetrics::default();
    let mut ranked: Vec<(&Person, f64)> = available
        .iter()
        .map(|person| {
            let person_metrics = metrics.get(&person.id).unwrap_or(&fallback);
            let workload = loads
                .get(&person.id)
                .map_or(0.0, |load| load.workload as f64);
            let score = score_person(area, person_metrics, workload, context);
            (person, score.total)
        })
        .collect();
    // Stable sort: equal scores keep roster order.
    ranked.sort_by(|left, right| right.1.total_cmp(&left.1));

    let needed = usize::try_from(area.people_needed).unwrap_or(usize::MAX);
    ranked
        .into_iter()
        .take(needed)
        .map(|(person, _)| person.id.clone())
        .collect()
}

fn pick_verifiers(
    available: &[Person],
    responsibles: &[PersonId],
    metrics: &MetricsMap,
    count: usize,
) -> Vec<PersonId> {
    let outsiders: Vec<&Person> = available
        .iter()
        .filter(|person| !responsibles.contains(&person.id))
        .collect();
    let mut pool = if outsiders.len() < count {
        available.iter().collect()
    } else {
        outsiders
    };

    let rate = |person: &Person| {
        metrics
            .get(&person.id)
            .map_or(1.0, |entry| entry.completion_rate)
    };
    pool.sort_by(|left, right| rate(right).total_cmp(&rate(left)));
    pool.into_iter()
        .take(count)
        .map(|person| person.id.clone())
        .collect()
}
