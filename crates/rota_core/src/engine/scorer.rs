//! Suitability score for one (person, area) pair.
//!
//! The score is a weighted sum of five unnormalized factors. Weights assume
//! the factors' typical magnitudes, so the raw formula must stay exactly as
//! written for plans to remain comparable with stored history.

use crate::engine::metrics::UserMetrics;
use crate::model::area::Area;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const RECENCY_WEIGHT: f64 = 0.2;
pub const FAMILIARITY_WEIGHT: f64 = 0.2;
pub const WORKLOAD_WEIGHT: f64 = 0.3;
pub const RELIABILITY_WEIGHT: f64 = 0.2;
pub const HISTORICAL_LOAD_WEIGHT: f64 = 0.1;

/// Days used when a person never did the area.
pub const NEVER_ASSIGNED_DAYS: f64 = 365.0;
const FAMILIARITY_BASE: f64 = 10.0;
const RELIABILITY_SCALE: f64 = 3.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Values shared by every score computed in one planning run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringContext {
    pub now: DateTime<Utc>,
    /// Fair workload share per available person.
    pub target_workload: f64,
    /// Largest `total_tasks` across the available pool.
    pub max_historical_tasks: u32,
}

/// Raw factors plus the weighted total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub recency: f64,
    pub familiarity: f64,
    pub workload_balance: f64,
    pub reliability: f64,
    pub historical_load: f64,
    pub total: f64,
}

/// Scores `metrics`' owner for `area` given their live cycle workload.
pub fn score_person(
    area: &Area,
    metrics: &UserMetrics,
    current_workload: f64,
    context: &ScoringContext,
) -> ScoreBreakdown {
    let recency = match metrics.last_assigned_to(&area.name) {
        Some(last) => (context.now - last).num_milliseconds() as f64 / MILLIS_PER_DAY,
        None => NEVER_ASSIGNED_DAYS,
    };
    let familiarity = FAMILIARITY_BASE - f64::from(metrics.times_assigned(&area.name));
    let workload_balance = context.target_workload - current_workload;
    let reliability = metrics.completion_rate * RELIABILITY_SCALE;
    let historical_load = if context.max_historical_tasks == 0 {
        1.0
    } else {
        1.0 - f64::from(metrics.total_tasks) / f64::from(context.max_historical_tasks)
    };

    let total = recency * RECENCY_WEIGHT
        + familiarity * FAMILIARITY_WEIGHT
        + workload_balance * WORKLOAD_WEIGHT
        + reliability * RELIABILITY_WEIGHT
        + historical_load * HISTORICAL_LOAD_WEIGHT;

    ScoreBreakdown {
        recency,
        familiarity,
        workload_balance,
        reliability,
        historical_load,
        total,
    }
}
