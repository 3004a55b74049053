//! Rotation & assignment engine.
//!
//! # Responsibility
//! - Reduce task history into per-person metrics and score candidates.
//! - Plan a full rotation (responsibles + verifiers) for every area.
//! - Drive the swap negotiation and verification state machines.
//!
//! # Invariants
//! - Every function here is pure over its inputs (plus the caller's `now`);
//!   persistence and serialization of writes belong to `repo`/`service`.
//! - Transitions return updated copies; callers persist them with a
//!   version check so concurrent writers cannot both succeed.

pub mod error;
pub mod metrics;
pub mod planner;
pub mod scorer;
pub mod swap;
pub mod verification;

pub use error::{EngineError, EngineResult, ErrorKind};
pub use metrics::{build_metrics, MetricsMap, UserMetrics};
pub use planner::{plan_rotation, plan_rotation_with, CycleLoad, PlannerSettings, RotationPlan};
pub use scorer::{score_person, ScoreBreakdown, ScoringContext};
pub use swap::{
    direct_swap, request_swap, respond_to_swap, set_temporary_responsible, SwapResolution,
    DEFAULT_MAX_PENDING_SWAP_REQUESTS,
};
pub use verification::{
    cast_vote, is_archive_eligible, resolve_status, set_completion, VoteTally,
};
