//! Domain model for the chore rotation engine.
//!
//! # Responsibility
//! - Define the records the engine reads (people, areas) and mutates (tasks).
//! - Keep embedded child records (votes, swap requests) owned by their task.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId` that is never reused.
//! - Areas are static configuration; the engine never mutates them.

pub mod area;
pub mod person;
pub mod task;
