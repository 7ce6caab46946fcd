//! Operational-question router.
//!
//! Classifies a question, resolves follow-ups, picks a task with
//! priority-ordered rules and builds the query for structured questions.
//! An optional external model assists behind a retry policy and a circuit
//! breaker; every model path has a deterministic fallback.

pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod resilience;
pub mod routes;
pub mod state;
