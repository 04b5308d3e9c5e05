//! Triage pipeline — classify, decide, act.

pub mod engine;
pub mod types;

pub use engine::PipelineEngine;
pub use types::{
    EscalationReason, Intent, ProposedAction, Run, RunOutcome, RunStatus, Sentiment,
};
