//! Store traits — the only seams through which the pipeline and the
//! supervisor workflow touch persistence.
//!
//! Both traits assume atomic, isolated single-row operations from the
//! backend; no application-level locking is layered on top.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::metrics::MetricsSummary;
use crate::pipeline::types::{Run, RunStatus};

/// Persistent queue of escalated runs awaiting a human decision.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Persist an escalated run. Called at most once per `run_id`; a
    /// duplicate save is a programming error and fails with `Constraint`.
    async fn save(&self, run: &Run) -> Result<(), DatabaseError>;

    /// Point lookup by run id.
    async fn get(&self, run_id: Uuid) -> Result<Option<Run>, DatabaseError>;

    /// Delete a pending run. Idempotent — deleting a missing key is not
    /// an error. Returns whether a row was actually removed, which lets
    /// the supervisor workflow implement first-deleter-wins.
    async fn delete(&self, run_id: Uuid) -> Result<bool, DatabaseError>;

    /// All pending runs, oldest first. Supervisors see the
    /// longest-waiting case first — a fairness guarantee.
    async fn list(&self) -> Result<Vec<Run>, DatabaseError>;
}

/// Append-then-amend audit store with on-demand aggregation.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Insert the audit row for a run. Called exactly once, at pipeline
    /// completion. `final_status` is `Processed` or `PendingApproval`.
    async fn record(&self, run: &Run, final_status: RunStatus) -> Result<(), DatabaseError>;

    /// Amend an escalated run's row with the human decision. Fails with
    /// `NotFound` when no amendable row exists — that is a consistency
    /// error between the two stores and must be surfaced by the caller.
    async fn amend(&self, run_id: Uuid, approved: bool) -> Result<(), DatabaseError>;

    /// Aggregate KPIs over all audit rows.
    async fn summarize(&self) -> Result<MetricsSummary, DatabaseError>;
}
