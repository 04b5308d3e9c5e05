//! Supervisor workflow — resolves escalated runs with a human decision.
//!
//! The decide flow is snapshot, delete, branch, amend. Deletion from the
//! pending queue is the commit point: of any number of concurrent
//! decisions for the same run, exactly one observes a deleted row and
//! proceeds; the rest fail with `UnknownRun`.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::capability::{Responder, responder::fallback_response};
use crate::error::{DatabaseError, Error, WorkflowError};
use crate::pipeline::types::{ProposedAction, Run, RunStatus};
use crate::store::{ApprovalStore, StatsStore};

/// A supervisor's verdict on a pending run.
#[derive(Debug, Clone, Deserialize)]
pub struct Decision {
    pub approved: bool,
    /// Supervisor-authored response text. Overrides the pre-generated
    /// suggestion when non-blank.
    #[serde(default)]
    pub manual_response: Option<String>,
    /// Free-form rejection reason, recorded in logs only.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Final state of a decided run.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub run: Run,
    pub status: RunStatus,
}

pub struct SupervisorWorkflow {
    approvals: Arc<dyn ApprovalStore>,
    stats: Arc<dyn StatsStore>,
    responder: Arc<dyn Responder>,
}

impl SupervisorWorkflow {
    pub fn new(
        approvals: Arc<dyn ApprovalStore>,
        stats: Arc<dyn StatsStore>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            approvals,
            stats,
            responder,
        }
    }

    /// All runs awaiting a decision, oldest first.
    pub async fn pending(&self) -> Result<Vec<Run>, Error> {
        Ok(self.approvals.list().await?)
    }

    /// Apply a supervisor decision to a pending run.
    ///
    /// Unknown or already-decided run ids fail with
    /// `WorkflowError::UnknownRun`. A decided run is terminal: a rejected
    /// run cannot be re-approved, and vice versa.
    pub async fn decide(&self, run_id: Uuid, decision: Decision) -> Result<DecisionOutcome, Error> {
        let Some(mut run) = self.approvals.get(run_id).await? else {
            return Err(WorkflowError::UnknownRun(run_id).into());
        };

        // Commit point. A concurrent decision that lost the race sees
        // `false` here and is rejected as if the run never existed.
        if !self.approvals.delete(run_id).await? {
            return Err(WorkflowError::UnknownRun(run_id).into());
        }

        let status = if decision.approved {
            run.human_approved = Some(true);
            run.execution_result = Some(self.resolve_response(&run, &decision).await);
            info!(run_id = %run_id, "Escalation approved and executed");
            RunStatus::ApprovedAndExecuted
        } else {
            run.human_approved = Some(false);
            if let Some(reason) = decision.reason.as_deref() {
                info!(run_id = %run_id, reason, "Escalation rejected");
            } else {
                info!(run_id = %run_id, "Escalation rejected");
            }
            RunStatus::Rejected
        };

        self.amend_stats(run_id, decision.approved).await?;

        Ok(DecisionOutcome { run, status })
    }

    /// Response text for an approved run, in priority order: the
    /// supervisor's manual text, the pre-generated suggestion, a fresh
    /// draft, the static fallback.
    async fn resolve_response(&self, run: &Run, decision: &Decision) -> String {
        if let Some(manual) = decision.manual_response.as_deref() {
            let trimmed = manual.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }

        if let Some(suggested) = run.suggested_response.as_deref() {
            if !suggested.trim().is_empty() {
                return suggested.to_string();
            }
        }

        match self
            .responder
            .draft_response(ProposedAction::EscalateToHuman, &run.message)
            .await
        {
            Ok(draft) if !draft.trim().is_empty() => draft,
            Ok(_) => fallback_response(ProposedAction::EscalateToHuman).to_string(),
            Err(e) => {
                warn!(
                    run_id = %run.run_id,
                    error = %e,
                    "Response drafting failed, using static fallback"
                );
                fallback_response(ProposedAction::EscalateToHuman).to_string()
            }
        }
    }

    /// Amend the audit row. A missing amendable row means the two stores
    /// disagree about this run, which must surface rather than pass
    /// silently.
    async fn amend_stats(&self, run_id: Uuid, approved: bool) -> Result<(), Error> {
        match self.stats.amend(run_id, approved).await {
            Ok(()) => Ok(()),
            Err(DatabaseError::NotFound { .. }) => {
                error!(
                    run_id = %run_id,
                    "Run was pending in the approval queue but has no amendable audit row"
                );
                Err(WorkflowError::StatsInconsistency {
                    run_id,
                    detail: "no amendable audit row for decided run".into(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
