//! Pipeline engine — runs the fixed stage sequence for one request.
//!
//! Flow:
//! 1. Classify (capability, fail-open to neutral defaults)
//! 2. SLA check (fail-open on malformed timestamps)
//! 3. Decision matrix (pure, first match wins)
//! 4. Branch: escalate to the pending queue, or auto-execute
//! 5. Audit row
//!
//! Capability failures degrade the stage's output and never abort the
//! pipeline. The only fatal failures are store failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::capability::{Classifier, Responder, responder::fallback_response};
use crate::config::EngineConfig;
use crate::error::Error;
use crate::pipeline::types::{
    EscalationReason, Intent, ProposedAction, Run, RunOutcome, RunStatus, Sentiment,
};
use crate::store::{ApprovalStore, StatsStore};

/// Stateless, re-entrant pipeline engine. Constructed once at process
/// start and shared read-only across concurrent invocations; all
/// per-run state lives on the handling request's stack.
pub struct PipelineEngine {
    classifier: Arc<dyn Classifier>,
    responder: Arc<dyn Responder>,
    approvals: Arc<dyn ApprovalStore>,
    stats: Arc<dyn StatsStore>,
    config: EngineConfig,
}

impl PipelineEngine {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        responder: Arc<dyn Responder>,
        approvals: Arc<dyn ApprovalStore>,
        stats: Arc<dyn StatsStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            classifier,
            responder,
            approvals,
            stats,
            config,
        }
    }

    /// Run one message through the full pipeline.
    ///
    /// Returns `Processed` or `PendingApproval`; store failures are the
    /// only errors that propagate.
    pub async fn execute(
        &self,
        client_id: &str,
        message: &str,
        received_at: &str,
    ) -> Result<RunOutcome, Error> {
        let mut run = Run::new(client_id, message, received_at);

        info!(
            run_id = %run.run_id,
            client_id = %run.client_id,
            "Processing inbound message"
        );

        // Stage 1: classify. Failure must never block the pipeline —
        // fall back to neutral defaults and proceed.
        match self.classifier.classify(message).await {
            Ok(classification) => {
                run.sentiment = classification.sentiment;
                run.intent = classification.intent;
            }
            Err(e) => {
                warn!(
                    run_id = %run.run_id,
                    error = %e,
                    "Classification failed, falling back to neutral defaults"
                );
            }
        }

        // Stage 2: SLA check, fail-open on malformed timestamps.
        run.sla_breached = check_sla(received_at, Utc::now(), self.config.sla_threshold_hours);

        // Stage 3: routing decision.
        run.proposed_action = decide(run.sla_breached, run.sentiment, run.intent);

        info!(
            run_id = %run.run_id,
            sentiment = run.sentiment.as_str(),
            intent = run.intent.as_str(),
            sla_breached = run.sla_breached,
            proposed_action = run.proposed_action.as_str(),
            "Triage decision"
        );

        // Stage 4: branch.
        let status = if run.proposed_action == ProposedAction::EscalateToHuman {
            self.escalate(&mut run).await?;
            RunStatus::PendingApproval
        } else {
            self.auto_execute(&mut run).await;
            RunStatus::Processed
        };

        // Stage 5: exactly one audit row per run, mirroring the status.
        self.stats.record(&run, status).await?;

        Ok(RunOutcome { run, status })
    }

    /// Escalation branch: best-effort supervisor note and suggested
    /// response, then hand the run to the pending queue.
    ///
    /// Both generation calls finish before the store write so no
    /// capability call ever overlaps a store operation.
    async fn escalate(&self, run: &mut Run) -> Result<(), Error> {
        let reason = EscalationReason {
            sla_breached: run.sla_breached,
            negative_sentiment: run.sentiment == Sentiment::Negative,
        };

        match self
            .responder
            .draft_supervisor_note(&reason, &run.message)
            .await
        {
            Ok(note) if !note.trim().is_empty() => run.supervisor_note = Some(note),
            Ok(_) => {}
            Err(e) => {
                warn!(
                    run_id = %run.run_id,
                    error = %e,
                    "Supervisor note drafting failed, leaving note unset"
                );
            }
        }

        match self
            .responder
            .draft_response(ProposedAction::SendStandardResponse, &run.message)
            .await
        {
            Ok(draft) if !draft.trim().is_empty() => run.suggested_response = Some(draft),
            Ok(_) => {}
            Err(e) => {
                warn!(
                    run_id = %run.run_id,
                    error = %e,
                    "Suggested response drafting failed, leaving suggestion unset"
                );
            }
        }

        self.approvals.save(run).await?;
        info!(run_id = %run.run_id, "Run escalated, awaiting supervisor decision");
        Ok(())
    }

    /// Auto-execute branch: draft the client response, with the
    /// deterministic static fallback when the capability fails.
    async fn auto_execute(&self, run: &mut Run) {
        let text = match self
            .responder
            .draft_response(run.proposed_action, &run.message)
            .await
        {
            Ok(draft) if !draft.trim().is_empty() => draft,
            Ok(_) => fallback_response(run.proposed_action).to_string(),
            Err(e) => {
                warn!(
                    run_id = %run.run_id,
                    error = %e,
                    action = run.proposed_action.as_str(),
                    "Response drafting failed, using static fallback"
                );
                fallback_response(run.proposed_action).to_string()
            }
        };
        run.execution_result = Some(text);
    }
}

// ── Decision matrix ─────────────────────────────────────────────────

/// Routing decision, evaluated in strict priority order — first match
/// wins: escalation over refund over standard response.
pub fn decide(sla_breached: bool, sentiment: Sentiment, intent: Intent) -> ProposedAction {
    if sla_breached || sentiment == Sentiment::Negative {
        ProposedAction::EscalateToHuman
    } else if intent == Intent::RefundRequest {
        ProposedAction::ProcessRefund
    } else {
        ProposedAction::SendStandardResponse
    }
}

// ── SLA check ───────────────────────────────────────────────────────

/// Whether the message has aged past the SLA threshold.
///
/// Fail-open: a timestamp that cannot be parsed never counts as a
/// breach. Future-dated timestamps do not breach either.
pub fn check_sla(received_at: &str, now: DateTime<Utc>, threshold_hours: f64) -> bool {
    let Some(received) = parse_received_at(received_at) else {
        return false;
    };
    let elapsed_hours = (now - received).num_milliseconds() as f64 / 3_600_000.0;
    elapsed_hours > threshold_hours
}

/// Parse an inbound timestamp: RFC 3339, or naive ISO 8601 assumed UTC.
fn parse_received_at(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return Some(ndt.and_utc());
        }
    }
    None
}
