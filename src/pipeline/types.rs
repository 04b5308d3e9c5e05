//! Shared types for the triage pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Classification labels ───────────────────────────────────────────

/// Sentiment of an inbound client message. Closed set — the classifier
/// contract admits no other values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// DB / wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    /// Parse a label. Unknown values are rejected — the capability layer
    /// treats them as a malformed response.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// Intent of an inbound client message. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RefundRequest,
    SupportRequest,
    GeneralInquiry,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RefundRequest => "refund_request",
            Self::SupportRequest => "support_request",
            Self::GeneralInquiry => "general_inquiry",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "refund_request" => Some(Self::RefundRequest),
            "support_request" => Some(Self::SupportRequest),
            "general_inquiry" => Some(Self::GeneralInquiry),
            _ => None,
        }
    }
}

// ── Routing decision ────────────────────────────────────────────────

/// Action proposed by the decision matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposedAction {
    SendStandardResponse,
    ProcessRefund,
    EscalateToHuman,
}

impl ProposedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendStandardResponse => "send_standard_response",
            Self::ProcessRefund => "process_refund",
            Self::EscalateToHuman => "escalate_to_human",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "send_standard_response" => Some(Self::SendStandardResponse),
            "process_refund" => Some(Self::ProcessRefund),
            "escalate_to_human" => Some(Self::EscalateToHuman),
            _ => None,
        }
    }
}

// ── Run lifecycle status ────────────────────────────────────────────

/// Final status of a run as recorded in the audit store.
///
/// `Processed` and `PendingApproval` are the two pipeline outcomes;
/// `ApprovedAndExecuted` and `Rejected` are the terminal amendments a
/// supervisor decision applies to an escalated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Processed,
    PendingApproval,
    ApprovedAndExecuted,
    Rejected,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::PendingApproval => "pending_approval",
            Self::ApprovedAndExecuted => "approved_and_executed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "pending_approval" => Some(Self::PendingApproval),
            "approved_and_executed" => Some(Self::ApprovedAndExecuted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

// ── Run ─────────────────────────────────────────────────────────────

/// One message's journey through the pipeline.
///
/// Owned by the in-flight request handler until it either completes or
/// is handed to the approval store. `received_at` is kept as the raw
/// transport string — the SLA stage owns parsing it, and a malformed
/// value must degrade to "not breached" rather than reject the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Uuid,
    pub client_id: String,
    pub message: String,
    /// Timestamp of the original client request (not processing time).
    pub received_at: String,
    pub sentiment: Sentiment,
    pub intent: Intent,
    pub sla_breached: bool,
    pub proposed_action: ProposedAction,
    /// Short justification for the supervisor. Set only on escalation,
    /// and only when the generation capability produced one.
    pub supervisor_note: Option<String>,
    /// Pre-drafted reply a supervisor may accept verbatim. Set only on
    /// escalation, best effort.
    pub suggested_response: Option<String>,
    /// Unset until a human decides, then set exactly once.
    pub human_approved: Option<bool>,
    /// Final delivered text. Set exactly once, automatically or after
    /// human approval.
    pub execution_result: Option<String>,
    /// When the run entered the pipeline (processing time).
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// Build a fresh run at ingestion, before any stage has run.
    pub fn new(client_id: &str, message: &str, received_at: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            message: message.to_string(),
            received_at: received_at.to_string(),
            sentiment: Sentiment::Neutral,
            intent: Intent::GeneralInquiry,
            sla_breached: false,
            proposed_action: ProposedAction::SendStandardResponse,
            supervisor_note: None,
            suggested_response: None,
            human_approved: None,
            execution_result: None,
            created_at: Utc::now(),
        }
    }
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run: Run,
    /// Either `Processed` or `PendingApproval`.
    pub status: RunStatus,
}

// ── Escalation reason ───────────────────────────────────────────────

/// Which condition(s) of the decision matrix triggered an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationReason {
    pub sla_breached: bool,
    pub negative_sentiment: bool,
}

impl EscalationReason {
    /// Deterministic one-line description used to seed the supervisor note.
    pub fn describe(&self) -> &'static str {
        match (self.negative_sentiment, self.sla_breached) {
            (true, true) => "negative sentiment and response-time SLA breach",
            (true, false) => "negative sentiment",
            (false, true) => "response-time SLA breach",
            // Unreachable through the decision matrix, kept total.
            (false, false) => "manual review requested",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for s in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
            assert_eq!(Sentiment::parse(s.as_str()), Some(s));
        }
        for i in [
            Intent::RefundRequest,
            Intent::SupportRequest,
            Intent::GeneralInquiry,
        ] {
            assert_eq!(Intent::parse(i.as_str()), Some(i));
        }
        for a in [
            ProposedAction::SendStandardResponse,
            ProposedAction::ProcessRefund,
            ProposedAction::EscalateToHuman,
        ] {
            assert_eq!(ProposedAction::parse(a.as_str()), Some(a));
        }
        for st in [
            RunStatus::Processed,
            RunStatus::PendingApproval,
            RunStatus::ApprovedAndExecuted,
            RunStatus::Rejected,
        ] {
            assert_eq!(RunStatus::parse(st.as_str()), Some(st));
        }
    }

    #[test]
    fn unknown_labels_rejected() {
        assert_eq!(Sentiment::parse("angry"), None);
        assert_eq!(Intent::parse("billing"), None);
        assert_eq!(ProposedAction::parse("escalate"), None);
        assert_eq!(RunStatus::parse("done"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_value(Sentiment::Negative).unwrap();
        assert_eq!(json, "negative");
        let json = serde_json::to_value(ProposedAction::EscalateToHuman).unwrap();
        assert_eq!(json, "escalate_to_human");
        let json = serde_json::to_value(RunStatus::ApprovedAndExecuted).unwrap();
        assert_eq!(json, "approved_and_executed");
    }

    #[test]
    fn new_run_has_neutral_defaults() {
        let run = Run::new("acme", "hello", "2025-01-01T00:00:00Z");
        assert_eq!(run.sentiment, Sentiment::Neutral);
        assert_eq!(run.intent, Intent::GeneralInquiry);
        assert!(!run.sla_breached);
        assert!(run.human_approved.is_none());
        assert!(run.execution_result.is_none());
    }

    #[test]
    fn escalation_reason_describes_triggers() {
        let both = EscalationReason {
            sla_breached: true,
            negative_sentiment: true,
        };
        assert!(both.describe().contains("negative sentiment"));
        assert!(both.describe().contains("SLA"));

        let sla_only = EscalationReason {
            sla_breached: true,
            negative_sentiment: false,
        };
        assert!(!sla_only.describe().contains("sentiment"));
    }
}
