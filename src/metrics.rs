//! Aggregated pipeline KPIs, computed on demand from the audit rows.

use serde::{Deserialize, Serialize};

/// One bucket in a grouped distribution (by sentiment, intent, or action).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub label: String,
    pub count: u64,
    /// Share of total messages, one decimal place.
    pub percentage: f64,
}

/// Per-client activity, for the top-clients table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientActivity {
    pub client_id: String,
    pub total: u64,
    pub negative_count: u64,
    pub sla_breached_count: u64,
}

/// Full metrics snapshot. Computed entirely from persisted rows — no
/// cached state, so it is always consistent with the audit store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_messages: u64,
    pub escalation_rate: f64,
    pub sla_breach_rate: f64,
    /// Share of escalated runs a human approved. Denominator is the
    /// escalated count, not total traffic.
    pub approval_rate: f64,
    pub pending_approvals: u64,
    pub sentiment_distribution: Vec<DistributionEntry>,
    pub intent_distribution: Vec<DistributionEntry>,
    pub action_distribution: Vec<DistributionEntry>,
    /// Top 10 clients by message volume.
    pub top_clients: Vec<ClientActivity>,
}

impl MetricsSummary {
    /// Summary over an empty store — every rate is 0.0 by definition.
    pub fn empty() -> Self {
        Self {
            total_messages: 0,
            escalation_rate: 0.0,
            sla_breach_rate: 0.0,
            approval_rate: 0.0,
            pending_approvals: 0,
            sentiment_distribution: Vec::new(),
            intent_distribution: Vec::new(),
            action_distribution: Vec::new(),
            top_clients: Vec::new(),
        }
    }
}

/// Percentage of `part` in `total`, rounded to one decimal place.
/// A zero denominator yields 0.0 — never an error or NaN.
pub fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}
