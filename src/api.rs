//! REST endpoints — webhook ingestion, supervisor queue, metrics.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;
use uuid::Uuid;

use crate::error::Error;
use crate::pipeline::engine::PipelineEngine;
use crate::pipeline::types::{Run, RunStatus};
use crate::store::StatsStore;
use crate::supervisor::{Decision, SupervisorWorkflow};

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PipelineEngine>,
    pub supervisor: Arc<SupervisorWorkflow>,
    pub stats: Arc<dyn StatsStore>,
}

/// Inbound CRM webhook payload.
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub client_id: String,
    pub message: String,
    pub received_at: String,
}

/// Outcome of a pipeline run or a supervisor decision, as seen by the
/// caller. Both the webhook and the decide endpoint answer with this
/// shape; only the `message` text differs.
#[derive(Debug, Serialize)]
pub struct ProcessingResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub sentiment: String,
    pub intent: String,
    pub sla_breached: bool,
    pub proposed_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<String>,
    /// Human-readable summary of what happened and what to do next.
    pub message: String,
}

impl ProcessingResponse {
    fn from_run(run: Run, status: RunStatus, message: String) -> Self {
        Self {
            run_id: run.run_id,
            status,
            sentiment: run.sentiment.as_str().to_string(),
            intent: run.intent.as_str().to_string(),
            sla_breached: run.sla_breached,
            proposed_action: run.proposed_action.as_str().to_string(),
            supervisor_note: run.supervisor_note,
            execution_result: run.execution_result,
            message,
        }
    }
}

/// One entry in the supervisor's pending queue.
#[derive(Debug, Serialize)]
pub struct PendingItem {
    pub run_id: Uuid,
    pub client_id: String,
    pub message: String,
    pub received_at: String,
    pub sentiment: String,
    pub intent: String,
    pub sla_breached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_response: Option<String>,
    pub created_at: String,
}

impl From<Run> for PendingItem {
    fn from(run: Run) -> Self {
        Self {
            run_id: run.run_id,
            client_id: run.client_id,
            message: run.message,
            received_at: run.received_at,
            sentiment: run.sentiment.as_str().to_string(),
            intent: run.intent.as_str().to_string(),
            sla_breached: run.sla_breached,
            supervisor_note: run.supervisor_note,
            suggested_response: run.suggested_response,
            created_at: run.created_at.to_rfc3339(),
        }
    }
}

/// Pending-queue listing, oldest first.
#[derive(Debug, Serialize)]
pub struct PendingListResponse {
    pub count: usize,
    pub pending: Vec<PendingItem>,
}

/// Supervisor decision request.
#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub decision: Decision,
}

/// POST /api/v1/webhook/messages
///
/// Runs the triage pipeline on one inbound message. Blank `client_id`
/// or `message` is rejected with 422 before the pipeline starts.
async fn ingest_message(
    State(state): State<AppState>,
    Json(payload): Json<WebhookMessage>,
) -> impl IntoResponse {
    if payload.client_id.trim().is_empty() || payload.message.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "client_id and message must be non-empty"})),
        )
            .into_response();
    }

    match state
        .engine
        .execute(&payload.client_id, &payload.message, &payload.received_at)
        .await
    {
        Ok(outcome) => {
            let message = match outcome.status {
                RunStatus::PendingApproval => format!(
                    "Message from client '{}' requires human approval before any action \
                     is taken. Use run_id to decide via POST /api/v1/supervisor/decide.",
                    outcome.run.client_id
                ),
                _ => format!(
                    "Message from client '{}' processed automatically. Action executed: {}.",
                    outcome.run.client_id,
                    outcome.run.proposed_action.as_str()
                ),
            };
            Json(ProcessingResponse::from_run(outcome.run, outcome.status, message))
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/supervisor/pending
async fn list_pending(State(state): State<AppState>) -> impl IntoResponse {
    match state.supervisor.pending().await {
        Ok(runs) => {
            let pending: Vec<PendingItem> = runs.into_iter().map(PendingItem::from).collect();
            Json(PendingListResponse {
                count: pending.len(),
                pending,
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/supervisor/decide
async fn decide(
    State(state): State<AppState>,
    Json(payload): Json<DecideRequest>,
) -> impl IntoResponse {
    match state.supervisor.decide(payload.run_id, payload.decision).await {
        Ok(outcome) => {
            let message = match outcome.status {
                RunStatus::ApprovedAndExecuted => format!(
                    "Action approved and executed for client '{}'.",
                    outcome.run.client_id
                ),
                _ => format!(
                    "Action rejected by supervisor for client '{}'. No response was sent.",
                    outcome.run.client_id
                ),
            };
            Json(ProcessingResponse::from_run(outcome.run, outcome.status, message))
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/metrics/summary
async fn metrics_summary(State(state): State<AppState>) -> impl IntoResponse {
    match state.stats.summarize().await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => error_response(Error::Database(e)),
    }
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /
async fn index() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "crm-triage",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn error_response(err: Error) -> axum::response::Response {
    use crate::error::WorkflowError;

    let (status, message) = match &err {
        Error::Workflow(WorkflowError::UnknownRun(run_id)) => (
            StatusCode::NOT_FOUND,
            format!("no pending approval found for run {run_id}"),
        ),
        _ => {
            error!(error = %err, "Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

/// Build the full application router.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/v1/webhook/messages", post(ingest_message))
        .route("/api/v1/supervisor/pending", get(list_pending))
        .route("/api/v1/supervisor/decide", post(decide))
        .route("/api/v1/metrics/summary", get(metrics_summary))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::capability::{Classification, Classifier, Responder};
    use crate::config::EngineConfig;
    use crate::error::CapabilityError;
    use crate::pipeline::types::{EscalationReason, Intent, ProposedAction, Sentiment};
    use crate::store::LibSqlBackend;

    struct FixedClassifier {
        sentiment: Sentiment,
        intent: Intent,
    }

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(&self, _message: &str) -> Result<Classification, CapabilityError> {
            Ok(Classification {
                sentiment: self.sentiment,
                intent: self.intent,
            })
        }
    }

    struct FixedResponder;

    #[async_trait]
    impl Responder for FixedResponder {
        async fn draft_response(
            &self,
            _action: ProposedAction,
            _message: &str,
        ) -> Result<String, CapabilityError> {
            Ok("stub response".into())
        }

        async fn draft_supervisor_note(
            &self,
            _reason: &EscalationReason,
            _message: &str,
        ) -> Result<String, CapabilityError> {
            Ok("stub note".into())
        }
    }

    async fn test_app(sentiment: Sentiment, intent: Intent) -> Router {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let responder: Arc<dyn Responder> = Arc::new(FixedResponder);
        let engine = Arc::new(PipelineEngine::new(
            Arc::new(FixedClassifier { sentiment, intent }),
            responder.clone(),
            store.clone(),
            store.clone(),
            EngineConfig::default(),
        ));
        let supervisor = Arc::new(SupervisorWorkflow::new(
            store.clone(),
            store.clone(),
            responder,
        ));
        app_routes(AppState {
            engine,
            supervisor,
            stats: store,
        })
    }

    fn post_json(uri: &str, body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn webhook_processes_a_routine_message() {
        let app = test_app(Sentiment::Neutral, Intent::GeneralInquiry).await;

        let response = app
            .oneshot(post_json(
                "/api/v1/webhook/messages",
                serde_json::json!({
                    "client_id": "acme",
                    "message": "What are your hours?",
                    "received_at": chrono::Utc::now().to_rfc3339(),
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "processed");
        assert_eq!(body["proposed_action"], "send_standard_response");
        assert_eq!(body["execution_result"], "stub response");
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("processed automatically"));
        assert!(message.contains("acme"));
    }

    #[tokio::test]
    async fn escalation_response_tells_caller_how_to_decide() {
        let app = test_app(Sentiment::Negative, Intent::SupportRequest).await;

        let response = app
            .oneshot(post_json(
                "/api/v1/webhook/messages",
                serde_json::json!({
                    "client_id": "acme",
                    "message": "Everything is on fire",
                    "received_at": chrono::Utc::now().to_rfc3339(),
                }),
            ))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["status"], "pending_approval");
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("requires human approval"));
        assert!(message.contains("/api/v1/supervisor/decide"));
    }

    #[tokio::test]
    async fn decide_response_carries_full_run_context() {
        let app = test_app(Sentiment::Negative, Intent::SupportRequest).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/webhook/messages",
                serde_json::json!({
                    "client_id": "acme",
                    "message": "Still broken after three tickets",
                    "received_at": chrono::Utc::now().to_rfc3339(),
                }),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        let run_id = body["run_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/supervisor/decide",
                serde_json::json!({"run_id": run_id, "approved": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;

        // Same shape as the webhook response, filled from the decided run.
        assert_eq!(body["run_id"], run_id.as_str());
        assert_eq!(body["status"], "approved_and_executed");
        assert_eq!(body["sentiment"], "negative");
        assert_eq!(body["intent"], "support_request");
        assert_eq!(body["sla_breached"], false);
        assert_eq!(body["proposed_action"], "escalate_to_human");
        assert!(body["supervisor_note"].is_string());
        assert!(body["execution_result"].is_string());
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("approved and executed"));
        assert!(message.contains("acme"));
    }

    #[tokio::test]
    async fn rejection_response_reports_no_execution() {
        let app = test_app(Sentiment::Negative, Intent::GeneralInquiry).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/webhook/messages",
                serde_json::json!({
                    "client_id": "globex",
                    "message": "Not happy at all",
                    "received_at": chrono::Utc::now().to_rfc3339(),
                }),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        let run_id = body["run_id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(post_json(
                "/api/v1/supervisor/decide",
                serde_json::json!({"run_id": run_id, "approved": false, "reason": "duplicate"}),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;

        assert_eq!(body["status"], "rejected");
        assert!(body["execution_result"].is_null());
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("rejected"));
    }

    #[tokio::test]
    async fn webhook_rejects_blank_fields() {
        let app = test_app(Sentiment::Neutral, Intent::GeneralInquiry).await;

        let response = app
            .oneshot(post_json(
                "/api/v1/webhook/messages",
                serde_json::json!({
                    "client_id": "  ",
                    "message": "hello",
                    "received_at": "2026-01-01T00:00:00Z",
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn escalation_appears_in_pending_and_resolves_via_decide() {
        let app = test_app(Sentiment::Negative, Intent::SupportRequest).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/webhook/messages",
                serde_json::json!({
                    "client_id": "acme",
                    "message": "This is unacceptable",
                    "received_at": chrono::Utc::now().to_rfc3339(),
                }),
            ))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["status"], "pending_approval");
        let run_id = body["run_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get_req("/api/v1/supervisor/pending"))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["pending"][0]["run_id"], run_id.as_str());

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/supervisor/decide",
                serde_json::json!({"run_id": run_id, "approved": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "approved_and_executed");

        let response = app
            .oneshot(get_req("/api/v1/supervisor/pending"))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn decide_on_unknown_run_returns_404() {
        let app = test_app(Sentiment::Neutral, Intent::GeneralInquiry).await;

        let response = app
            .oneshot(post_json(
                "/api/v1/supervisor/decide",
                serde_json::json!({"run_id": Uuid::new_v4(), "approved": false}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_summary_reports_totals() {
        let app = test_app(Sentiment::Neutral, Intent::RefundRequest).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/webhook/messages",
                serde_json::json!({
                    "client_id": "acme",
                    "message": "refund order 42 please",
                    "received_at": chrono::Utc::now().to_rfc3339(),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_req("/api/v1/metrics/summary")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["total_messages"], 1);
        assert_eq!(body["pending_approvals"], 0);
        assert_eq!(body["action_distribution"][0]["label"], "process_refund");
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let app = test_app(Sentiment::Neutral, Intent::GeneralInquiry).await;
        let response = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
