use std::sync::Arc;

use crm_triage::api::{AppState, app_routes};
use crm_triage::capability::{LlmConfig, create_capabilities};
use crm_triage::config::EngineConfig;
use crm_triage::pipeline::PipelineEngine;
use crm_triage::store::LibSqlBackend;
use crm_triage::supervisor::SupervisorWorkflow;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Read API key from environment
    let api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: OPENROUTER_API_KEY not set");
        eprintln!("  export OPENROUTER_API_KEY=sk-or-...");
        std::process::exit(1);
    });

    let model = std::env::var("CRM_TRIAGE_MODEL")
        .unwrap_or_else(|_| "google/gemini-2.0-flash-001".to_string());

    let base_url = std::env::var("CRM_TRIAGE_LLM_BASE_URL")
        .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string());

    let port: u16 = std::env::var("CRM_TRIAGE_PORT")
        .unwrap_or_else(|_| "8000".to_string())
        .parse()
        .unwrap_or(8000);

    let sla_threshold_hours: f64 = std::env::var("CRM_TRIAGE_SLA_THRESHOLD_HOURS")
        .unwrap_or_else(|_| "2.0".to_string())
        .parse()
        .unwrap_or(2.0);

    let engine_config = EngineConfig {
        sla_threshold_hours,
    };
    engine_config.validate()?;

    eprintln!("📬 CRM Triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   SLA threshold: {}h", sla_threshold_hours);
    eprintln!("   Webhook: http://0.0.0.0:{}/api/v1/webhook/messages", port);
    eprintln!("   Supervisor: http://0.0.0.0:{}/api/v1/supervisor/pending", port);
    eprintln!("   Metrics: http://0.0.0.0:{}/api/v1/metrics/summary\n", port);

    // ── Database ─────────────────────────────────────────────────────────
    let db_path =
        std::env::var("CRM_TRIAGE_DB_PATH").unwrap_or_else(|_| "./data/crm-triage.db".to_string());

    let store = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", db_path, e);
                std::process::exit(1);
            }),
    );

    // ── Capabilities ─────────────────────────────────────────────────────
    let llm_config = LlmConfig {
        api_key: secrecy::SecretString::from(api_key),
        model,
        base_url,
    };
    let (classifier, responder) = create_capabilities(&llm_config);

    // ── Wiring ───────────────────────────────────────────────────────────
    let engine = Arc::new(PipelineEngine::new(
        classifier,
        responder.clone(),
        store.clone(),
        store.clone(),
        engine_config,
    ));
    let supervisor = Arc::new(SupervisorWorkflow::new(
        store.clone(),
        store.clone(),
        responder,
    ));

    let app = app_routes(AppState {
        engine,
        supervisor,
        stats: store,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "CRM triage server started");
    axum::serve(listener, app).await?;

    Ok(())
}
