//! External capabilities — classification and generation.
//!
//! Both are opaque, fail-open collaborators: the pipeline consumes them
//! through narrow traits and applies its own fallback policy when a call
//! fails. The production implementations talk to an OpenAI-compatible
//! chat-completions endpoint over HTTP.

mod chat;
pub mod classifier;
pub mod responder;

use std::sync::Arc;

use async_trait::async_trait;

pub use chat::ChatApi;
pub use classifier::LlmClassifier;
pub use responder::LlmResponder;

use crate::error::CapabilityError;
use crate::pipeline::types::{EscalationReason, Intent, ProposedAction, Sentiment};

/// Result of one classification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub intent: Intent,
}

/// Classification capability — sentiment and intent for a message.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, message: &str) -> Result<Classification, CapabilityError>;
}

/// Generation capability — drafts client-facing text.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Draft the response delivered for an action.
    async fn draft_response(
        &self,
        action: ProposedAction,
        message: &str,
    ) -> Result<String, CapabilityError>;

    /// Draft a short supervisor-facing justification for an escalation.
    async fn draft_supervisor_note(
        &self,
        reason: &EscalationReason,
        message: &str,
    ) -> Result<String, CapabilityError>;
}

/// Configuration for the LLM-backed capability implementations.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Base URL of an OpenAI-compatible API, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: String,
}

/// Build the production classifier and responder sharing one HTTP client.
pub fn create_capabilities(config: &LlmConfig) -> (Arc<dyn Classifier>, Arc<dyn Responder>) {
    let api = ChatApi::new(config);
    (
        Arc::new(LlmClassifier::new(api.clone())),
        Arc::new(LlmResponder::new(api)),
    )
}
