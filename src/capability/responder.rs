//! LLM-backed response drafting.
//!
//! Drafts client-facing responses for the auto-executed actions and
//! short supervisor notes for escalations. The caller (pipeline engine
//! or supervisor workflow) decides what happens when a draft fails.

use async_trait::async_trait;
use tracing::debug;

use crate::error::CapabilityError;
use crate::pipeline::types::{EscalationReason, ProposedAction};

use super::chat::ChatApi;
use super::Responder;

/// Slightly higher temperature for natural, varied phrasing.
const DRAFT_TEMPERATURE: f32 = 0.3;

/// Supervisor notes should be terse and consistent.
const NOTE_TEMPERATURE: f32 = 0.1;

/// LLM responder over a chat-completions API.
pub struct LlmResponder {
    api: ChatApi,
}

impl LlmResponder {
    pub fn new(api: ChatApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn draft_response(
        &self,
        action: ProposedAction,
        message: &str,
    ) -> Result<String, CapabilityError> {
        let system = response_system_prompt(action);
        let user = format!("Client message: {message}");
        let draft = self.api.complete(&system, &user, DRAFT_TEMPERATURE).await?;
        debug!(action = action.as_str(), "Response drafted");
        Ok(draft.trim().to_string())
    }

    async fn draft_supervisor_note(
        &self,
        reason: &EscalationReason,
        message: &str,
    ) -> Result<String, CapabilityError> {
        let user = format!(
            "Escalation trigger: {}.\nClient message: {}",
            reason.describe(),
            message
        );
        let note = self
            .api
            .complete(NOTE_SYSTEM_PROMPT, &user, NOTE_TEMPERATURE)
            .await?;
        Ok(note.trim().to_string())
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Content instruction per action — tells the LLM WHAT to communicate.
fn action_context(action: ProposedAction) -> &'static str {
    match action {
        ProposedAction::ProcessRefund => {
            "Confirm that the refund request has been accepted and is being processed. \
             Specify that the client will receive a confirmation by email and that funds \
             are returned within 3 to 5 business days."
        }
        // Standard acknowledgement also covers escalated runs when a
        // supervisor asks for a last-resort draft.
        ProposedAction::SendStandardResponse | ProposedAction::EscalateToHuman => {
            "Acknowledge receipt of the client's message, confirm the team is reviewing \
             the case, and assure the client they will receive a follow-up."
        }
    }
}

/// Build the full response system prompt for an action.
fn response_system_prompt(action: ProposedAction) -> String {
    format!(
        "You are a professional CRM response specialist for an enterprise company.\n\
         \n\
         Your task: write one client-facing response message.\n\
         \n\
         STYLE RULES (mandatory):\n\
         1. Detect the language of the client's message and respond in that exact \
         language (English or Spanish). Do not mix languages.\n\
         2. Tone: professional, empathetic, and solution-focused. Never robotic or distant.\n\
         3. Length: 2 to 4 sentences. No more.\n\
         4. Do NOT open with generic filler such as \"We value your business\" or \
         \"Thank you for contacting us\".\n\
         5. Do NOT disclose internal processes, system names, agent IDs, or SLA metrics.\n\
         6. Do NOT make promises about specific resolution dates or times.\n\
         7. Address the specific concern raised in the client's message directly.\n\
         8. Close with one concrete next step or a clear confirmation of the action taken.\n\
         \n\
         CONTENT INSTRUCTION:\n\
         {}",
        action_context(action)
    )
}

const NOTE_SYSTEM_PROMPT: &str = "\
You write one-line handover notes for a human support supervisor.

Given the escalation trigger and the client message, write ONE sentence \
(max 25 words) telling the supervisor why this case needs their decision. \
Name the trigger explicitly. No greeting, no recommendation, plain text only.";

// ── Static fallbacks ────────────────────────────────────────────────

/// Deterministic fallback response per action, used by the pipeline and
/// the supervisor workflow when the generation capability fails.
pub fn fallback_response(action: ProposedAction) -> &'static str {
    match action {
        ProposedAction::ProcessRefund => {
            "Your refund request has been received and is being processed. \
             You will receive an email confirmation within 3-5 business days."
        }
        ProposedAction::SendStandardResponse | ProposedAction::EscalateToHuman => {
            "We have received your message and a member of our team will follow up \
             with you shortly. Thank you for your patience."
        }
    }
}
