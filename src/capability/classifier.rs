//! LLM-backed message classifier.
//!
//! Sends a strict, closed-domain prompt and parses the structured JSON
//! reply. Any label outside the closed sets is a malformed response —
//! the pipeline falls back to neutral defaults, it never guesses.

use async_trait::async_trait;
use tracing::debug;

use crate::error::CapabilityError;
use crate::pipeline::types::{Intent, Sentiment};

use super::chat::ChatApi;
use super::{Classification, Classifier};

/// Classification must be reproducible.
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// LLM classifier over a chat-completions API.
pub struct LlmClassifier {
    api: ChatApi,
}

impl LlmClassifier {
    pub fn new(api: ChatApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, message: &str) -> Result<Classification, CapabilityError> {
        let raw = self
            .api
            .complete(CLASSIFY_SYSTEM_PROMPT, message, CLASSIFY_TEMPERATURE)
            .await?;

        let classification = parse_classification(&raw).map_err(|reason| {
            CapabilityError::InvalidResponse {
                provider: self.api.model().to_string(),
                reason,
            }
        })?;

        debug!(
            sentiment = classification.sentiment.as_str(),
            intent = classification.intent.as_str(),
            "Message classified"
        );
        Ok(classification)
    }
}

/// Strict classification prompt. Closed categories, no room for fabrication;
/// borderline sentiment defaults to negative so a dissatisfied client is
/// escalated rather than missed.
const CLASSIFY_SYSTEM_PROMPT: &str = "\
You are a CRM message classifier for an enterprise B2B support system.

TASK: Classify the client message into exactly the categories below. \
No other values are accepted.

SENTIMENT CATEGORIES:
- \"negative\": dissatisfaction, frustration, anger, urgency caused by a \
problem, complaint, or implicit/explicit threat to escalate or cancel.
- \"positive\": satisfaction, gratitude, compliment, or explicit approval.
- \"neutral\": factual question, status request, or informational inquiry \
with no emotional charge.

INTENT CATEGORIES:
- \"refund_request\": explicit or implicit request for money back, order \
cancellation with refund, billing dispute, or chargeback.
- \"support_request\": report of a technical or operational problem, \
service malfunction, or a request for help resolving an issue.
- \"general_inquiry\": question about information, pricing, availability, \
status, or any topic not covered by the categories above.

CLASSIFICATION RULES:
1. Base your classification only on what is explicitly written or \
unambiguously implied in the message.
2. Do not assume context or history beyond the message provided.
3. When sentiment is borderline, default to \"negative\" — it is safer \
to escalate unnecessarily than to miss a dissatisfied client.
4. Respond with ONLY a JSON object: {\"sentiment\": \"...\", \"intent\": \"...\"}";

/// Raw classifier reply shape.
#[derive(Debug, serde::Deserialize)]
struct ClassifyResponse {
    sentiment: String,
    intent: String,
}

/// Parse the classifier reply into a `Classification`.
fn parse_classification(raw: &str) -> Result<Classification, String> {
    let json_str = extract_json_object(raw);
    let response: ClassifyResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    let sentiment = Sentiment::parse(&response.sentiment)
        .ok_or_else(|| format!("unknown sentiment: '{}'", response.sentiment))?;
    let intent = Intent::parse(&response.intent)
        .ok_or_else(|| format!("unknown intent: '{}'", response.intent))?;

    Ok(Classification { sentiment, intent })
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_object() {
        let raw = r#"{"sentiment": "negative", "intent": "refund_request"}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert_eq!(c.intent, Intent::RefundRequest);
    }

    #[test]
    fn parse_markdown_wrapped_object() {
        let raw = "Here it is:\n```json\n{\"sentiment\": \"neutral\", \"intent\": \"general_inquiry\"}\n```";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.sentiment, Sentiment::Neutral);
        assert_eq!(c.intent, Intent::GeneralInquiry);
    }

    #[test]
    fn parse_object_embedded_in_text() {
        let raw = "Classification: {\"sentiment\": \"positive\", \"intent\": \"support_request\"} done.";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert_eq!(c.intent, Intent::SupportRequest);
    }

    #[test]
    fn unknown_sentiment_rejected() {
        let raw = r#"{"sentiment": "furious", "intent": "general_inquiry"}"#;
        let err = parse_classification(raw).unwrap_err();
        assert!(err.contains("furious"));
    }

    #[test]
    fn unknown_intent_rejected() {
        let raw = r#"{"sentiment": "neutral", "intent": "sales_lead"}"#;
        assert!(parse_classification(raw).is_err());
    }

    #[test]
    fn non_json_rejected() {
        assert!(parse_classification("the message is negative").is_err());
    }

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"sentiment": "neutral"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_code_block_without_language() {
        let input = "```\n{\"sentiment\": \"neutral\"}\n```";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
    }

    #[test]
    fn prompt_names_all_labels() {
        for label in [
            "negative",
            "positive",
            "neutral",
            "refund_request",
            "support_request",
            "general_inquiry",
        ] {
            assert!(CLASSIFY_SYSTEM_PROMPT.contains(label));
        }
    }
}
