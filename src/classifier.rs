//! Content classifier — sends subject + body to the Gemini chat-completions
//! endpoint and extracts verification codes/links from the JSON reply.
//!
//! Parse failures never escalate: a reply the model mangles degrades to a
//! non-verification result so the poll loop keeps running.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::ClassifierConfig;
use crate::error::ClassifyError;

/// System instruction for the model. Asks for a bare JSON object so the
/// content field can be parsed without stripping prose.
const SYSTEM_PROMPT: &str = "You are an email verification assistant. Extract the verification code and the verification link from the email content, and identify the sender or company name. Reply with a JSON object of the form {\"verificationCode\": \"...\", \"verificationLink\": \"...\", \"sender\": \"...\"}. Use an empty string for any field that is not present.";

/// Result of classifying one message. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_verification: bool,
    pub verification_code: Option<String>,
    pub verification_link: Option<String>,
    pub sender: Option<String>,
    pub message: String,
}

impl Classification {
    /// Non-verification result with a reason. Used for the degrade paths.
    pub fn skipped(message: &str) -> Self {
        Self {
            is_verification: false,
            verification_code: None,
            verification_link: None,
            sender: None,
            message: message.to_string(),
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one message. Transport failures are errors; anything the
    /// model gets wrong degrades to a non-verification result.
    async fn classify(&self, subject: &str, body: &str) -> Result<Classification, ClassifyError>;
}

// ── Wire types ──────────────────────────────────────────────────────

/// Chat-completions envelope. Only the first choice's content is used;
/// missing pieces degrade rather than fail, mirroring the relay contract.
#[derive(Debug, Default, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    message: ChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

// ── Gemini implementation ───────────────────────────────────────────

pub struct GeminiClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
}

impl GeminiClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint,
            api_key: config.api_key,
            model: config.model,
        }
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, subject: &str, body: &str) -> Result<Classification, ClassifyError> {
        if body.is_empty() {
            return Ok(Classification::skipped("empty content"));
        }

        let request = serde_json::json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("{subject}\n{body}") },
            ],
        });

        let started = std::time::Instant::now();
        let envelope: ChatResponse = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?
            .json()
            .await?;
        tracing::debug!(elapsed = ?started.elapsed(), "Completion call finished");

        let content = envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_else(|| "{}".to_string());

        Ok(parse_extraction(&content))
    }
}

/// Parse the model's content field into a [`Classification`].
///
/// A message counts as a verification email iff the extraction carries a
/// non-empty code or link. Malformed JSON degrades instead of erroring.
pub fn parse_extraction(content: &str) -> Classification {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return Classification::skipped("parse failed");
    };

    let verification_code = string_field(&value, "verificationCode");
    let verification_link = string_field(&value, "verificationLink");
    let sender = string_field(&value, "sender");
    let is_verification = verification_code.is_some() || verification_link.is_some();

    Classification {
        is_verification,
        verification_code,
        verification_link,
        sender,
        message: if is_verification {
            "verification email detected".to_string()
        } else {
            "not a verification email".to_string()
        },
    }
}

/// Extract a non-empty string field. Models occasionally return codes as
/// bare numbers, so those are accepted and stringified.
fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

// ── Tests ───────────────────────────────────────────────────────────
