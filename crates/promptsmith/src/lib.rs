//! Compose ready-to-use AI prompts and generate them with Google Gemini.
//!
//! `promptsmith` takes three form values (a free-text topic, a prompt style,
//! and a target use-case), composes them into one instruction, sends it to
//! the Gemini `generateContent` endpoint, and keeps an in-memory history of
//! what came back.
//!
//! # Getting started
//!
//! ```ignore
//! use promptsmith::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::from_env()?;
//!     let client = GeminiClient::from_config(&config)?;
//!
//!     let mut controller = Controller::new();
//!     controller.form.topic = "Launch copy for a cat cafe".into();
//!     controller.form.use_case = UseCase::Marketing.label().into();
//!
//!     match controller.trigger(Action::Generate, &client).await? {
//!         Outcome::Displayed { version } => {
//!             println!("v{version}: {}", controller.current().unwrap().generated_text)
//!         }
//!         Outcome::Failed { message } => eprintln!("{message}"),
//!         Outcome::Ignored => {}
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Instruction template and form catalogs:** [`compose`].
//! - **Talking to the endpoint:** [`GeminiClient`] and the [`TextGenerator`]
//!   trait. Swap in your own `TextGenerator` to stub the network.
//! - **History:** [`history::HistoryLedger`].
//! - **Generate / Regenerate state machine:** [`controller::Controller`].
//! - **PDF export:** [`export`].
//! - **Static configuration and logging:** [`config`] and [`logging`].

pub mod compose;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod history;
pub mod logging;
pub mod prelude;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::AppConfig;
pub use crate::error::GenerationError;

// ── Constants ──────────────────────────────────────────────────────

/// Base URL of the Generative Language API.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for all generations.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ── Request types ──────────────────────────────────────────────────

/// `generateContent` request body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// A single-turn request whose only content is `text`.
    pub fn single_turn(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: text.into() }],
            }],
        }
    }
}

/// One entry of `contents`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// One free-form text part.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Part {
    pub text: String,
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response. Every level is optional so that envelope drift is
/// reported as [`GenerationError::MalformedResponse`] rather than a serde
/// error message.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawGenerateResponse {
    candidates: Option<Vec<RawCandidate>>,
    error: Option<ApiErrorResponse>,
    usage_metadata: Option<UsageMetadata>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    content: Option<RawContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawContent {
    parts: Option<Vec<RawPart>>,
}

#[derive(Deserialize, Debug)]
struct RawPart {
    text: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Token usage statistics reported by the endpoint.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub prompt_token_count: Option<u32>,
    pub candidates_token_count: Option<u32>,
    pub total_token_count: Option<u32>,
}

/// Pull `candidates[0].content.parts[0].text` out of a response body.
///
/// Any missing step, a non-string `text`, or a body that is not JSON is a
/// [`GenerationError::MalformedResponse`].
///
/// ```
/// use promptsmith::extract_candidate_text;
///
/// let body = r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#;
/// assert_eq!(extract_candidate_text(body).unwrap(), "hi");
/// assert!(extract_candidate_text(r#"{"candidates":[]}"#).is_err());
/// ```
pub fn extract_candidate_text(body: &str) -> Result<String, GenerationError> {
    let parsed: RawGenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::malformed(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(GenerationError::malformed(format!(
            "API error: {}",
            err.message.as_deref().unwrap_or("(no message)")
        )));
    }

    if let Some(ref usage) = parsed.usage_metadata {
        debug!(
            "Token usage: prompt={}, candidates={}, total={}",
            usage.prompt_token_count.unwrap_or(0),
            usage.candidates_token_count.unwrap_or(0),
            usage.total_token_count.unwrap_or(0),
        );
    }

    let Some(candidate) = parsed.candidates.and_then(|c| c.into_iter().next()) else {
        let reason = match parsed.prompt_feedback.and_then(|f| f.block_reason) {
            Some(block) => format!("no candidates (prompt blocked: {block})"),
            None => "no candidates".to_string(),
        };
        return Err(GenerationError::malformed(reason));
    };

    let finish_reason = candidate.finish_reason;
    let part = candidate
        .content
        .and_then(|c| c.parts)
        .and_then(|p| p.into_iter().next())
        .ok_or_else(|| {
            GenerationError::malformed(match finish_reason.as_deref() {
                Some(reason) => format!("first candidate has no content parts (finish reason: {reason})"),
                None => "first candidate has no content parts".to_string(),
            })
        })?;

    match part.text {
        Some(serde_json::Value::String(text)) => Ok(text),
        Some(_) => Err(GenerationError::malformed("first part text is not a string")),
        None => Err(GenerationError::malformed("first part has no text")),
    }
}

// ── Generator seam ─────────────────────────────────────────────────

/// Anything that can turn an instruction into generated text.
///
/// [`GeminiClient`] is the production implementation. Tests and alternative
/// front-ends plug in their own. One call is one attempt: implementations
/// must not retry.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instruction: &str) -> Result<String, GenerationError>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_base: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

impl GeminiClient {
    /// Create a client for [`DEFAULT_MODEL`] on the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        Self::with_endpoint(
            GEMINI_API_BASE,
            DEFAULT_MODEL,
            api_key,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, GenerationError> {
        Self::with_endpoint(
            &config.api_base,
            &config.model,
            &config.api_key,
            config.request_timeout(),
        )
    }

    /// Create a client against an explicit base URL and model.
    pub fn with_endpoint(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("promptsmith/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Endpoint URL without the key query parameter (safe to log).
    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    /// Send one single-turn request and return the first candidate's text.
    pub async fn generate_content(&self, instruction: &str) -> Result<String, GenerationError> {
        let body = GenerateContentRequest::single_turn(instruction);
        debug!(
            "Gemini request: model={}, instruction_chars={}",
            self.model,
            instruction.len()
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(&body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(format!("{}?key={}", self.endpoint(), self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::transport(format!("request failed: {}", e.without_url())))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            GenerationError::transport(format!("failed to read response: {}", e.without_url()))
        })?;

        debug!(
            "Gemini response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(GenerationError::transport(format!("HTTP {status}: {text}")));
        }

        let generated = extract_candidate_text(&text)?;
        debug!("Gemini output: {} chars", generated.len());
        Ok(generated)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, instruction: &str) -> Result<String, GenerationError> {
        self.generate_content(instruction).await
    }
}
