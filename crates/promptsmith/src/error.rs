//! Error kinds surfaced by composing, generating, and triggering.

use thiserror::Error;

/// Rejected form input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// The topic was empty once surrounding whitespace was removed.
    #[error("topic is empty")]
    EmptyTopic,
}

/// Failure of a single call to the generation endpoint.
///
/// Both variants are terminal for the action that caused them: nothing is
/// retried, and callers leave their history untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Network failure, timeout, or non-2xx status.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The response body did not contain `candidates[0].content.parts[0].text`.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },
}

impl GenerationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }
}

/// A trigger that could not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TriggerError {
    /// A generation is already in flight for this session.
    #[error("a generation is already in progress")]
    Busy,
}

/// Invalid or missing static configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("invalid request timeout: {0}")]
    InvalidTimeout(String),
}
