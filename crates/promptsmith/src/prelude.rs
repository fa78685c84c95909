//! Convenience re-exports for common `promptsmith` types.
//!
//! Meant to be glob-imported by front-ends:
//!
//! ```ignore
//! use promptsmith::prelude::*;
//! ```
//!
//! Covers the client and generator trait, the controller and its phases,
//! the catalogs, and the ledger. Export and logging helpers stay in their
//! modules.

// ── Generation ──────────────────────────────────────────────────────
pub use crate::{GeminiClient, TextGenerator};

// ── Composition ─────────────────────────────────────────────────────
pub use crate::compose::{GenerationRequest, PromptStyle, UseCase, compose};

// ── Session state ───────────────────────────────────────────────────
pub use crate::controller::{
    Action, Controller, FormState, FormUpdate, Outcome, PendingGeneration, Phase,
};
pub use crate::history::{GenerationResult, HistoryLedger, Version};

// ── Configuration and errors ────────────────────────────────────────
pub use crate::config::AppConfig;
pub use crate::error::{ComposeError, ConfigError, GenerationError, TriggerError};
