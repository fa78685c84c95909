//! Session-scoped history of successful generations.
//!
//! The ledger is append-only: entries are stored oldest first and presented
//! newest first with 1-based version numbers (`Version N` is the most
//! recent). It lives exactly as long as its owning session.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::compose::GenerationRequest;

/// A request together with the text the endpoint returned for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub request: GenerationRequest,
    pub generated_text: String,
    /// When the endpoint answered. Used to name exported documents.
    pub generated_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn new(request: GenerationRequest, generated_text: impl Into<String>) -> Self {
        Self::at(request, generated_text, Utc::now())
    }

    pub fn at(
        request: GenerationRequest,
        generated_text: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request,
            generated_text: generated_text.into(),
            generated_at,
        }
    }
}

/// One ledger entry as presented in the history panel.
#[derive(Debug, Clone, Copy)]
pub struct Version<'a> {
    /// 1-based; the newest entry carries the ledger length.
    pub number: usize,
    pub result: &'a GenerationResult,
}

/// Ordered, append-only record of past results.
#[derive(Debug, Default, Clone)]
pub struct HistoryLedger {
    entries: Vec<GenerationResult>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. The only way to change the ledger.
    pub fn append(&mut self, result: GenerationResult) {
        self.entries.push(result);
    }

    /// Storage order (oldest first).
    pub fn all(&self) -> &[GenerationResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&GenerationResult> {
        self.entries.last()
    }

    /// Look up an entry by its 1-based version number.
    pub fn get(&self, version: usize) -> Option<&GenerationResult> {
        version
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
    }

    /// Presentation order: newest first, numbered `len..=1`.
    pub fn versions(&self) -> impl Iterator<Item = Version<'_>> {
        let len = self.entries.len();
        self.entries
            .iter()
            .rev()
            .enumerate()
            .map(move |(idx, result)| Version {
                number: len - idx,
                result,
            })
    }
}
