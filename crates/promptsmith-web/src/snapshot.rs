//! Serializable projection of a session's [`Controller`] for WebSocket and
//! REST transport.
//!
//! The controller keeps results in insertion order; the snapshot lists them
//! newest first with their 1-based version numbers, and flattens each
//! result's request so clients can render a history row without a second
//! lookup.

use chrono::{DateTime, Utc};
use promptsmith::compose::{PromptStyle, UseCase};
use promptsmith::controller::{Controller, FormState, Phase};
use promptsmith::history::GenerationResult;
use serde::Serialize;
use uuid::Uuid;

/// Serializable view of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub form: FormState,
    /// The most recent successful result, or `null` before the first one.
    pub current: Option<ResultEntry>,
    /// Message from the last failed generation, if not yet acknowledged.
    pub error: Option<String>,
    /// Every result in this session, newest first.
    pub history: Vec<ResultEntry>,
}

/// One ledger entry as sent to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ResultEntry {
    pub version: usize,
    pub topic: String,
    pub style: String,
    pub use_case: String,
    pub generated_text: String,
    pub generated_at: DateTime<Utc>,
}

impl ResultEntry {
    fn new(version: usize, result: &GenerationResult) -> Self {
        Self {
            version,
            topic: result.request.topic().to_string(),
            style: result.request.style().to_string(),
            use_case: result.request.use_case().to_string(),
            generated_text: result.generated_text.clone(),
            generated_at: result.generated_at,
        }
    }
}

impl SessionSnapshot {
    /// Build a snapshot. Call while holding the session lock.
    pub fn from_controller(session_id: Uuid, controller: &Controller) -> Self {
        let ledger = controller.ledger();
        let current = controller
            .current()
            .map(|result| ResultEntry::new(ledger.len(), result));
        let history = ledger
            .versions()
            .map(|v| ResultEntry::new(v.number, v.result))
            .collect();

        Self {
            session_id,
            phase: controller.phase(),
            form: controller.form.clone(),
            current,
            error: controller.last_error().map(str::to_string),
            history,
        }
    }
}

/// The selectable catalogs, for populating the form.
#[derive(Debug, Serialize)]
pub struct CatalogOptions {
    pub styles: Vec<&'static str>,
    pub use_cases: Vec<&'static str>,
    pub default_style: &'static str,
    pub default_use_case: &'static str,
}

impl CatalogOptions {
    pub fn new() -> Self {
        Self {
            styles: PromptStyle::labels(),
            use_cases: UseCase::labels(),
            default_style: PromptStyle::default().label(),
            default_use_case: UseCase::default().label(),
        }
    }
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptsmith::controller::Action;

    fn controller_with(texts: &[&str]) -> Controller {
        let mut controller = Controller::with_form(FormState {
            topic: "cats".into(),
            style: "Creative".into(),
            use_case: "Marketing".into(),
        });
        for text in texts {
            let pending = controller.begin(Action::Generate).unwrap().unwrap();
            controller.complete(pending, Ok(text.to_string()));
        }
        controller
    }

    #[test]
    fn empty_session_snapshot() {
        let id = Uuid::new_v4();
        let snap = SessionSnapshot::from_controller(id, &Controller::new());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["session_id"], id.to_string());
        assert_eq!(json["phase"], "idle");
        assert!(json["current"].is_null());
        assert!(json["error"].is_null());
        assert_eq!(json["history"].as_array().unwrap().len(), 0);
        assert_eq!(json["form"]["style"], "Creative");
        assert_eq!(json["form"]["use_case"], "Image Generation");
    }

    #[test]
    fn history_is_newest_first() {
        let controller = controller_with(&["first", "second"]);
        let snap = SessionSnapshot::from_controller(Uuid::new_v4(), &controller);

        let current = snap.current.as_ref().unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.generated_text, "second");

        let versions: Vec<_> = snap.history.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![2, 1]);
        assert_eq!(snap.history[1].generated_text, "first");
        assert_eq!(snap.history[1].topic, "cats");
        assert_eq!(snap.history[1].use_case, "Marketing");
    }

    #[test]
    fn options_list_catalogs() {
        let options = CatalogOptions::new();
        assert_eq!(options.styles.len(), 6);
        assert_eq!(options.use_cases.len(), 10);
        assert!(options.use_cases.contains(&"Marketing"));
        assert_eq!(options.default_style, "Creative");
    }
}
