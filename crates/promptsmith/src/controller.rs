//! The Generate / Regenerate state machine for one session.
//!
//! ```text
//!            blank topic: no-op
//!          ┌──────────────┐
//!          ▼              │
//!   Idle ──action──▶ Composing ──▶ AwaitingResponse ──ok──▶ Displaying
//!    ▲                                   │                      │
//!    │                                   └──err──▶ Failed       │
//!    └───────────── next action / acknowledge_error ◀───────────┘
//! ```
//!
//! A [`Controller`] owns the live form values, the session's
//! [`HistoryLedger`], and the current phase. Callers that own the controller
//! outright use [`Controller::trigger`]. Callers that share it behind a lock
//! split the cycle into [`Controller::begin`] and [`Controller::complete`],
//! so that the lock is never held across the outbound call.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::TextGenerator;
use crate::compose::{GenerationRequest, PromptStyle, UseCase};
use crate::error::{ComposeError, GenerationError, TriggerError};
use crate::history::{GenerationResult, HistoryLedger};

/// Where the controller is in the generate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Composing,
    AwaitingResponse,
    Displaying,
    Failed,
}

/// User action that starts a generation. Both read the live form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Generate,
    Regenerate,
}

/// Live values of the form. There is no separate memory of "the inputs
/// used last time": Regenerate reads whatever is here at the moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub topic: String,
    pub style: String,
    pub use_case: String,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            topic: String::new(),
            style: PromptStyle::default().label().to_string(),
            use_case: UseCase::default().label().to_string(),
        }
    }
}

/// Partial form change. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormUpdate {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub use_case: Option<String>,
}

impl FormUpdate {
    pub fn is_empty(&self) -> bool {
        self.topic.is_none() && self.style.is_none() && self.use_case.is_none()
    }
}

impl FormState {
    pub fn apply(&mut self, update: FormUpdate) {
        if let Some(topic) = update.topic {
            self.topic = topic;
        }
        if let Some(style) = update.style {
            self.style = style;
        }
        if let Some(use_case) = update.use_case {
            self.use_case = use_case;
        }
    }
}

/// A generation that has left `Composing` and awaits the endpoint.
///
/// Only [`Controller::begin`] creates one; hand it back to
/// [`Controller::complete`] together with the generator's answer.
#[derive(Debug)]
pub struct PendingGeneration {
    action: Action,
    request: GenerationRequest,
    instruction: String,
}

impl PendingGeneration {
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

/// How a triggered action ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Blank topic: nothing happened.
    Ignored,
    /// A new result was appended and is now displayed.
    Displayed { version: usize },
    /// The generator failed; `message` is shown to the user.
    Failed { message: String },
}

/// Per-session interaction state.
#[derive(Debug)]
pub struct Controller {
    pub form: FormState,
    ledger: HistoryLedger,
    phase: Phase,
    last_error: Option<String>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self::with_form(FormState::default())
    }

    pub fn with_form(form: FormState) -> Self {
        Self {
            form,
            ledger: HistoryLedger::new(),
            phase: Phase::Idle,
            last_error: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// The result rendered prominently, above the history.
    ///
    /// Always the newest ledger entry: failures never replace it.
    pub fn current(&self) -> Option<&GenerationResult> {
        self.ledger.latest()
    }

    /// Error message from the last failed action, until acknowledged or
    /// superseded by the next action.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start an action.
    ///
    /// Returns `Ok(None)` without touching any state when the topic is
    /// blank, and [`TriggerError::Busy`] while a generation is in flight.
    pub fn begin(&mut self, action: Action) -> Result<Option<PendingGeneration>, TriggerError> {
        if self.phase == Phase::AwaitingResponse {
            return Err(TriggerError::Busy);
        }

        let request = match GenerationRequest::new(
            self.form.topic.clone(),
            self.form.style.clone(),
            self.form.use_case.clone(),
        ) {
            Ok(request) => request,
            Err(ComposeError::EmptyTopic) => {
                debug!("{action:?} ignored: blank topic");
                return Ok(None);
            }
        };

        self.last_error = None;
        self.phase = Phase::Composing;
        let instruction = request.instruction();
        self.phase = Phase::AwaitingResponse;
        debug!(
            "{action:?}: style={}, use_case={}, instruction_chars={}",
            request.style(),
            request.use_case(),
            instruction.len()
        );

        Ok(Some(PendingGeneration {
            action,
            request,
            instruction,
        }))
    }

    /// Finish an action with the generator's answer.
    pub fn complete(
        &mut self,
        pending: PendingGeneration,
        outcome: Result<String, GenerationError>,
    ) -> Outcome {
        match outcome {
            Ok(text) => {
                self.ledger
                    .append(GenerationResult::new(pending.request, text));
                self.phase = Phase::Displaying;
                let version = self.ledger.len();
                info!("{:?} produced version {version}", pending.action);
                Outcome::Displayed { version }
            }
            Err(e) => {
                warn!("{:?} failed: {e}", pending.action);
                let message = format!("Error generating prompt: {e}");
                self.last_error = Some(message.clone());
                self.phase = Phase::Failed;
                Outcome::Failed { message }
            }
        }
    }

    /// Run a whole action against `generator`.
    pub async fn trigger(
        &mut self,
        action: Action,
        generator: &dyn TextGenerator,
    ) -> Result<Outcome, TriggerError> {
        let Some(pending) = self.begin(action)? else {
            return Ok(Outcome::Ignored);
        };
        let answer = generator.generate(pending.instruction()).await;
        Ok(self.complete(pending, answer))
    }

    /// Fail an in-flight action whose [`PendingGeneration`] never came back
    /// (its task panicked or was cancelled). Does nothing unless awaiting.
    pub fn abandon(&mut self, reason: &str) -> Outcome {
        if self.phase != Phase::AwaitingResponse {
            return Outcome::Ignored;
        }
        warn!("in-flight generation abandoned: {reason}");
        let message = format!("Error generating prompt: {reason}");
        self.last_error = Some(message.clone());
        self.phase = Phase::Failed;
        Outcome::Failed { message }
    }

    /// Dismiss a shown error: `Failed -> Idle`.
    pub fn acknowledge_error(&mut self) {
        if self.phase == Phase::Failed {
            self.phase = Phase::Idle;
            self.last_error = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted answers and records every instruction it receives.
    struct ScriptedGenerator {
        answers: Mutex<Vec<Result<String, GenerationError>>>,
        seen: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(answers: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, instruction: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(instruction.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(GenerationError::transport("script exhausted")))
        }
    }

    fn form(topic: &str, style: &str, use_case: &str) -> FormState {
        FormState {
            topic: topic.into(),
            style: style.into(),
            use_case: use_case.into(),
        }
    }

    #[test]
    fn starts_idle_with_catalog_defaults() {
        let c = Controller::new();
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(c.form.style, "Creative");
        assert_eq!(c.form.use_case, "Image Generation");
        assert!(c.current().is_none());
        assert!(c.ledger().is_empty());
    }

    #[tokio::test]
    async fn product_description_scenario() {
        let generator = ScriptedGenerator::new(vec![Ok(
            "Write a catchy 2-line caption for a new sneaker line".into(),
        )]);
        let mut c = Controller::with_form(form(
            "Write a product description",
            "Marketing",
            "Social Media",
        ));

        let outcome = c.trigger(Action::Generate, &generator).await.unwrap();
        assert_eq!(outcome, Outcome::Displayed { version: 1 });
        assert_eq!(c.phase(), Phase::Displaying);

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("Topic/Context: Write a product description\n"));
        assert!(seen[0].contains("Prompt Style: Marketing\n"));
        assert!(seen[0].contains("Target Use-case: Social Media\n"));
        assert!(seen[0].ends_with("ready-to-use AI prompt."));

        assert_eq!(c.ledger().len(), 1);
        let current = c.current().unwrap();
        assert_eq!(
            current.generated_text,
            "Write a catchy 2-line caption for a new sneaker line"
        );
        assert_eq!(current.request.topic(), "Write a product description");
        assert_eq!(current.request.style(), "Marketing");
        assert_eq!(current.request.use_case(), "Social Media");
    }

    #[tokio::test]
    async fn blank_topic_is_a_silent_noop() {
        let generator = ScriptedGenerator::new(vec![Ok("unused".into())]);
        let mut c = Controller::with_form(form("   \n ", "Creative", "Coding"));

        for action in [Action::Generate, Action::Regenerate] {
            let outcome = c.trigger(action, &generator).await.unwrap();
            assert_eq!(outcome, Outcome::Ignored);
        }
        assert_eq!(generator.calls(), 0);
        assert!(c.ledger().is_empty());
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.last_error().is_none());
    }

    #[tokio::test]
    async fn two_generations_are_versioned_newest_first() {
        let generator = ScriptedGenerator::new(vec![Ok("one".into()), Ok("two".into())]);
        let mut c = Controller::with_form(form("first topic", "Creative", "Coding"));
        c.trigger(Action::Generate, &generator).await.unwrap();

        c.form.topic = "second topic".into();
        let outcome = c.trigger(Action::Generate, &generator).await.unwrap();
        assert_eq!(outcome, Outcome::Displayed { version: 2 });

        let panels: Vec<(usize, &str, &str)> = c
            .ledger()
            .versions()
            .map(|v| {
                (
                    v.number,
                    v.result.request.topic(),
                    v.result.generated_text.as_str(),
                )
            })
            .collect();
        assert_eq!(
            panels,
            vec![(2, "second topic", "two"), (1, "first topic", "one")]
        );
        assert_eq!(c.current().unwrap().generated_text, "two");
    }

    #[tokio::test]
    async fn regenerate_reads_live_form_and_repeats_call() {
        let generator = ScriptedGenerator::new(vec![Ok("a".into()), Ok("b".into()), Ok("c".into())]);
        let mut c = Controller::with_form(form("topic", "Creative", "Gaming"));

        c.trigger(Action::Generate, &generator).await.unwrap();
        c.trigger(Action::Regenerate, &generator).await.unwrap();
        assert_eq!(generator.calls(), 2);
        assert_eq!(c.ledger().len(), 2);

        // Regenerate uses whatever the form holds now, not the last request.
        c.form.style = "Analytical".into();
        c.trigger(Action::Regenerate, &generator).await.unwrap();
        assert_eq!(c.current().unwrap().request.style(), "Analytical");

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);
        assert_ne!(seen[1], seen[2]);
    }

    #[tokio::test]
    async fn failure_keeps_ledger_and_current() {
        let generator = ScriptedGenerator::new(vec![
            Ok("kept".into()),
            Err(GenerationError::transport("HTTP 503 Service Unavailable: down")),
            Err(GenerationError::malformed("no candidates")),
        ]);
        let mut c = Controller::with_form(form("topic", "Creative", "Coding"));
        c.trigger(Action::Generate, &generator).await.unwrap();

        let outcome = c.trigger(Action::Generate, &generator).await.unwrap();
        let Outcome::Failed { message } = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(
            message,
            "Error generating prompt: transport error: HTTP 503 Service Unavailable: down"
        );
        assert_eq!(c.phase(), Phase::Failed);
        assert_eq!(c.last_error(), Some(message.as_str()));
        assert_eq!(c.ledger().len(), 1);
        assert_eq!(c.current().unwrap().generated_text, "kept");

        let outcome = c.trigger(Action::Regenerate, &generator).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed { .. }));
        assert_eq!(c.ledger().len(), 1);
        assert_eq!(c.current().unwrap().generated_text, "kept");
    }

    #[tokio::test]
    async fn next_action_after_failure_clears_error() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationError::transport("timed out")),
            Ok("recovered".into()),
        ]);
        let mut c = Controller::with_form(form("topic", "Creative", "Coding"));
        c.trigger(Action::Generate, &generator).await.unwrap();
        assert!(c.last_error().is_some());
        assert!(c.current().is_none());

        c.trigger(Action::Generate, &generator).await.unwrap();
        assert!(c.last_error().is_none());
        assert_eq!(c.phase(), Phase::Displaying);
        assert_eq!(c.current().unwrap().generated_text, "recovered");
    }

    #[test]
    fn begin_while_awaiting_is_busy() {
        let mut c = Controller::with_form(form("topic", "Creative", "Coding"));
        let pending = c.begin(Action::Generate).unwrap().unwrap();
        assert_eq!(c.phase(), Phase::AwaitingResponse);
        assert_eq!(pending.action(), Action::Generate);

        assert_eq!(c.begin(Action::Regenerate).unwrap_err(), TriggerError::Busy);
        assert_eq!(c.phase(), Phase::AwaitingResponse);

        let outcome = c.complete(pending, Ok("done".into()));
        assert_eq!(outcome, Outcome::Displayed { version: 1 });
        assert!(c.begin(Action::Regenerate).unwrap().is_some());
    }

    #[test]
    fn pending_snapshots_form_at_trigger_time() {
        let mut c = Controller::with_form(form("before", "Creative", "Coding"));
        let pending = c.begin(Action::Generate).unwrap().unwrap();

        // Edits while awaiting do not leak into the in-flight request.
        c.form.topic = "after".into();
        c.complete(pending, Ok("text".into()));
        assert_eq!(c.current().unwrap().request.topic(), "before");
    }

    #[test]
    fn acknowledge_error_returns_to_idle() {
        let mut c = Controller::with_form(form("topic", "Creative", "Coding"));
        let pending = c.begin(Action::Generate).unwrap().unwrap();
        c.complete(pending, Err(GenerationError::transport("refused")));
        assert_eq!(c.phase(), Phase::Failed);

        c.acknowledge_error();
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.last_error().is_none());
    }

    #[test]
    fn abandon_frees_a_stranded_session() {
        let mut c = Controller::with_form(form("topic", "Creative", "Coding"));
        assert_eq!(c.abandon("lost"), Outcome::Ignored);
        assert_eq!(c.phase(), Phase::Idle);

        let pending = c.begin(Action::Generate).unwrap().unwrap();
        drop(pending);
        let outcome = c.abandon("task cancelled");
        assert_eq!(
            outcome,
            Outcome::Failed {
                message: "Error generating prompt: task cancelled".into()
            }
        );
        assert_eq!(c.phase(), Phase::Failed);
        assert!(c.ledger().is_empty());

        // The session accepts the next action again.
        assert!(c.begin(Action::Regenerate).unwrap().is_some());
    }

    #[test]
    fn form_update_is_partial() {
        let mut state = FormState::default();
        state.apply(FormUpdate {
            topic: Some("new topic".into()),
            ..Default::default()
        });
        assert_eq!(state.topic, "new topic");
        assert_eq!(state.style, "Creative");

        let update: FormUpdate = serde_json::from_str(r#"{"use_case":"Gaming"}"#).unwrap();
        assert!(!update.is_empty());
        state.apply(update);
        assert_eq!(state.use_case, "Gaming");
        assert_eq!(state.topic, "new topic");
    }
}
