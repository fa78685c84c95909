//! Messages exchanged with WebSocket clients.
//!
//! [`SessionEvent`] flows server → client on a per-session
//! `tokio::sync::broadcast` channel; [`ClientMessage`] flows the other way.
//! Both are discriminated on the `type` field when serialized to JSON.

use promptsmith::controller::{FormUpdate, Phase};
use serde::{Deserialize, Serialize};

use crate::snapshot::SessionSnapshot;

/// A message sent from the server to a session's WebSocket clients.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Full session state (sent on connect, after lag, and after each action).
    Snapshot { data: SessionSnapshot },
    /// Phase change.
    Phase { phase: Phase },
    /// A new result was appended to the history and is now displayed.
    Generated { version: usize, text: String },
    /// The generator failed; the previous result stays displayed.
    Failed { message: String },
    /// A client request was rejected (busy, unknown option, bad JSON).
    Error { message: String },
}

/// A message sent from a client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Change live form values.
    UpdateForm {
        #[serde(default)]
        topic: Option<String>,
        #[serde(default)]
        style: Option<String>,
        #[serde(default)]
        use_case: Option<String>,
    },
    /// Press Generate.
    Generate,
    /// Press Regenerate.
    Regenerate,
    /// The error message was shown; return to idle.
    AcknowledgeError,
}

impl ClientMessage {
    /// The form change carried by an `update_form` message.
    pub fn form_update(&self) -> Option<FormUpdate> {
        match self {
            ClientMessage::UpdateForm {
                topic,
                style,
                use_case,
            } => Some(FormUpdate {
                topic: topic.clone(),
                style: style.clone(),
                use_case: use_case.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_event_serializes_with_type_tag() {
        let msg = SessionEvent::Generated {
            version: 3,
            text: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "generated");
        assert_eq!(json["version"], 3);
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn phase_event_uses_snake_case() {
        let msg = SessionEvent::Phase {
            phase: Phase::AwaitingResponse,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "phase");
        assert_eq!(json["phase"], "awaiting_response");
    }

    #[test]
    fn failed_event_serializes() {
        let msg = SessionEvent::Failed {
            message: "Error generating prompt: boom".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["message"], "Error generating prompt: boom");
    }

    #[test]
    fn client_messages_deserialize() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"update_form","topic":"cats"}"#).unwrap();
        let update = msg.form_update().unwrap();
        assert_eq!(update.topic.as_deref(), Some("cats"));
        assert!(update.style.is_none());

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"regenerate"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Regenerate));
        assert!(msg.form_update().is_none());

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"acknowledge_error"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::AcknowledgeError));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"quit"}"#).is_err());
    }
}
