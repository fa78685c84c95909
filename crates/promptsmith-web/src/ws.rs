//! WebSocket upgrade handler and message dispatch.
//!
//! Each connected client receives:
//! 1. A full [`SessionSnapshot`](crate::snapshot::SessionSnapshot) on connect.
//! 2. Incremental [`SessionEvent`] updates as the session changes.
//!
//! Clients send [`ClientMessage`]s back to edit the form, press Generate or
//! Regenerate, and dismiss a shown error.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use promptsmith::TextGenerator;
use promptsmith::controller::{Action, FormUpdate};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::{AppState, validate_form};
use crate::broadcast::{ClientMessage, SessionEvent};
use crate::session::Session;

/// GET /ws/sessions/{id}: WebSocket upgrade handler.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Response {
    let Some(session) = app.sessions.get(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let generator = Arc::clone(&app.generator);
    ws.on_upgrade(move |socket| handle_socket(socket, session, generator))
}

/// Handle a single WebSocket connection.
async fn handle_socket(
    socket: WebSocket,
    session: Arc<Session>,
    generator: Arc<dyn TextGenerator>,
) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before the snapshot so nothing falls between the two.
    let mut events = session.subscribe();

    let snapshot = SessionEvent::Snapshot {
        data: session.snapshot(),
    };
    if ws_send(&mut sink, &snapshot).await.is_err() {
        return;
    }

    debug!(session = %session.id(), "WebSocket client connected");

    let resync = Arc::clone(&session);
    let forward_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(msg) => {
                    if ws_send(&mut sink, &msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged by {n} messages, resending snapshot");
                    let msg = SessionEvent::Snapshot {
                        data: resync.snapshot(),
                    };
                    if ws_send(&mut sink, &msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        session.touch();
        match msg {
            Message::Text(text) => handle_client_message(&text, &session, &generator),
            Message::Close(_) => break,
            _ => {}
        }
    }

    debug!(session = %session.id(), "WebSocket client disconnected");
    forward_task.abort();
    session.touch();
}

/// Process a JSON message received from a client.
///
/// Results and rejections reach the client as broadcast events, so nothing
/// here writes to the socket directly.
fn handle_client_message(
    text: &str,
    session: &Arc<Session>,
    generator: &Arc<dyn TextGenerator>,
) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Ignoring malformed WebSocket message: {e}");
            session.broadcast(SessionEvent::Error {
                message: format!("invalid message: {e}"),
            });
            return;
        }
    };

    let action = match msg {
        ClientMessage::UpdateForm { .. } => {
            let Some(update) = msg.form_update() else {
                return;
            };
            match validate_form(&update) {
                Ok(()) => {
                    session.update_form(update);
                }
                Err(message) => session.broadcast(SessionEvent::Error { message }),
            }
            return;
        }
        ClientMessage::AcknowledgeError => {
            session.acknowledge_error();
            return;
        }
        ClientMessage::Generate => Action::Generate,
        ClientMessage::Regenerate => Action::Regenerate,
    };

    let session = Arc::clone(session);
    let generator = Arc::clone(generator);
    tokio::spawn(async move {
        if let Err(e) = session
            .trigger_detached(action, FormUpdate::default(), generator)
            .await
        {
            session.broadcast(SessionEvent::Error {
                message: e.to_string(),
            });
        }
    });
}

/// Serialize a `SessionEvent` and send it over the WebSocket sink.
async fn ws_send(sink: &mut SplitSink<WebSocket, Message>, msg: &SessionEvent) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
