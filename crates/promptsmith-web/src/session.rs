//! Per-user sessions and the registry that isolates them.
//!
//! Each [`Session`] owns its own [`Controller`] (and therefore its own
//! history ledger) behind a `std::sync::Mutex`. The lock is held only to
//! start and finish an action, never across the outbound call, so
//! snapshots stay readable while a generation is in flight and a second
//! trigger is answered with [`TriggerError::Busy`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::FutureExt;
use promptsmith::controller::{Action, Controller, FormUpdate, Outcome, Phase};
use promptsmith::error::TriggerError;
use promptsmith::export::{ExportedDocument, export_result};
use promptsmith::{GenerationError, TextGenerator};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broadcast::SessionEvent;
use crate::snapshot::SessionSnapshot;

/// One user's interaction state.
pub struct Session {
    id: Uuid,
    controller: Mutex<Controller>,
    events: broadcast::Sender<SessionEvent>,
    last_seen: Mutex<Instant>,
}

impl Session {
    pub fn new(id: Uuid, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            id,
            controller: Mutex::new(Controller::new()),
            events,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Poisoning only means a panic happened mid-update; the controller's
    /// fields are still individually valid.
    fn lock(&self) -> MutexGuard<'_, Controller> {
        self.controller.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record client activity; idle eviction counts from the latest touch.
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    /// A session with a connected WebSocket client or a generation in
    /// flight is never evicted, however long it has been idle.
    fn is_active(&self) -> bool {
        self.events.receiver_count() > 0 || self.lock().phase() == Phase::AwaitingResponse
    }

    /// Receive this session's events (WebSocket clients).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Send an event to every subscriber. No subscribers is fine.
    pub fn broadcast(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let controller = self.lock();
        SessionSnapshot::from_controller(self.id, &controller)
    }

    fn broadcast_snapshot(&self) {
        self.broadcast(SessionEvent::Snapshot {
            data: self.snapshot(),
        });
    }

    /// Change live form values without triggering anything.
    pub fn update_form(&self, update: FormUpdate) -> SessionSnapshot {
        let snapshot = {
            let mut controller = self.lock();
            controller.form.apply(update);
            SessionSnapshot::from_controller(self.id, &controller)
        };
        self.broadcast(SessionEvent::Snapshot {
            data: snapshot.clone(),
        });
        snapshot
    }

    /// Apply `update` (if any) and run `action` against `generator`.
    ///
    /// Prefer [`Session::trigger_detached`] from request handlers: if this
    /// future is dropped while awaiting the generator, the session stays
    /// in `AwaitingResponse`.
    pub async fn trigger(
        &self,
        action: Action,
        update: FormUpdate,
        generator: &dyn TextGenerator,
    ) -> Result<Outcome, TriggerError> {
        let pending = {
            let mut controller = self.lock();
            if controller.phase() == Phase::AwaitingResponse {
                return Err(TriggerError::Busy);
            }
            if !update.is_empty() {
                controller.form.apply(update);
            }
            controller.begin(action)?
        };

        let Some(pending) = pending else {
            return Ok(Outcome::Ignored);
        };

        self.broadcast(SessionEvent::Phase {
            phase: Phase::AwaitingResponse,
        });

        let answer = AssertUnwindSafe(generator.generate(pending.instruction()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                warn!(session = %self.id, "generator panicked");
                Err(GenerationError::transport(format!(
                    "generation task failed: {}",
                    panic_message(panic.as_ref())
                )))
            });

        let (outcome, text) = {
            let mut controller = self.lock();
            let outcome = controller.complete(pending, answer);
            let text = controller.current().map(|r| r.generated_text.clone());
            (outcome, text)
        };

        self.announce(&outcome, text);
        Ok(outcome)
    }

    fn announce(&self, outcome: &Outcome, text: Option<String>) {
        match outcome {
            Outcome::Displayed { version } => {
                self.broadcast(SessionEvent::Generated {
                    version: *version,
                    text: text.unwrap_or_default(),
                });
            }
            Outcome::Failed { message } => {
                self.broadcast(SessionEvent::Failed {
                    message: message.clone(),
                });
            }
            Outcome::Ignored => {}
        }
        self.broadcast_snapshot();
    }

    /// Run [`Session::trigger`] on its own task so that a disconnecting
    /// client cannot strand the session mid-generation.
    pub async fn trigger_detached(
        self: &Arc<Self>,
        action: Action,
        update: FormUpdate,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Outcome, TriggerError> {
        let session = Arc::clone(self);
        let task =
            tokio::spawn(async move { session.trigger(action, update, generator.as_ref()).await });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(session = %self.id, "generation task failed: {e}");
                let outcome = self.lock().abandon(&format!("generation task failed: {e}"));
                self.announce(&outcome, None);
                Ok(outcome)
            }
        }
    }

    /// Dismiss a shown error so the session reads as idle again.
    pub fn acknowledge_error(&self) -> SessionSnapshot {
        let snapshot = {
            let mut controller = self.lock();
            controller.acknowledge_error();
            SessionSnapshot::from_controller(self.id, &controller)
        };
        self.broadcast(SessionEvent::Snapshot {
            data: snapshot.clone(),
        });
        snapshot
    }

    /// Render the current result (`None`) or a ledger version as PDF.
    pub fn export(&self, version: Option<usize>) -> Option<ExportedDocument> {
        let controller = self.lock();
        let result = match version {
            Some(v) => controller.ledger().get(v),
            None => controller.current(),
        }?;
        Some(export_result(result))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "panic"
    }
}

/// All live sessions, keyed by id.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Arc<Session>>>,
    event_capacity: usize,
}

impl SessionRegistry {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            event_capacity,
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<Session>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new, empty session.
    pub fn create(&self) -> Arc<Session> {
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, self.event_capacity));
        self.map().insert(id, Arc::clone(&session));
        info!(session = %id, "Session started");
        session
    }

    /// Look up a session and mark it as recently used.
    pub fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        let session = self.map().get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// End a session; its history goes with it.
    pub fn remove(&self, id: &Uuid) -> bool {
        let removed = self.map().remove(id).is_some();
        if removed {
            info!(session = %id, "Session ended");
        }
        removed
    }

    /// Drop sessions untouched for longer than `max_idle`. Returns how many
    /// were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut map = self.map();
        let before = map.len();
        map.retain(|id, session| {
            let keep = session.is_active() || session.idle_for() <= max_idle;
            if !keep {
                info!(session = %id, "Session expired");
            }
            keep
        });
        before - map.len()
    }

    /// Periodically evict idle sessions until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, max_idle: Duration) -> JoinHandle<()> {
        let registry = Arc::downgrade(self);
        let period = (max_idle / 2).clamp(Duration::from_millis(10), Duration::from_secs(60));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle(max_idle);
                if evicted > 0 {
                    debug!("Evicted {evicted} idle sessions, {} remain", registry.len());
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}
