//! Browser front-end for promptsmith.
//!
//! `promptsmith-web` provides an axum web server with a REST API for
//! driving generation sessions and a WebSocket endpoint for observing them.
//! Every browser session gets its own [`Controller`](promptsmith::controller::Controller)
//! and therefore its own history; sessions never see each other's results.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use promptsmith::{GeminiClient, config::AppConfig};
//! use promptsmith_web::{WebConfig, spawn_web};
//!
//! let config = AppConfig::from_env()?;
//! let client = Arc::new(GeminiClient::from_config(&config)?);
//!
//! let addr = spawn_web(client, WebConfig::default()).await?;
//! println!("Web UI: http://{addr}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──REST──▶ api handlers ──▶ Session (Mutex<Controller>) ──▶ TextGenerator
//!    ▲                                     │
//!    └──────── SessionEvent (WebSocket) ◀──┘
//! ```
//!
//! Generations run on their own Tokio task, so a client that disconnects
//! mid-request does not leave its session stuck awaiting a response.
//! Sessions end when the page is closed (`DELETE`) or after
//! [`WebConfig::session_idle_timeout`] without activity.

mod api;
pub mod broadcast;
mod server;
pub mod session;
pub mod snapshot;
mod ws;

pub use broadcast::{ClientMessage, SessionEvent};
pub use session::{Session, SessionRegistry};
pub use snapshot::SessionSnapshot;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use promptsmith::TextGenerator;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Directory of static files to serve instead of the built-in page.
    pub static_dir: Option<PathBuf>,
    /// Per-session WebSocket broadcast channel capacity. Default: 64.
    ///
    /// Clients that fall behind by this many messages receive a fresh
    /// snapshot to resynchronize.
    pub broadcast_capacity: usize,
    /// Sessions with no client activity for this long are ended, and their
    /// history with them. `None` keeps sessions until they are deleted.
    /// Default: 30 minutes.
    pub session_idle_timeout: Option<Duration>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            static_dir: None,
            broadcast_capacity: 64,
            session_idle_timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// `generator` is shared by every session. The server runs until the Tokio
/// runtime shuts down.
pub async fn spawn_web(
    generator: Arc<dyn TextGenerator>,
    config: WebConfig,
) -> std::io::Result<SocketAddr> {
    let sessions = Arc::new(SessionRegistry::new(config.broadcast_capacity));
    if let Some(max_idle) = config.session_idle_timeout {
        sessions.spawn_sweeper(max_idle);
    }
    let router = server::build_router(sessions, generator, config.static_dir);
    server::start_server(router, config.bind_addr).await
}
