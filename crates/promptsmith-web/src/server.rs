//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::response::Html;
use axum::routing::{get, post, put};
use promptsmith::TextGenerator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::error;

use crate::api::{self, AppState};
use crate::session::SessionRegistry;
use crate::ws;

/// Single-page form served at `/` when no static directory is configured.
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Build the full axum router.
///
/// The router serves:
/// - REST API at `/api/*`
/// - WebSocket at `/ws/sessions/{id}`
/// - The built-in page at `/`, or files from `static_dir` when given
pub fn build_router(
    sessions: Arc<SessionRegistry>,
    generator: Arc<dyn TextGenerator>,
    static_dir: Option<PathBuf>,
) -> Router {
    let app_state = AppState {
        sessions,
        generator,
    };

    // CORS layer for front-ends served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/api/options", get(api::get_options))
        .route("/api/sessions", post(api::create_session))
        .route(
            "/api/sessions/{id}",
            get(api::get_session).delete(api::delete_session),
        )
        .route("/api/sessions/{id}/form", put(api::put_form))
        .route("/api/sessions/{id}/generate", post(api::post_generate))
        .route("/api/sessions/{id}/regenerate", post(api::post_regenerate))
        .route("/api/sessions/{id}/acknowledge", post(api::post_acknowledge))
        .route("/api/sessions/{id}/export", get(api::get_export))
        .route("/ws/sessions/{id}", get(ws::ws_upgrade))
        .with_state(app_state);

    router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.route("/", get(|| async { Html(INDEX_HTML) })),
    };

    router.layer(cors)
}

/// Bind `bind_addr`, start serving on a Tokio task, and return the bound
/// address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Web server stopped: {e}");
        }
    });

    Ok(addr)
}
