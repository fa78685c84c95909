//! REST API endpoint handlers.
//!
//! Every route below `/api/sessions/{id}` operates on exactly one session;
//! unknown ids answer 404. Trigger routes map the controller's outcome onto
//! status codes: 200 with a snapshot, 204 for a blank topic, 409 while a
//! generation is in flight, 502 when the generator failed.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use promptsmith::TextGenerator;
use promptsmith::compose::{PromptStyle, UseCase};
use promptsmith::controller::{Action, FormUpdate, Outcome};
use promptsmith::error::TriggerError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{Session, SessionRegistry};
use crate::snapshot::{CatalogOptions, SessionSnapshot};

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    fn session(&self, id: &Uuid) -> Result<Arc<Session>, ApiError> {
        self.sessions.get(id).ok_or(ApiError::UnknownSession)
    }
}

/// Error responses, serialized as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    UnknownSession,
    NothingToExport,
    BadRequest(String),
    InvalidOption(String),
    Busy,
    Generation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownSession => (StatusCode::NOT_FOUND, "unknown session".to_string()),
            ApiError::NothingToExport => (
                StatusCode::NOT_FOUND,
                "no generated prompt to export".to_string(),
            ),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::InvalidOption(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
            ApiError::Busy => (StatusCode::CONFLICT, TriggerError::Busy.to_string()),
            ApiError::Generation(m) => (StatusCode::BAD_GATEWAY, m),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<TriggerError> for ApiError {
    fn from(e: TriggerError) -> Self {
        match e {
            TriggerError::Busy => ApiError::Busy,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Reject styles and use-cases that are not in the catalogs.
pub(crate) fn validate_form(update: &FormUpdate) -> Result<(), String> {
    if let Some(style) = &update.style {
        style.parse::<PromptStyle>()?;
    }
    if let Some(use_case) = &update.use_case {
        use_case.parse::<UseCase>()?;
    }
    Ok(())
}

/// GET /api/options: The selectable styles and use-cases.
pub async fn get_options() -> Json<CatalogOptions> {
    Json(CatalogOptions::new())
}

#[derive(Serialize)]
pub struct CreatedSession {
    pub session_id: Uuid,
}

/// POST /api/sessions: Start a session with an empty history.
pub async fn create_session(State(app): State<AppState>) -> (StatusCode, Json<CreatedSession>) {
    let session = app.sessions.create();
    (
        StatusCode::CREATED,
        Json(CreatedSession {
            session_id: session.id(),
        }),
    )
}

/// GET /api/sessions/{id}: Full session snapshot.
pub async fn get_session(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(app.session(&id)?.snapshot()))
}

/// DELETE /api/sessions/{id}: End a session and discard its history.
pub async fn delete_session(State(app): State<AppState>, Path(id): Path<Uuid>) -> StatusCode {
    if app.sessions.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// PUT /api/sessions/{id}/form: Change live form values.
pub async fn put_form(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<FormUpdate>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = app.session(&id)?;
    validate_form(&update).map_err(ApiError::InvalidOption)?;
    Ok(Json(session.update_form(update)))
}

/// POST /api/sessions/{id}/generate: Press Generate.
///
/// An optional JSON body with form fields is applied first.
pub async fn post_generate(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Response, ApiError> {
    trigger(app, id, Action::Generate, &body).await
}

/// POST /api/sessions/{id}/regenerate: Press Regenerate.
pub async fn post_regenerate(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Response, ApiError> {
    trigger(app, id, Action::Regenerate, &body).await
}

async fn trigger(
    app: AppState,
    id: Uuid,
    action: Action,
    body: &[u8],
) -> Result<Response, ApiError> {
    let session = app.session(&id)?;

    let update = if body.iter().all(u8::is_ascii_whitespace) {
        FormUpdate::default()
    } else {
        serde_json::from_slice::<FormUpdate>(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid form body: {e}")))?
    };
    validate_form(&update).map_err(ApiError::InvalidOption)?;

    let outcome = session
        .trigger_detached(action, update, Arc::clone(&app.generator))
        .await?;

    match outcome {
        Outcome::Ignored => Ok(StatusCode::NO_CONTENT.into_response()),
        Outcome::Displayed { .. } => Ok(Json(session.snapshot()).into_response()),
        Outcome::Failed { message } => Err(ApiError::Generation(message)),
    }
}

/// POST /api/sessions/{id}/acknowledge: Dismiss the shown error.
///
/// A session that is not `failed` is returned unchanged.
pub async fn post_acknowledge(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(app.session(&id)?.acknowledge_error()))
}

/// Query for GET /api/sessions/{id}/export.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// 1-based history version; the current result when absent.
    pub version: Option<usize>,
}

/// GET /api/sessions/{id}/export: Download a result as PDF.
pub async fn get_export(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let document = app
        .session(&id)?
        .export(query.version)
        .ok_or(ApiError::NothingToExport)?;

    let disposition = format!("attachment; filename=\"{}\"", document.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_validation_uses_catalogs() {
        let ok = FormUpdate {
            topic: Some("anything".into()),
            style: Some("Analytical".into()),
            use_case: Some("Marketing".into()),
        };
        assert!(validate_form(&ok).is_ok());
        assert!(validate_form(&FormUpdate::default()).is_ok());

        let bad_style = FormUpdate {
            style: Some("Whimsical".into()),
            ..Default::default()
        };
        assert!(validate_form(&bad_style).is_err());

        let bad_use_case = FormUpdate {
            use_case: Some("image generation".into()),
            ..Default::default()
        };
        assert!(validate_form(&bad_use_case).is_err());
    }

    #[test]
    fn export_query_version_is_optional() {
        let q: ExportQuery = serde_json::from_str("{}").unwrap();
        assert!(q.version.is_none());
        let q: ExportQuery = serde_json::from_str(r#"{"version":2}"#).unwrap();
        assert_eq!(q.version, Some(2));
    }
}
