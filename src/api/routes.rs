//! REST endpoints for email classification.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use super::upload::extract_text;
use crate::error::InputError;
use crate::pipeline::processor::EmailProcessor;
use crate::pipeline::types::EmailAnalysis;

/// Upper bound on request bodies (uploads included).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared state for the classification routes.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<EmailProcessor>,
}

/// Build the Axum router.
pub fn app_routes(processor: Arc<EmailProcessor>) -> Router {
    let state = AppState { processor };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/processar-email/", post(process_email))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for InputError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "detail": self.to_string() })),
        )
            .into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({ "message": "API funcionando" }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "remote": state.processor.remote_enabled(),
    }))
}

/// POST /processar-email/
///
/// Multipart form with `texto` and/or `arquivo`. At least one must be
/// non-empty.
async fn process_email(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EmailAnalysis>, InputError> {
    let multipart = multipart.map_err(|e| InputError::Malformed(e.body_text()))?;
    let form = read_form(multipart).await?;

    let mut content = String::new();
    if let Some(text) = form.text {
        content.push_str(&text);
        content.push('\n');
    }
    if let Some((filename, data)) = form.file {
        debug!(filename = %filename, bytes = data.len(), "Decoding uploaded file");
        let extracted = tokio::task::spawn_blocking({
            let filename = filename.clone();
            move || extract_text(&filename, &data)
        })
        .await
        .map_err(|e| InputError::Unreadable {
            filename,
            reason: e.to_string(),
        })??;
        content.push_str(&extracted);
    }

    Ok(Json(state.processor.process(&content).await))
}

/// Fields of the classification form.
#[derive(Debug, Default)]
struct EmailForm {
    text: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

async fn read_form(mut multipart: Multipart) -> Result<EmailForm, InputError> {
    let mut form = EmailForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| InputError::Malformed(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("texto") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| InputError::Malformed(e.body_text()))?;
                if !text.is_empty() {
                    form.text = Some(text);
                }
            }
            Some("arquivo") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| InputError::Malformed(e.body_text()))?;
                // Browsers send an empty, unnamed part when no file is chosen.
                if !(filename.is_empty() && data.is_empty()) {
                    form.file = Some((filename, data.to_vec()));
                }
            }
            other => {
                debug!(field = ?other, "Ignoring unknown form field");
            }
        }
    }

    if form.text.is_none() && form.file.is_none() {
        warn!("Request carried neither text nor file");
        return Err(InputError::MissingContent);
    }
    Ok(form)
}
