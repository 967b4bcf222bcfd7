//! Bulk import endpoints: start, progress and controls.
//!
//! The import itself runs in a background task; every endpoint here returns
//! the current progress snapshot immediately.

use axum::{Json, extract::State, http::StatusCode};

use crm_core::TracingReporter;

use crate::dto::ImportProgressResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// Start a bulk import from TalkBI.
///
/// Returns as soon as the run is marked as started. Poll
/// `GET /api/v1/import/progress` to follow it.
#[utoipa::path(
    post,
    path = "/api/v1/import",
    responses(
        (status = 202, description = "Import started", body = ImportProgressResponse),
        (status = 409, description = "An import is already running"),
    ),
    tag = "import"
)]
pub async fn start_import(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ImportProgressResponse>), ApiError> {
    let (snapshot, _handle) = state
        .import_service
        .start_bulk_import(TracingReporter, state.shutdown_token.child_token())
        .await?;

    tracing::info!("Bulk import started");
    Ok((StatusCode::ACCEPTED, Json(snapshot.into())))
}

/// Current import progress.
#[utoipa::path(
    get,
    path = "/api/v1/import/progress",
    responses(
        (status = 200, description = "Progress snapshot", body = ImportProgressResponse),
    ),
    tag = "import"
)]
pub async fn get_progress(State(state): State<AppState>) -> Json<ImportProgressResponse> {
    Json(state.import_service.progress().await.into())
}

/// Pause the running import before its next contact.
///
/// Has no effect when no import is running. Collection cannot be paused.
#[utoipa::path(
    post,
    path = "/api/v1/import/pause",
    responses(
        (status = 200, description = "Progress after the request", body = ImportProgressResponse),
    ),
    tag = "import"
)]
pub async fn pause_import(State(state): State<AppState>) -> Json<ImportProgressResponse> {
    Json(state.import_service.pause().await.into())
}

/// Resume a paused import.
#[utoipa::path(
    post,
    path = "/api/v1/import/resume",
    responses(
        (status = 200, description = "Progress after the request", body = ImportProgressResponse),
    ),
    tag = "import"
)]
pub async fn resume_import(State(state): State<AppState>) -> Json<ImportProgressResponse> {
    Json(state.import_service.resume().await.into())
}

/// Cancel the running import.
///
/// The run stops at its next check point; contacts already written stay.
#[utoipa::path(
    post,
    path = "/api/v1/import/cancel",
    responses(
        (status = 200, description = "Progress after the request", body = ImportProgressResponse),
    ),
    tag = "import"
)]
pub async fn cancel_import(State(state): State<AppState>) -> Json<ImportProgressResponse> {
    Json(state.import_service.cancel().await.into())
}

/// Reset the progress record.
///
/// Meant for records left `running` by a process that died.
#[utoipa::path(
    post,
    path = "/api/v1/import/reset",
    responses(
        (status = 200, description = "Fresh progress record", body = ImportProgressResponse),
    ),
    tag = "import"
)]
pub async fn reset_import(State(state): State<AppState>) -> Json<ImportProgressResponse> {
    tracing::warn!("Import progress reset");
    Json(state.import_service.reset().await.into())
}
