//! Single-client TalkBI operations.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::dto::{ClientSyncResponse, SendFlowRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// Push one client to TalkBI.
///
/// Replaces the linked subscriber (delete then create) and stores the new
/// `user_ns`. Failures are reported in the body with the step that broke.
#[utoipa::path(
    post,
    path = "/api/v1/clients/{id}/sync",
    params(
        ("id" = Uuid, Path, description = "Client UUID")
    ),
    responses(
        (status = 200, description = "Sync outcome", body = ClientSyncResponse),
        (status = 400, description = "Invalid UUID format"),
    ),
    tag = "clients"
)]
pub async fn sync_client(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Json<ClientSyncResponse> {
    Json(state.client_sync_service.sync_client(id).await.into())
}

/// Start a TalkBI sub-flow for a linked client.
#[utoipa::path(
    post,
    path = "/api/v1/clients/{id}/send-flow",
    params(
        ("id" = Uuid, Path, description = "Client UUID")
    ),
    request_body = SendFlowRequest,
    responses(
        (status = 204, description = "Sub-flow sent"),
        (status = 400, description = "Missing flow_ns"),
        (status = 404, description = "Client not found"),
        (status = 409, description = "Client is not linked to TalkBI"),
        (status = 503, description = "TalkBI unavailable"),
    ),
    tag = "clients"
)]
pub async fn send_flow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendFlowRequest>,
) -> Result<StatusCode, ApiError> {
    let flow_ns = request
        .flow_ns()
        .ok_or_else(|| ApiError::BadRequest("flow_ns is required".to_string()))?;

    state.client_sync_service.send_flow(id, flow_ns).await?;
    Ok(StatusCode::NO_CONTENT)
}
