//! Response DTOs for API endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crm_core::{ClientSyncResult, ImportProgress};

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Server version
    pub version: String,
    /// Database connectivity status
    pub database: ServiceStatus,
    /// Progress backend in use ("file" or "postgres")
    pub progress_backend: String,
}

/// Status of an individual service component.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    /// Whether the service is reachable
    pub healthy: bool,
    /// Optional message (e.g., error details)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Import
// =============================================================================

/// Snapshot of the bulk import, as polled by the UI.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgressResponse {
    /// One of idle, collecting, processing, completed, error, cancelled
    #[schema(example = "processing")]
    pub phase: String,
    pub status_message: String,
    /// Contacts fetched so far during collection
    pub collected_so_far: u64,
    pub total_to_process: u64,
    pub processed_totally: u64,
    /// Position inside the current batch
    pub processed_in_current_batch: u64,
    pub created_count: u64,
    pub updated_count: u64,
    pub skipped_count: u64,
    pub failed_count: u64,
    /// 0 to 100
    pub percent_complete: u8,
    pub is_running: bool,
    pub is_paused: bool,
    pub is_cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
}

impl From<ImportProgress> for ImportProgressResponse {
    fn from(p: ImportProgress) -> Self {
        Self {
            phase: p.phase.as_str().to_string(),
            status_message: p.status_message,
            collected_so_far: p.collected_so_far,
            total_to_process: p.total_to_process,
            processed_totally: p.processed_totally,
            processed_in_current_batch: p.processed_in_current_batch,
            created_count: p.created_count,
            updated_count: p.updated_count,
            skipped_count: p.skipped_count,
            failed_count: p.failed_count,
            percent_complete: p.percent_complete,
            is_running: p.is_running,
            is_paused: p.is_paused,
            is_cancelled: p.is_cancelled,
            started_at: p.started_at,
            finished_at: p.finished_at,
            last_updated_at: p.last_updated_at,
        }
    }
}

// =============================================================================
// Clients
// =============================================================================

/// Outcome of pushing one client to TalkBI.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClientSyncResponse {
    /// "synced" or "failed"
    pub status: String,
    pub client_id: Uuid,
    /// New TalkBI `user_ns` when synced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Subscriber that was deleted and replaced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced: Option<String>,
    /// Failed step: lookup, delete, create or persist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<ClientSyncResult> for ClientSyncResponse {
    fn from(result: ClientSyncResult) -> Self {
        match result {
            ClientSyncResult::Synced {
                client_id,
                external_id,
                replaced,
            } => Self {
                status: "synced".to_string(),
                client_id,
                external_id: Some(external_id),
                replaced,
                stage: None,
                message: None,
            },
            ClientSyncResult::Failed {
                client_id,
                stage,
                message,
            } => Self {
                status: "failed".to_string(),
                client_id,
                external_id: None,
                replaced: None,
                stage: Some(stage.as_str().to_string()),
                message: Some(message),
            },
        }
    }
}
