//! Pushes a single local client to TalkBI.
//!
//! TalkBI has no update endpoint for subscribers, so a sync replaces the
//! remote record: delete the linked subscriber (if any), create a new one,
//! and store the new `user_ns` on the client.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppError;
use crate::models::SubscriberPayload;
use crate::traits::{ClientStore, SubscriberDirectory};

/// Step of a single-client sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStage {
    /// Loading the local client.
    Lookup,
    /// Removing the previously linked subscriber.
    Delete,
    /// Creating the subscriber.
    Create,
    /// Saving the new `user_ns` locally.
    Persist,
}

impl SyncStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Lookup => "lookup",
            SyncStage::Delete => "delete",
            SyncStage::Create => "create",
            SyncStage::Persist => "persist",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of [`ClientSyncService::sync_client`].
///
/// Failures are values, not errors, so callers syncing many clients can keep going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ClientSyncResult {
    Synced {
        client_id: Uuid,
        external_id: String,
        /// The subscriber that was deleted and replaced, if any.
        replaced: Option<String>,
    },
    Failed {
        client_id: Uuid,
        stage: SyncStage,
        message: String,
    },
}

impl ClientSyncResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ClientSyncResult::Synced { .. })
    }

    fn failed(client_id: Uuid, stage: SyncStage, error: impl fmt::Display) -> Self {
        ClientSyncResult::Failed {
            client_id,
            stage,
            message: error.to_string(),
        }
    }
}

/// Service for pushing individual clients to TalkBI.
///
/// # Type Parameters
///
/// * `S` - Client store (e.g., `ClientRepository`)
/// * `D` - Subscriber directory (e.g., `TalkbiClient`)
pub struct ClientSyncService<S, D>
where
    S: ClientStore,
    D: SubscriberDirectory,
{
    clients: S,
    directory: D,
}

impl<S, D> Clone for ClientSyncService<S, D>
where
    S: ClientStore,
    D: SubscriberDirectory,
{
    fn clone(&self) -> Self {
        Self {
            clients: self.clients.clone(),
            directory: self.directory.clone(),
        }
    }
}

impl<S, D> ClientSyncService<S, D>
where
    S: ClientStore,
    D: SubscriberDirectory,
{
    pub fn new(clients: S, directory: D) -> Self {
        Self { clients, directory }
    }

    /// Creates or replaces the TalkBI subscriber for one client.
    ///
    /// # Arguments
    ///
    /// * `client_id` - Local client primary key
    ///
    /// # Returns
    ///
    /// `Synced` with the new `user_ns`, or `Failed` naming the step that broke.
    /// When a delete succeeds but the create fails, the client keeps its old
    /// (now dangling) `external_id` until the next successful sync.
    pub async fn sync_client(&self, client_id: Uuid) -> ClientSyncResult {
        let client = match self.clients.get(client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                return ClientSyncResult::failed(
                    client_id,
                    SyncStage::Lookup,
                    AppError::ClientNotFound(client_id),
                );
            }
            Err(e) => return ClientSyncResult::failed(client_id, SyncStage::Lookup, e),
        };

        let replaced = client.external_id.clone().filter(|id| !id.trim().is_empty());
        if let Some(previous) = replaced.as_deref() {
            if let Err(e) = self.directory.delete_subscriber(previous).await {
                tracing::warn!(%client_id, external_id = previous, error = %e, "Failed to delete TalkBI subscriber");
                return ClientSyncResult::failed(client_id, SyncStage::Delete, e);
            }
        }

        let payload = SubscriberPayload::from_client(&client);
        let external_id = match self.directory.create_subscriber(&payload).await {
            Ok(user_ns) => user_ns,
            Err(e) => {
                tracing::warn!(%client_id, error = %e, "Failed to create TalkBI subscriber");
                return ClientSyncResult::failed(client_id, SyncStage::Create, e);
            }
        };

        if let Err(e) = self
            .clients
            .set_external_id(client_id, Some(&external_id))
            .await
        {
            tracing::error!(%client_id, external_id = %external_id, error = %e, "Subscriber created but link not saved");
            return ClientSyncResult::failed(client_id, SyncStage::Persist, e);
        }

        tracing::info!(%client_id, external_id = %external_id, replaced = replaced.is_some(), "Client synced to TalkBI");

        ClientSyncResult::Synced {
            client_id,
            external_id,
            replaced,
        }
    }

    /// Starts a TalkBI sub-flow for a linked client.
    ///
    /// # Errors
    ///
    /// `ClientNotFound` if the client does not exist, `NotLinked` if it has no
    /// subscriber, or the transport error from TalkBI.
    pub async fn send_flow(&self, client_id: Uuid, flow_ns: &str) -> Result<(), AppError> {
        let client = self
            .clients
            .get(client_id)
            .await?
            .ok_or(AppError::ClientNotFound(client_id))?;

        let user_ns = client
            .external_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(AppError::NotLinked(client_id))?;

        self.directory.send_sub_flow(user_ns, flow_ns).await?;
        tracing::info!(%client_id, user_ns, flow_ns, "Sub-flow sent");

        Ok(())
    }
}
