//! Per-contact upsert decisions and import statistics.
//!
//! Pure business logic, decoupled from I/O: the import service looks up the
//! local record, asks [`plan_contact`] what to do, performs it, and records
//! the [`SyncOutcome`] in [`ImportStats`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Client, ContactUpdate, NewClient, RemoteContact};

/// Outcome of processing a single contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// New local client inserted
    Created,
    /// Existing client's contact fields refreshed
    Updated,
    /// Contact has no phone or email; nothing written
    Skipped,
    /// Contact could not be processed
    Failed,
}

/// Counters for an import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl ImportStats {
    /// Creates a new empty stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome, incrementing the appropriate counter.
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Skipped => self.skipped += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
    }

    /// Returns the total number of processed contacts.
    pub fn total(&self) -> u64 {
        self.created + self.updated + self.skipped + self.failed
    }

    /// Returns the number of contacts written to the database.
    pub fn successful(&self) -> u64 {
        self.created + self.updated
    }
}

/// How an import run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    /// Every collected contact was processed.
    Completed,
    /// Stopped early by a cancel request or shutdown.
    Cancelled,
}

/// Result of a bulk import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub status: ImportStatus,
    /// Contacts fetched from TalkBI.
    pub collected: u64,
    pub stats: ImportStats,
}

impl ImportSummary {
    pub fn completed(collected: u64, stats: ImportStats) -> Self {
        Self {
            status: ImportStatus::Completed,
            collected,
            stats,
        }
    }

    pub fn cancelled(collected: u64, stats: ImportStats) -> Self {
        Self {
            status: ImportStatus::Cancelled,
            collected,
            stats,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ImportStatus::Cancelled
    }
}

/// What to do with one remote contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactAction {
    /// Refresh the matched client's name, phone and email.
    Update {
        client_id: Uuid,
        changes: ContactUpdate,
    },
    /// Insert a new client.
    Create(NewClient),
    /// Leave the database untouched.
    Skip { reason: &'static str },
    /// The contact cannot be imported.
    Reject { reason: &'static str },
}

impl ContactAction {
    /// The outcome this action records when it succeeds.
    pub fn outcome(&self) -> SyncOutcome {
        match self {
            ContactAction::Update { .. } => SyncOutcome::Updated,
            ContactAction::Create(_) => SyncOutcome::Created,
            ContactAction::Skip { .. } => SyncOutcome::Skipped,
            ContactAction::Reject { .. } => SyncOutcome::Failed,
        }
    }
}

/// Decides how a remote contact maps onto the local database.
///
/// # Arguments
/// * `contact` - The contact fetched from TalkBI
/// * `existing` - The local client with the same external id, if any
///
/// # Returns
/// A [`ContactAction`]: update the match, create a new client, skip a
/// contact with no phone or email, or reject one without an external id.
pub fn plan_contact(contact: &RemoteContact, existing: Option<&Client>) -> ContactAction {
    if contact.external_id().is_none() {
        return ContactAction::Reject {
            reason: "missing external id",
        };
    }

    if let Some(client) = existing {
        return ContactAction::Update {
            client_id: client.id,
            changes: ContactUpdate::from_remote(contact),
        };
    }

    match NewClient::from_remote(contact) {
        Some(new_client) => ContactAction::Create(new_client),
        None => ContactAction::Skip {
            reason: "no phone or email",
        },
    }
}
