//! Import events for logging and UI feedback.
//!
//! The import service emits [`ImportEvent`]s at its milestones. Frontends
//! choose a reporter: the CLI and server log through [`TracingReporter`],
//! tests usually pass [`SilentReporter`].

use tracing::{error, info, warn};

use crate::sync::{ImportStats, SyncOutcome};

/// Milestones of a bulk import.
#[derive(Debug, Clone)]
pub enum ImportEvent<'a> {
    /// A run started and the progress record was reset.
    Started,
    /// A page of contacts was fetched.
    PageFetched {
        page: u32,
        page_size: usize,
        collected: u64,
    },
    /// Collection finished; processing is about to start.
    CollectionFinished { total: u64 },
    /// Collection aborted.
    CollectionFailed { page: u32, error: &'a str },
    /// A contact could not be processed; the run continues.
    ContactFailed {
        external_id: Option<&'a str>,
        error: &'a str,
    },
    /// A contact was classified.
    ContactProcessed {
        processed: u64,
        total: u64,
        outcome: SyncOutcome,
    },
    /// The processor observed a pause request and is waiting.
    Paused { processed: u64 },
    /// The processor resumed after a pause.
    Resumed { processed: u64 },
    /// The run stopped early.
    Cancelled { processed: u64, stats: &'a ImportStats },
    /// The run processed every contact.
    Completed { total: u64, stats: &'a ImportStats },
}

/// Receives import events.
pub trait ImportReporter: Send + Sync {
    /// Called when an import event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: ImportEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl ImportReporter for SilentReporter {}

/// Tracing-based reporter for CLI and server logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ImportReporter for TracingReporter {
    fn report(&self, event: ImportEvent<'_>) {
        match event {
            ImportEvent::Started => {
                info!("Import started");
            }
            ImportEvent::PageFetched {
                page,
                page_size,
                collected,
            } => {
                info!(page, page_size, collected, "Fetched contact page");
            }
            ImportEvent::CollectionFinished { total } => {
                info!(total, "Collection finished");
            }
            ImportEvent::CollectionFailed { page, error } => {
                error!(page, %error, "Collection failed");
            }
            ImportEvent::ContactFailed { external_id, error } => {
                warn!(external_id = external_id.unwrap_or("-"), %error, "Contact failed");
            }
            ImportEvent::ContactProcessed { .. } => {}
            ImportEvent::Paused { processed } => {
                info!(processed, "Import paused");
            }
            ImportEvent::Resumed { processed } => {
                info!(processed, "Import resumed");
            }
            ImportEvent::Cancelled { processed, stats } => {
                info!(
                    processed,
                    created = stats.created,
                    updated = stats.updated,
                    failed = stats.failed,
                    "Import cancelled"
                );
            }
            ImportEvent::Completed { total, stats } => {
                info!(
                    total,
                    created = stats.created,
                    updated = stats.updated,
                    skipped = stats.skipped,
                    failed = stats.failed,
                    "Import completed"
                );
            }
        }
    }
}
