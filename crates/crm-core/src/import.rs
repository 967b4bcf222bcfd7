//! Bulk import of TalkBI contacts into the local client table.
//!
//! # Architecture
//!
//! The [`ImportService`] is generic over three traits:
//! - [`ContactSource`] - paginated remote contacts (TalkBI)
//! - [`ClientStore`] - local client persistence
//! - [`ProgressStore`] - durable progress record shared with pollers
//!
//! A run has two stages. Collection pages through the remote API into memory,
//! writing `collected_so_far` after each page. Processing walks the collected
//! contacts in batches, upserting each one and writing counters after every
//! contact.
//!
//! # Control
//!
//! Pause, resume and cancel are flags in the progress record, so any process
//! sharing the store can flip them. The loops check the record:
//! - before every page request (cancel only; collection cannot be paused)
//! - before every contact (pause and cancel)
//!
//! A [`CancellationToken`] is checked at the same points and stops the run the
//! same way a cancel request does; the server uses it for graceful shutdown.
//!
//! # Failure handling
//!
//! A failed page request aborts collection with `phase = error` and nothing is
//! processed. A failed contact is counted in `failed_count` and the run moves
//! on. Progress store failures are logged by the store and never abort a run.

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ImportConfig;
use crate::control::ImportControl;
use crate::models::RemoteContact;
use crate::progress::{ImportPhase, ImportProgress, ProgressPatch, percent_of};
use crate::progress_store::ProgressStore;
use crate::report::{ImportEvent, ImportReporter, SilentReporter};
use crate::sync::{ContactAction, ImportStats, ImportSummary, SyncOutcome, plan_contact};
use crate::traits::{ClientStore, ContactSource};
use crate::AppError;

/// Result of the collection stage.
enum Collection {
    /// Every page was fetched.
    Complete(Vec<RemoteContact>),
    /// Stopped by a cancel request; holds what was fetched so far.
    Cancelled(Vec<RemoteContact>),
}

/// What the processor should do before touching the next contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Proceed,
    Stop,
}

/// Service driving bulk imports and their control operations.
///
/// # Type Parameters
///
/// * `C` - Contact source (e.g., `TalkbiClient`)
/// * `S` - Client store (e.g., `ClientRepository`)
/// * `P` - Progress store (e.g., `FileProgressStore`, `ProgressRepository`)
///
/// # Example
///
/// ```ignore
/// use crm_core::{ImportService, TracingReporter};
/// use tokio_util::sync::CancellationToken;
///
/// let service = ImportService::new(talkbi, clients, progress);
///
/// // Fire-and-forget: returns as soon as the run is marked as started
/// let (snapshot, handle) = service
///     .start_bulk_import(TracingReporter, CancellationToken::new())
///     .await?;
///
/// // From anywhere sharing the same progress store
/// service.pause().await;
/// service.resume().await;
/// let summary = handle.await??;
/// println!("{} created, {} updated", summary.stats.created, summary.stats.updated);
/// ```
pub struct ImportService<C, S, P>
where
    C: ContactSource,
    S: ClientStore,
    P: ProgressStore,
{
    source: C,
    clients: S,
    progress: P,
    config: ImportConfig,
}

impl<C, S, P> Clone for ImportService<C, S, P>
where
    C: ContactSource,
    S: ClientStore,
    P: ProgressStore,
{
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            clients: self.clients.clone(),
            progress: self.progress.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C, S, P> ImportService<C, S, P>
where
    C: ContactSource,
    S: ClientStore,
    P: ProgressStore,
{
    /// Creates a new import service with default configuration.
    pub fn new(source: C, clients: S, progress: P) -> Self {
        Self::with_config(source, clients, progress, ImportConfig::default())
    }

    /// Creates an import service with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `source` - Remote contact source
    /// * `clients` - Local client store
    /// * `progress` - Progress store shared with pollers and control requests
    /// * `config` - Page size, batch size, status interval, pause poll interval
    pub fn with_config(source: C, clients: S, progress: P, config: ImportConfig) -> Self {
        Self {
            source,
            clients,
            progress,
            config,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn progress_store(&self) -> &P {
        &self.progress
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Marks a run as started and spawns it in the background.
    ///
    /// Returns the freshly reset snapshot and the handle of the spawned task.
    /// Callers that only trigger the run can drop the handle.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ImportAlreadyRunning` if the progress record says a
    /// run is active.
    pub async fn start_bulk_import<R>(
        &self,
        reporter: R,
        cancel_token: CancellationToken,
    ) -> Result<
        (
            ImportProgress,
            JoinHandle<Result<ImportSummary, AppError>>,
        ),
        AppError,
    >
    where
        C: 'static,
        S: 'static,
        P: 'static,
        R: ImportReporter + 'static,
    {
        let snapshot = self.begin(&reporter).await?;
        let service = self.clone();

        let handle = tokio::spawn(async move {
            let result = service.execute(&reporter, &cancel_token).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Bulk import failed");
            }
            result
        });

        Ok((snapshot, handle))
    }

    /// Runs a complete import in the current task without progress events.
    pub async fn run_bulk_import(&self) -> Result<ImportSummary, AppError> {
        self.run_bulk_import_with_progress(&SilentReporter, CancellationToken::new())
            .await
    }

    /// Runs a complete import in the current task.
    ///
    /// # Returns
    ///
    /// A summary with `status = completed` or `status = cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ImportAlreadyRunning` if another run is active, or
    /// the fetch error that aborted collection.
    pub async fn run_bulk_import_with_progress<R: ImportReporter>(
        &self,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<ImportSummary, AppError> {
        self.begin(reporter).await?;
        self.execute(reporter, &cancel_token).await
    }

    /// Resets the record and flags it as a running collection.
    async fn begin<R: ImportReporter>(&self, reporter: &R) -> Result<ImportProgress, AppError> {
        let current = self.progress.read().await;
        if current.is_running {
            return Err(AppError::ImportAlreadyRunning);
        }

        self.progress.reset().await;
        let snapshot = self
            .progress
            .update(
                ProgressPatch::new()
                    .phase(ImportPhase::Collecting)
                    .running(true)
                    .started_at(Utc::now())
                    .status_message("Starting import"),
            )
            .await;

        reporter.report(ImportEvent::Started);
        Ok(snapshot)
    }

    async fn execute<R: ImportReporter>(
        &self,
        reporter: &R,
        cancel_token: &CancellationToken,
    ) -> Result<ImportSummary, AppError> {
        let collection = match self.collect_contacts(reporter, cancel_token).await? {
            // A cancel can land while the last page is in flight
            Collection::Complete(contacts) if self.cancel_requested(cancel_token).await => {
                Collection::Cancelled(contacts)
            }
            collection => collection,
        };

        let contacts = match collection {
            Collection::Complete(contacts) => contacts,
            Collection::Cancelled(contacts) => {
                let stats = ImportStats::new();
                self.mark_cancelled(0, contacts.len() as u64, &stats, cancel_token)
                    .await;
                reporter.report(ImportEvent::Cancelled {
                    processed: 0,
                    stats: &stats,
                });
                return Ok(ImportSummary::cancelled(contacts.len() as u64, stats));
            }
        };

        reporter.report(ImportEvent::CollectionFinished {
            total: contacts.len() as u64,
        });

        self.process_contacts(&contacts, reporter, cancel_token)
            .await
    }

    // =========================================================================
    // Collection
    // =========================================================================

    /// Pages through the contact source until no signal reports a next page.
    async fn collect_contacts<R: ImportReporter>(
        &self,
        reporter: &R,
        cancel_token: &CancellationToken,
    ) -> Result<Collection, AppError> {
        let limit = self.config.page_limit;
        let mut contacts: Vec<RemoteContact> = Vec::new();
        let mut page: u32 = 1;

        loop {
            if self.cancel_requested(cancel_token).await {
                tracing::info!(page, collected = contacts.len(), "Collection cancelled");
                return Ok(Collection::Cancelled(contacts));
            }

            let fetched = match self.source.fetch_page(page, limit).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    let message = e.to_string();
                    self.progress
                        .update(
                            ProgressPatch::new()
                                .phase(ImportPhase::Error)
                                .running(false)
                                .paused(false)
                                .finished_at(Utc::now())
                                .status_message(format!(
                                    "Failed to fetch contacts (page {}): {}",
                                    page, message
                                )),
                        )
                        .await;
                    reporter.report(ImportEvent::CollectionFailed {
                        page,
                        error: &message,
                    });
                    return Err(e);
                }
            };

            let has_next = fetched.has_next(limit);
            let page_size = fetched.contacts.len();
            contacts.extend(fetched.contacts);
            let collected = contacts.len() as u64;

            self.progress
                .update(
                    ProgressPatch::new()
                        .phase(ImportPhase::Collecting)
                        .collected_so_far(collected)
                        .status_message(format!(
                            "Collecting contacts: {} fetched (page {})",
                            collected, page
                        )),
                )
                .await;
            reporter.report(ImportEvent::PageFetched {
                page,
                page_size,
                collected,
            });

            if !has_next {
                break;
            }
            page += 1;
        }

        Ok(Collection::Complete(contacts))
    }

    // =========================================================================
    // Processing
    // =========================================================================

    /// Upserts `contacts` in order, in batches, honoring pause and cancel.
    ///
    /// Returns without processing anything if the stored record is already
    /// cancelled. Counters are left as they are; a record that has not yet
    /// reached a terminal phase is marked `cancelled`.
    pub async fn process_contacts<R: ImportReporter>(
        &self,
        contacts: &[RemoteContact],
        reporter: &R,
        cancel_token: &CancellationToken,
    ) -> Result<ImportSummary, AppError> {
        let total = contacts.len() as u64;
        let current = self.progress.read().await;
        if current.is_cancelled {
            let stats = current.stats();
            if !current.phase.is_terminal() {
                self.mark_cancelled(current.processed_totally, total, &stats, cancel_token)
                    .await;
            }
            return Ok(ImportSummary::cancelled(current.collected_so_far, stats));
        }

        self.progress
            .update(
                ProgressPatch::new()
                    .phase(ImportPhase::Processing)
                    .running(true)
                    .total_to_process(total)
                    .processed(0, 0)
                    .status_message(format!("Processing contacts: 0/{} (0%)", total)),
            )
            .await;

        let mut stats = ImportStats::new();
        let mut processed: u64 = 0;

        for (batch_index, batch) in contacts.chunks(self.config.batch_size).enumerate() {
            let mut in_batch: u64 = 0;

            for contact in batch {
                if self.wait_for_gate(processed, reporter, cancel_token).await == Gate::Stop {
                    self.mark_cancelled(processed, total, &stats, cancel_token)
                        .await;
                    reporter.report(ImportEvent::Cancelled {
                        processed,
                        stats: &stats,
                    });
                    return Ok(ImportSummary::cancelled(total, stats));
                }

                let outcome = self.process_contact(contact, reporter).await;
                stats.record(outcome);
                processed += 1;
                in_batch += 1;

                let mut patch = ProgressPatch::new()
                    .processed(processed, in_batch)
                    .stats(&stats);
                if processed % self.config.status_interval == 0 || processed == total {
                    patch = patch.status_message(format!(
                        "Processing contacts: {}/{} ({}%)",
                        processed,
                        total,
                        percent_of(processed, total)
                    ));
                }
                self.progress.update(patch).await;

                reporter.report(ImportEvent::ContactProcessed {
                    processed,
                    total,
                    outcome,
                });
            }

            tracing::debug!(
                batch = batch_index + 1,
                size = batch.len(),
                processed,
                "Batch finished"
            );
        }

        self.progress
            .update(
                ProgressPatch::new()
                    .phase(ImportPhase::Completed)
                    .running(false)
                    .paused(false)
                    .cancelled(false)
                    .finished_at(Utc::now())
                    .processed(processed, 0)
                    .stats(&stats)
                    .status_message(format!(
                        "Import completed: {} created, {} updated, {} skipped, {} failed",
                        stats.created, stats.updated, stats.skipped, stats.failed
                    )),
            )
            .await;

        reporter.report(ImportEvent::Completed {
            total,
            stats: &stats,
        });

        Ok(ImportSummary::completed(total, stats))
    }

    /// Classifies and applies a single contact. Never fails; errors become `Failed`.
    async fn process_contact<R: ImportReporter>(
        &self,
        contact: &RemoteContact,
        reporter: &R,
    ) -> SyncOutcome {
        let Some(external_id) = contact.external_id() else {
            reporter.report(ImportEvent::ContactFailed {
                external_id: None,
                error: "missing external id",
            });
            return SyncOutcome::Failed;
        };

        match self.upsert_contact(external_id, contact).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                reporter.report(ImportEvent::ContactFailed {
                    external_id: Some(external_id),
                    error: &message,
                });
                SyncOutcome::Failed
            }
        }
    }

    async fn upsert_contact(
        &self,
        external_id: &str,
        contact: &RemoteContact,
    ) -> Result<SyncOutcome, AppError> {
        let existing = self.clients.find_by_external_id(external_id).await?;
        let action = plan_contact(contact, existing.as_ref());
        let outcome = action.outcome();

        match action {
            ContactAction::Update { client_id, changes } => {
                if !changes.is_empty() {
                    self.clients
                        .update_contact_fields(client_id, &changes)
                        .await?;
                }
            }
            ContactAction::Create(new_client) => {
                self.clients.create(&new_client).await?;
            }
            ContactAction::Skip { reason } => {
                tracing::debug!(external_id, reason, "Contact skipped");
            }
            ContactAction::Reject { reason } => {
                tracing::debug!(external_id, reason, "Contact rejected");
            }
        }

        Ok(outcome)
    }

    /// Blocks while the run is paused. Returns `Stop` once a cancel is observed.
    async fn wait_for_gate<R: ImportReporter>(
        &self,
        processed: u64,
        reporter: &R,
        cancel_token: &CancellationToken,
    ) -> Gate {
        let mut paused = false;

        loop {
            if cancel_token.is_cancelled() {
                return Gate::Stop;
            }

            let progress = self.progress.read().await;
            if progress.is_cancelled {
                return Gate::Stop;
            }
            if !progress.is_paused {
                if paused {
                    reporter.report(ImportEvent::Resumed { processed });
                }
                return Gate::Proceed;
            }

            if !paused {
                paused = true;
                reporter.report(ImportEvent::Paused { processed });
            }

            tokio::select! {
                _ = cancel_token.cancelled() => return Gate::Stop,
                _ = tokio::time::sleep(self.config.pause_poll_interval) => {}
            }
        }
    }

    async fn cancel_requested(&self, cancel_token: &CancellationToken) -> bool {
        cancel_token.is_cancelled() || self.progress.read().await.is_cancelled
    }

    async fn mark_cancelled(
        &self,
        processed: u64,
        total: u64,
        stats: &ImportStats,
        cancel_token: &CancellationToken,
    ) {
        let reason = if cancel_token.is_cancelled() {
            "shutdown"
        } else {
            "request"
        };

        self.progress
            .update(
                ProgressPatch::new()
                    .phase(ImportPhase::Cancelled)
                    .running(false)
                    .paused(false)
                    .cancelled(true)
                    .finished_at(Utc::now())
                    .processed(processed, 0)
                    .stats(stats)
                    .status_message(format!(
                        "Import cancelled by {} after {} of {} contacts",
                        reason, processed, total
                    )),
            )
            .await;
    }

    // =========================================================================
    // Control surface
    // =========================================================================

    fn control(&self) -> ImportControl<P> {
        ImportControl::new(self.progress.clone())
    }

    /// Returns the current progress snapshot.
    pub async fn progress(&self) -> ImportProgress {
        self.control().progress().await
    }

    /// See [`ImportControl::pause`].
    pub async fn pause(&self) -> ImportProgress {
        self.control().pause().await
    }

    /// See [`ImportControl::resume`].
    pub async fn resume(&self) -> ImportProgress {
        self.control().resume().await
    }

    /// See [`ImportControl::cancel`].
    pub async fn cancel(&self) -> ImportProgress {
        self.control().cancel().await
    }

    /// See [`ImportControl::reset`].
    pub async fn reset(&self) -> ImportProgress {
        self.control().reset().await
    }
}
