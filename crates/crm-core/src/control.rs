//! Pause, resume and cancel requests against the shared progress record.
//!
//! A running import only polls the record, so these operations need nothing
//! but a [`ProgressStore`]. Callers that never run an import themselves (the
//! CLI control commands, for instance) use [`ImportControl`] directly.

use crate::progress::{ImportProgress, ProgressPatch};
use crate::progress_store::ProgressStore;

/// Control surface for the import tracked by a progress store.
#[derive(Debug, Clone)]
pub struct ImportControl<P> {
    progress: P,
}

impl<P: ProgressStore> ImportControl<P> {
    pub fn new(progress: P) -> Self {
        Self { progress }
    }

    /// Returns the current progress snapshot.
    pub async fn progress(&self) -> ImportProgress {
        self.progress.read().await
    }

    /// Requests a pause. No-op unless a run is active and not cancelled.
    pub async fn pause(&self) -> ImportProgress {
        let current = self.progress.read().await;
        if !current.can_pause() || current.is_paused {
            return current;
        }

        let message = format!(
            "Paused at {}/{}",
            current.processed_totally, current.total_to_process
        );
        self.progress
            .update(ProgressPatch::new().paused(true).status_message(message))
            .await
    }

    /// Lifts a pause. No-op unless currently paused.
    pub async fn resume(&self) -> ImportProgress {
        let current = self.progress.read().await;
        if !current.is_paused {
            return current;
        }

        let message = format!(
            "Resuming at {}/{}",
            current.processed_totally, current.total_to_process
        );
        self.progress
            .update(ProgressPatch::new().paused(false).status_message(message))
            .await
    }

    /// Requests cancellation of the active run. Idempotent; no-op when idle.
    ///
    /// The running loop observes the flag at its next check point and sets
    /// `phase = cancelled`.
    pub async fn cancel(&self) -> ImportProgress {
        let current = self.progress.read().await;
        if !current.is_running {
            return current;
        }

        self.progress
            .update(
                ProgressPatch::new()
                    .cancelled(true)
                    .running(false)
                    .paused(false)
                    .status_message("Cancellation requested"),
            )
            .await
    }

    /// Overwrites the progress record with defaults.
    ///
    /// Meant for clearing a record left `running` by a process that died.
    pub async fn reset(&self) -> ImportProgress {
        self.progress.reset().await
    }
}
