//! Import progress record and the partial updates applied to it.
//!
//! A single [`ImportProgress`] describes the current (or last) bulk import.
//! It is persisted by a [`ProgressStore`](crate::progress_store::ProgressStore)
//! and polled by the UI, so its JSON shape uses camelCase field names.
//!
//! ```text
//! idle → collecting → processing → completed
//!            ↓            ↓
//!          error      cancelled
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::ImportStats;

// =============================================================================
// Import Phase
// =============================================================================

/// Lifecycle phase of a bulk import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPhase {
    /// No import has run since the last reset.
    #[default]
    Idle,
    /// Fetching contact pages from TalkBI.
    Collecting,
    /// Upserting collected contacts into the local database.
    Processing,
    /// Every collected contact was processed.
    Completed,
    /// The fetch aborted; nothing was processed.
    Error,
    /// Stopped on request before finishing.
    Cancelled,
}

impl ImportPhase {
    /// Returns the string representation for storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportPhase::Idle => "idle",
            ImportPhase::Collecting => "collecting",
            ImportPhase::Processing => "processing",
            ImportPhase::Completed => "completed",
            ImportPhase::Error => "error",
            ImportPhase::Cancelled => "cancelled",
        }
    }

    /// Returns true if the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportPhase::Completed | ImportPhase::Error | ImportPhase::Cancelled
        )
    }
}

/// Error type for parsing ImportPhase from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseImportPhaseError(String);

impl fmt::Display for ParseImportPhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid import phase: {}", self.0)
    }
}

impl std::error::Error for ParseImportPhaseError {}

impl FromStr for ImportPhase {
    type Err = ParseImportPhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(ImportPhase::Idle),
            "collecting" => Ok(ImportPhase::Collecting),
            "processing" => Ok(ImportPhase::Processing),
            "completed" => Ok(ImportPhase::Completed),
            "error" => Ok(ImportPhase::Error),
            "cancelled" => Ok(ImportPhase::Cancelled),
            _ => Err(ParseImportPhaseError(s.to_string())),
        }
    }
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Import Progress
// =============================================================================

/// Snapshot of one import run.
///
/// Invariants maintained by the pipeline:
/// - `created + updated + failed + skipped == processed_totally`
/// - `processed_totally <= total_to_process` once the total is known
/// - `is_cancelled` implies `!is_running`; `is_paused` implies `is_running`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgress {
    pub collected_so_far: u64,
    pub total_to_process: u64,
    pub processed_in_current_batch: u64,
    pub processed_totally: u64,
    pub created_count: u64,
    pub updated_count: u64,
    pub failed_count: u64,
    #[serde(default)]
    pub skipped_count: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub is_cancelled: bool,
    pub status_message: String,
    pub phase: ImportPhase,
    pub percent_complete: u8,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
}

impl Default for ImportProgress {
    fn default() -> Self {
        Self {
            collected_so_far: 0,
            total_to_process: 0,
            processed_in_current_batch: 0,
            processed_totally: 0,
            created_count: 0,
            updated_count: 0,
            failed_count: 0,
            skipped_count: 0,
            is_running: false,
            is_paused: false,
            is_cancelled: false,
            status_message: String::new(),
            phase: ImportPhase::Idle,
            percent_complete: 0,
            started_at: None,
            finished_at: None,
            last_updated_at: Utc::now(),
        }
    }
}

impl ImportProgress {
    /// Percentage implied by the phase and counters.
    ///
    /// 0 until processing starts, the processed ratio while processing,
    /// 100 once the run has ended for any reason.
    pub fn derived_percent(&self) -> u8 {
        match self.phase {
            ImportPhase::Idle | ImportPhase::Collecting => 0,
            ImportPhase::Processing => percent_of(self.processed_totally, self.total_to_process),
            ImportPhase::Completed | ImportPhase::Error | ImportPhase::Cancelled => 100,
        }
    }

    /// Refreshes `percent_complete` from the other fields.
    pub fn recompute_percent(&mut self) {
        self.percent_complete = self.derived_percent();
    }

    /// Counter totals as [`ImportStats`].
    pub fn stats(&self) -> ImportStats {
        ImportStats {
            created: self.created_count,
            updated: self.updated_count,
            skipped: self.skipped_count,
            failed: self.failed_count,
        }
    }

    /// True while pause is meaningful: running and not cancelled.
    pub fn can_pause(&self) -> bool {
        self.is_running && !self.is_cancelled
    }

    /// Checks the counter relationships the pipeline promises to keep.
    pub fn counters_consistent(&self) -> bool {
        let classified = self.created_count + self.updated_count + self.failed_count;
        let within_total =
            self.total_to_process == 0 || self.processed_totally <= self.total_to_process;
        classified <= self.processed_totally && within_total
    }
}

/// `done / total` as a rounded percentage, 0 when `total` is 0.
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let ratio = done as f64 / total as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

// =============================================================================
// Progress Patch
// =============================================================================

/// A partial update merged into the stored [`ImportProgress`].
///
/// Only the fields set on the patch are written; everything else keeps the
/// stored value. Counters are absolute values so repeated merges are idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressPatch {
    pub collected_so_far: Option<u64>,
    pub total_to_process: Option<u64>,
    pub processed_in_current_batch: Option<u64>,
    pub processed_totally: Option<u64>,
    pub created_count: Option<u64>,
    pub updated_count: Option<u64>,
    pub failed_count: Option<u64>,
    pub skipped_count: Option<u64>,
    pub is_running: Option<bool>,
    pub is_paused: Option<bool>,
    pub is_cancelled: Option<bool>,
    pub status_message: Option<String>,
    pub phase: Option<ImportPhase>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProgressPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(mut self, phase: ImportPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn status_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn collected_so_far(mut self, count: u64) -> Self {
        self.collected_so_far = Some(count);
        self
    }

    pub fn total_to_process(mut self, count: u64) -> Self {
        self.total_to_process = Some(count);
        self
    }

    pub fn processed(mut self, totally: u64, in_current_batch: u64) -> Self {
        self.processed_totally = Some(totally);
        self.processed_in_current_batch = Some(in_current_batch);
        self
    }

    /// Sets all four outcome counters from `stats`.
    pub fn stats(mut self, stats: &ImportStats) -> Self {
        self.created_count = Some(stats.created);
        self.updated_count = Some(stats.updated);
        self.failed_count = Some(stats.failed);
        self.skipped_count = Some(stats.skipped);
        self
    }

    pub fn running(mut self, running: bool) -> Self {
        self.is_running = Some(running);
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.is_paused = Some(paused);
        self
    }

    pub fn cancelled(mut self, cancelled: bool) -> Self {
        self.is_cancelled = Some(cancelled);
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn finished_at(mut self, at: DateTime<Utc>) -> Self {
        self.finished_at = Some(at);
        self
    }

    /// Merges the set fields into `progress` and recomputes the percentage.
    pub fn apply(self, progress: &mut ImportProgress) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    progress.$field = value;
                })*
            };
        }

        merge!(
            collected_so_far,
            total_to_process,
            processed_in_current_batch,
            processed_totally,
            created_count,
            updated_count,
            failed_count,
            skipped_count,
            is_running,
            is_paused,
            is_cancelled,
            status_message,
            phase,
        );

        if let Some(at) = self.started_at {
            progress.started_at = Some(at);
        }
        if let Some(at) = self.finished_at {
            progress.finished_at = Some(at);
        }

        progress.recompute_percent();
    }
}
