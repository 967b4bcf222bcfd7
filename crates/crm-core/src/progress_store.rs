//! Durable storage for the import progress record.
//!
//! Backends only implement [`ProgressStore::load`] and [`ProgressStore::save`].
//! The operations the pipeline uses ([`read`](ProgressStore::read),
//! [`write`](ProgressStore::write), [`update`](ProgressStore::update),
//! [`reset`](ProgressStore::reset)) are provided on top of them and never fail:
//! a broken backend is logged and the import carries on with stale progress.
//!
//! Writers are not serialized. Concurrent `update` calls are last-writer-wins
//! per record, which is why the pipeline writes absolute counter values.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::AppError;
use crate::config::default_progress_path;
use crate::progress::{ImportProgress, ProgressPatch};

/// Persistence for the single [`ImportProgress`] record.
pub trait ProgressStore: Send + Sync + Clone {
    /// Loads the stored record, `Ok(None)` if nothing was ever written.
    fn load(&self) -> impl Future<Output = Result<Option<ImportProgress>, AppError>> + Send;

    /// Replaces the stored record.
    fn save(&self, progress: &ImportProgress) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Returns the current record, or defaults when none exists or it cannot be read.
    fn read(&self) -> impl Future<Output = ImportProgress> + Send {
        async move {
            match self.load().await {
                Ok(Some(progress)) => progress,
                Ok(None) => ImportProgress::default(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read import progress, using defaults");
                    ImportProgress::default()
                }
            }
        }
    }

    /// Stamps `last_updated_at` and persists the record.
    ///
    /// Returns the stamped record whether or not the save succeeded.
    fn write(&self, mut progress: ImportProgress) -> impl Future<Output = ImportProgress> + Send {
        async move {
            progress.last_updated_at = Utc::now();
            if let Err(e) = self.save(&progress).await {
                tracing::warn!(error = %e, phase = %progress.phase, "Failed to persist import progress");
            }
            progress
        }
    }

    /// Merges `patch` into the current record, recomputes the percentage and persists it.
    ///
    /// If the stored record cannot be loaded nothing is saved, so the stored
    /// record goes stale instead of being overwritten by a patched default.
    /// The merged snapshot is still returned.
    fn update(&self, patch: ProgressPatch) -> impl Future<Output = ImportProgress> + Send {
        async move {
            match self.load().await {
                Ok(stored) => {
                    let mut progress = stored.unwrap_or_default();
                    patch.apply(&mut progress);
                    self.write(progress).await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read import progress, skipping update");
                    let mut progress = ImportProgress::default();
                    patch.apply(&mut progress);
                    progress.last_updated_at = Utc::now();
                    progress
                }
            }
        }
    }

    /// Overwrites the record with defaults.
    fn reset(&self) -> impl Future<Output = ImportProgress> + Send {
        async move { self.write(ImportProgress::default()).await }
    }
}

/// Progress record kept as a JSON file.
///
/// Saves go to a uniquely named sibling file that is then renamed over the
/// target, so a reader in another process sees either the old or the new
/// record, never a partial one.
///
/// # Examples
///
/// ```no_run
/// use crm_core::progress_store::{FileProgressStore, ProgressStore};
///
/// # async fn example() {
/// let store = FileProgressStore::new("/tmp/crm-sync/import-progress.json");
/// let progress = store.read().await;
/// println!("{}: {}%", progress.phase, progress.percent_complete);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: Arc<PathBuf>,
}

impl FileProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    /// Store at the platform data directory (`~/.local/share/crm-sync/import-progress.json`).
    pub fn at_default_location() -> Result<Self, AppError> {
        default_progress_path().map(Self::new).ok_or_else(|| {
            AppError::ConfigError("Cannot determine a data directory for progress".to_string())
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "progress".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
    }
}

impl ProgressStore for FileProgressStore {
    async fn load(&self) -> Result<Option<ImportProgress>, AppError> {
        let bytes = match tokio::fs::read(self.path.as_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::ProgressStoreError(format!(
                    "cannot read '{}': {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let progress = serde_json::from_slice(&bytes)?;
        Ok(Some(progress))
    }

    async fn save(&self, progress: &ImportProgress) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(progress)?;
        let temp = self.temp_path();

        tokio::fs::write(&temp, &json).await?;
        if let Err(e) = tokio::fs::rename(&temp, self.path.as_path()).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(AppError::ProgressStoreError(format!(
                "cannot replace '{}': {}",
                self.path.display(),
                e
            )));
        }

        Ok(())
    }
}
