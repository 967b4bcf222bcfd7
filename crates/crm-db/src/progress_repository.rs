//! Import progress stored as a JSONB row in PostgreSQL.
//!
//! Lets several server replicas and the CLI share one progress record. The
//! row is keyed so unrelated imports could coexist; the default key is
//! [`DEFAULT_PROGRESS_KEY`].

use std::path::PathBuf;
use std::sync::Arc;

use crm_core::config::{ProgressBackendKind, default_progress_path};
use crm_core::error::AppError;
use crm_core::progress::ImportProgress;
use crm_core::progress_store::{FileProgressStore, ProgressStore};
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};

/// Store key used when none is configured.
pub const DEFAULT_PROGRESS_KEY: &str = "talkbi";

/// PostgreSQL implementation of [`ProgressStore`].
///
/// Saves upsert the whole record (`ON CONFLICT DO UPDATE`), so writers follow
/// the same last-writer-wins contract as the file backend.
#[derive(Clone)]
pub struct ProgressRepository {
    pool: Pool<Postgres>,
    key: Arc<str>,
}

impl ProgressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self::with_key(pool, DEFAULT_PROGRESS_KEY)
    }

    pub fn with_key(pool: PgPool, key: &str) -> Self {
        Self {
            pool,
            key: Arc::from(key),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl ProgressStore for ProgressRepository {
    async fn load(&self) -> Result<Option<ImportProgress>, AppError> {
        let row: Option<(Json<ImportProgress>,)> = sqlx::query_as(
            r#"
            SELECT state
            FROM import_progress
            WHERE store_key = $1
            "#,
        )
        .bind(self.key.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(row.map(|(Json(progress),)| progress))
    }

    async fn save(&self, progress: &ImportProgress) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO import_progress (store_key, state, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (store_key)
            DO UPDATE SET
                state = EXCLUDED.state,
                updated_at = NOW()
            "#,
        )
        .bind(self.key.as_ref())
        .bind(Json(progress))
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(())
    }
}

/// Progress backend selected at startup.
#[derive(Clone)]
pub enum ProgressBackend {
    File(FileProgressStore),
    Postgres(ProgressRepository),
}

impl ProgressBackend {
    /// Builds the configured backend.
    ///
    /// The file backend uses `file`, falling back to the platform data
    /// directory. The PostgreSQL backend shares `pool` with the repositories.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the file backend is selected and no
    /// path can be determined.
    pub fn open(
        kind: ProgressBackendKind,
        pool: &PgPool,
        file: Option<PathBuf>,
    ) -> Result<Self, AppError> {
        match kind {
            ProgressBackendKind::Postgres => {
                let repo = ProgressRepository::new(pool.clone());
                tracing::debug!(key = repo.key(), "Using PostgreSQL progress store");
                Ok(repo.into())
            }
            ProgressBackendKind::File => {
                let path = file.or_else(default_progress_path).ok_or_else(|| {
                    AppError::ConfigError(
                        "No progress file path configured and no data directory found".to_string(),
                    )
                })?;
                tracing::debug!(path = %path.display(), "Using file progress store");
                Ok(FileProgressStore::new(path).into())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProgressBackend::File(_) => "file",
            ProgressBackend::Postgres(_) => "postgres",
        }
    }
}

impl ProgressStore for ProgressBackend {
    async fn load(&self) -> Result<Option<ImportProgress>, AppError> {
        match self {
            ProgressBackend::File(store) => store.load().await,
            ProgressBackend::Postgres(store) => store.load().await,
        }
    }

    async fn save(&self, progress: &ImportProgress) -> Result<(), AppError> {
        match self {
            ProgressBackend::File(store) => store.save(progress).await,
            ProgressBackend::Postgres(store) => store.save(progress).await,
        }
    }
}

impl From<FileProgressStore> for ProgressBackend {
    fn from(store: FileProgressStore) -> Self {
        ProgressBackend::File(store)
    }
}

impl From<ProgressRepository> for ProgressBackend {
    fn from(store: ProgressRepository) -> Self {
        ProgressBackend::Postgres(store)
    }
}
