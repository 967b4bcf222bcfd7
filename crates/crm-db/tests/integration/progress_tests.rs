//! Integration tests for ProgressRepository.

use crm_core::progress::{ImportPhase, ImportProgress, ProgressPatch};
use crm_core::progress_store::ProgressStore;
use crm_db::{ProgressBackend, ProgressRepository};

use crate::integration::common::setup_test_db;

/// Test 1: No row reads as defaults.
#[tokio::test]
async fn test_missing_row_reads_defaults() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProgressRepository::new(pool);

    assert!(repo.load().await.unwrap().is_none());

    let progress = repo.read().await;
    assert_eq!(progress.phase, ImportPhase::Idle);
    assert!(!progress.is_running);
}

/// Test 2: Writes upsert the same row and survive a new repository instance.
#[tokio::test]
async fn test_update_roundtrip() {
    let (pool, _container) = setup_test_db().await;
    let repo = ProgressRepository::new(pool.clone());

    repo.update(
        ProgressPatch::new()
            .phase(ImportPhase::Processing)
            .running(true)
            .total_to_process(200)
            .processed(50, 50)
            .status_message("Processing contacts: 50/200 (25%)"),
    )
    .await;
    repo.update(ProgressPatch::new().paused(true)).await;

    let reopened = ProgressRepository::new(pool.clone());
    let progress = reopened.read().await;
    assert_eq!(progress.phase, ImportPhase::Processing);
    assert_eq!(progress.processed_totally, 50);
    assert_eq!(progress.percent_complete, 25);
    assert!(progress.is_paused);

    let rows: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM import_progress")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows.0, 1);
}

/// Test 3: Different keys keep separate records.
#[tokio::test]
async fn test_keys_are_isolated() {
    let (pool, _container) = setup_test_db().await;
    let talkbi = ProgressRepository::new(pool.clone());
    let other = ProgressRepository::with_key(pool, "other");

    talkbi
        .update(ProgressPatch::new().phase(ImportPhase::Collecting).running(true))
        .await;

    let untouched: ImportProgress = other.read().await;
    assert!(talkbi.read().await.is_running);
    assert_eq!(untouched.phase, ImportPhase::Idle);
    assert!(!untouched.is_running);
    assert!(other.load().await.unwrap().is_none());
    assert_eq!(other.key(), "other");
}

/// Test 4: Reset overwrites the stored record through the backend enum.
#[tokio::test]
async fn test_backend_reset() {
    let (pool, _container) = setup_test_db().await;
    let backend = ProgressBackend::from(ProgressRepository::new(pool));

    backend
        .update(
            ProgressPatch::new()
                .phase(ImportPhase::Error)
                .status_message("Failed to fetch contacts (page 3): HTTP 500"),
        )
        .await;
    let reset = backend.reset().await;

    assert_eq!(backend.name(), "postgres");
    assert_eq!(reset.phase, ImportPhase::Idle);
    assert_eq!(backend.read().await.status_message, reset.status_message);
}
