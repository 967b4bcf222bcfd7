//! Integration tests for ImportService: collection, processing and progress.

use std::sync::Arc;

use crm_core::{
    AppError, ImportPhase, ImportService, ImportStatus, ProgressStore, RemoteContact,
    SilentReporter,
};
use tokio_util::sync::CancellationToken;

use crate::integration::common::{
    InMemoryProgressStore, MockClientStore, MockContactSource, contacts, test_config,
};

type TestService = ImportService<MockContactSource, MockClientStore, InMemoryProgressStore>;

fn service(
    source: MockContactSource,
    store: MockClientStore,
    progress: InMemoryProgressStore,
) -> TestService {
    ImportService::with_config(source, store, progress, test_config())
}

/// Test 1: three new contacts with phones are created and the run completes.
#[tokio::test]
async fn test_import_creates_new_contacts() {
    // Arrange
    let store = MockClientStore::new();
    let progress = InMemoryProgressStore::new();
    let service = service(MockContactSource::new(contacts(3)), store.clone(), progress.clone());

    // Act
    let summary = service.run_bulk_import().await.unwrap();

    // Assert
    assert_eq!(summary.status, ImportStatus::Completed);
    assert_eq!(summary.stats.created, 3);
    assert_eq!(summary.stats.updated, 0);
    assert_eq!(store.len(), 3);

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.phase, ImportPhase::Completed);
    assert_eq!(snapshot.percent_complete, 100);
    assert_eq!(snapshot.created_count, 3);
    assert_eq!(snapshot.processed_totally, 3);
    assert_eq!(snapshot.total_to_process, 3);
    assert!(!snapshot.is_running);
    assert!(snapshot.started_at.is_some());
    assert!(snapshot.finished_at.is_some());
}

/// Test 2: a second run over the same contacts only updates.
#[tokio::test]
async fn test_import_is_idempotent() {
    let store = MockClientStore::new();
    let progress = InMemoryProgressStore::new();
    let service = service(MockContactSource::new(contacts(3)), store.clone(), progress.clone());

    service.run_bulk_import().await.unwrap();
    let second = service.run_bulk_import().await.unwrap();

    assert_eq!(second.stats.created, 0);
    assert_eq!(second.stats.updated, 3);
    assert_eq!(store.len(), 3);
    assert_eq!(store.create_calls(), 3);
    assert_eq!(progress.snapshot().updated_count, 3);
}

/// Test 3: a contact with no phone or email is skipped but counted as processed.
#[tokio::test]
async fn test_contact_without_channel_is_skipped() {
    let mut remote = contacts(2);
    remote.push(RemoteContact {
        user_ns: Some("sub-silent".to_string()),
        name: Some("No Channel".to_string()),
        ..RemoteContact::default()
    });

    let store = MockClientStore::new();
    let progress = InMemoryProgressStore::new();
    let service = service(MockContactSource::new(remote), store.clone(), progress.clone());

    let summary = service.run_bulk_import().await.unwrap();

    assert_eq!(summary.stats.created, 2);
    assert_eq!(summary.stats.skipped, 1);
    assert!(store.by_external_id("sub-silent").is_none());

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.processed_totally, 3);
    assert_eq!(snapshot.skipped_count, 1);
    assert_eq!(snapshot.created_count + snapshot.updated_count + snapshot.failed_count, 2);
}

/// Test 4: contacts without an external id and lookup errors count as failed.
#[tokio::test]
async fn test_failed_contacts_do_not_stop_the_run() {
    let mut remote = contacts(3);
    remote.push(RemoteContact {
        user_ns: None,
        phone: Some("11999990000".to_string()),
        ..RemoteContact::default()
    });

    let store = MockClientStore::new();
    store.fail_lookup_for("sub-1");
    let progress = InMemoryProgressStore::new();
    let service = service(MockContactSource::new(remote), store.clone(), progress.clone());

    let summary = service.run_bulk_import().await.unwrap();

    assert_eq!(summary.status, ImportStatus::Completed);
    assert_eq!(summary.stats.created, 2);
    assert_eq!(summary.stats.failed, 2);
    assert_eq!(progress.snapshot().failed_count, 2);
    assert_eq!(progress.snapshot().phase, ImportPhase::Completed);
}

/// Test 5: an existing client only gets name/phone/email refreshed.
#[tokio::test]
async fn test_update_preserves_local_fields() {
    let store = MockClientStore::new();
    let existing = store.seed("Old Name", Some("sub-0"));

    let remote = vec![RemoteContact {
        user_ns: Some("sub-0".to_string()),
        name: Some("New Name".to_string()),
        phone: Some("+55 21 98888-7777".to_string()),
        ..RemoteContact::default()
    }];

    let progress = InMemoryProgressStore::new();
    let service = service(MockContactSource::new(remote), store.clone(), progress);

    let summary = service.run_bulk_import().await.unwrap();
    assert_eq!(summary.stats.updated, 1);

    let updated = store.by_id(existing.id).unwrap();
    assert_eq!(updated.name, "New Name");
    assert_eq!(updated.phone.as_deref(), Some("+55 21 98888-7777"));
    // absent remote email does not wipe the stored one
    assert_eq!(updated.email, existing.email);
    assert_eq!(updated.document, existing.document);
    assert_eq!(updated.segment, existing.segment);
}

/// Test 6: 250 contacts with a page limit of 100 take three fetches.
#[tokio::test]
async fn test_pagination_progression() {
    let source = MockContactSource::new(contacts(250));
    let progress = InMemoryProgressStore::new();
    let service = service(source.clone(), MockClientStore::new(), progress.clone());

    let summary = service.run_bulk_import().await.unwrap();

    assert_eq!(source.pages(), vec![1, 2, 3]);
    assert_eq!(summary.collected, 250);

    let mut collected: Vec<u64> = progress
        .history()
        .iter()
        .filter(|p| p.phase == ImportPhase::Collecting && p.collected_so_far > 0)
        .map(|p| p.collected_so_far)
        .collect();
    collected.dedup();
    assert_eq!(collected, vec![100, 200, 250]);
}

/// Test 7: `links.next` alone keeps pagination going.
#[tokio::test]
async fn test_pagination_follows_next_link() {
    let source = MockContactSource::new(contacts(120)).links_only();
    let service = service(
        source.clone(),
        MockClientStore::new(),
        InMemoryProgressStore::new(),
    );

    let summary = service.run_bulk_import().await.unwrap();

    assert_eq!(source.pages(), vec![1, 2]);
    assert_eq!(summary.stats.created, 120);
}

/// Test 8: without meta or links a full page still triggers another request.
#[tokio::test]
async fn test_pagination_page_size_fallback() {
    let source = MockContactSource::new(contacts(200)).without_signals();
    let service = service(
        source.clone(),
        MockClientStore::new(),
        InMemoryProgressStore::new(),
    );

    let summary = service.run_bulk_import().await.unwrap();

    // page 3 comes back empty and ends collection
    assert_eq!(source.pages(), vec![1, 2, 3]);
    assert_eq!(summary.collected, 200);
}

/// Test 9: an HTTP 500 on page 2 aborts the fetch and nothing is processed.
#[tokio::test]
async fn test_fetch_error_aborts_import() {
    let store = MockClientStore::new();
    let progress = InMemoryProgressStore::new();
    let source = MockContactSource::new(contacts(150)).failing_on_page(2);
    let service = service(source, store.clone(), progress.clone());

    let result = service.run_bulk_import().await;

    assert!(matches!(result, Err(AppError::ClientError(_))));
    let snapshot = progress.snapshot();
    assert_eq!(snapshot.phase, ImportPhase::Error);
    assert_eq!(snapshot.collected_so_far, 100);
    assert_eq!(snapshot.total_to_process, 0);
    assert_eq!(snapshot.processed_totally, 0);
    assert!(!snapshot.is_running);
    assert!(snapshot.status_message.contains("HTTP 500"));
    assert_eq!(store.len(), 0);
    assert!(
        progress
            .history()
            .iter()
            .all(|p| p.phase != ImportPhase::Processing)
    );
}

/// Test 10: an empty remote list completes with nothing to do.
#[tokio::test]
async fn test_empty_source_completes() {
    let progress = InMemoryProgressStore::new();
    let service = service(
        MockContactSource::new(Vec::new()),
        MockClientStore::new(),
        progress.clone(),
    );

    let summary = service.run_bulk_import().await.unwrap();

    assert_eq!(summary.stats.total(), 0);
    assert_eq!(progress.snapshot().phase, ImportPhase::Completed);
    assert_eq!(progress.snapshot().percent_complete, 100);
}

/// Test 11: every persisted record satisfies the counter invariant.
#[tokio::test]
async fn test_counter_invariant_holds_on_every_write() {
    let mut remote = contacts(120);
    remote[7].user_ns = None;
    remote[42].phone = None;

    let progress = InMemoryProgressStore::new();
    let service = service(
        MockContactSource::new(remote),
        MockClientStore::new(),
        progress.clone(),
    );

    service.run_bulk_import().await.unwrap();

    let history = progress.history();
    assert!(!history.is_empty());
    for record in &history {
        assert!(record.counters_consistent(), "inconsistent record: {:?}", record);
    }

    let processed: Vec<u64> = history.iter().map(|p| p.processed_totally).collect();
    let mut monotonic = processed.clone();
    monotonic.sort_unstable();
    assert_eq!(processed, monotonic, "processed_totally went backwards");
}

/// Test 12: the batch counter resets at each batch boundary.
#[tokio::test]
async fn test_batch_counter_resets() {
    let progress = InMemoryProgressStore::new();
    let service = service(
        MockContactSource::new(contacts(120)),
        MockClientStore::new(),
        progress.clone(),
    );

    service.run_bulk_import().await.unwrap();

    let history = progress.history();
    let max_in_batch = history
        .iter()
        .map(|p| p.processed_in_current_batch)
        .max()
        .unwrap();
    assert_eq!(max_in_batch, 50);

    let at_51 = history
        .iter()
        .find(|p| p.processed_totally == 51)
        .unwrap();
    assert_eq!(at_51.processed_in_current_batch, 1);
}

/// Test 13: the status message is refreshed every ten contacts.
#[tokio::test]
async fn test_status_message_cadence() {
    let progress = InMemoryProgressStore::new();
    let service = service(
        MockContactSource::new(contacts(25)),
        MockClientStore::new(),
        progress.clone(),
    );

    service.run_bulk_import().await.unwrap();

    let history = progress.history();
    let at = |n: u64| {
        history
            .iter()
            .find(|p| p.phase == ImportPhase::Processing && p.processed_totally == n)
            .unwrap()
            .status_message
            .clone()
    };

    assert_eq!(at(10), "Processing contacts: 10/25 (40%)");
    assert_eq!(at(11), "Processing contacts: 10/25 (40%)");
    assert_eq!(at(20), "Processing contacts: 20/25 (80%)");
    assert_eq!(at(25), "Processing contacts: 25/25 (100%)");
}

/// Test 14: a broken progress store does not stop the import.
#[tokio::test]
async fn test_progress_store_failures_are_swallowed() {
    let store = MockClientStore::new();
    let progress = InMemoryProgressStore::new();
    progress.fail_saves();
    let service = service(MockContactSource::new(contacts(5)), store.clone(), progress);

    let summary = service.run_bulk_import().await.unwrap();

    assert_eq!(summary.stats.created, 5);
    assert_eq!(store.len(), 5);
}

/// Test 15: a second trigger while a run is marked running is rejected.
#[tokio::test]
async fn test_concurrent_start_is_rejected() {
    let progress = InMemoryProgressStore::new();
    progress.modify(|p| {
        p.is_running = true;
        p.phase = ImportPhase::Processing;
    });
    let service = service(
        MockContactSource::new(contacts(1)),
        MockClientStore::new(),
        progress.clone(),
    );

    let result = service.run_bulk_import().await;

    assert!(matches!(result, Err(AppError::ImportAlreadyRunning)));
    assert_eq!(progress.snapshot().phase, ImportPhase::Processing);
}

/// Test 16: start_bulk_import returns immediately and the task finishes the run.
#[tokio::test]
async fn test_start_bulk_import_runs_in_background() {
    let store = MockClientStore::new();
    let progress = InMemoryProgressStore::new();
    let service = service(MockContactSource::new(contacts(4)), store.clone(), progress.clone());

    let (snapshot, handle) = service
        .start_bulk_import(SilentReporter, CancellationToken::new())
        .await
        .unwrap();

    assert!(snapshot.is_running);
    assert_eq!(snapshot.phase, ImportPhase::Collecting);

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.stats.created, 4);
    assert_eq!(progress.read().await.phase, ImportPhase::Completed);
}

/// Test 17: a new run resets the counters of the previous one.
#[tokio::test]
async fn test_new_run_resets_previous_counters() {
    let progress = InMemoryProgressStore::new();
    progress.modify(|p| {
        p.phase = ImportPhase::Error;
        p.failed_count = 9;
        p.collected_so_far = 100;
    });
    let service = service(
        MockContactSource::new(contacts(2)),
        MockClientStore::new(),
        progress.clone(),
    );

    service.run_bulk_import().await.unwrap();

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.failed_count, 0);
    assert_eq!(snapshot.collected_so_far, 2);
    assert_eq!(snapshot.created_count, 2);
}

/// Test 18: services are cheap to clone and share the same stores.
#[tokio::test]
async fn test_cloned_service_shares_progress() {
    let progress = InMemoryProgressStore::new();
    let service = Arc::new(service(
        MockContactSource::new(contacts(2)),
        MockClientStore::new(),
        progress.clone(),
    ));
    let clone = (*service).clone();

    service.run_bulk_import().await.unwrap();

    assert_eq!(clone.progress().await.created_count, 2);
}

/// Test 19: a failed progress read skips that write instead of saving a patched default.
#[tokio::test]
async fn test_failed_progress_read_keeps_record() {
    // Arrange: the read behind the counter update for contact 2 fails
    let progress = InMemoryProgressStore::new();
    let flaky = progress.clone();
    let store = MockClientStore::new().on_create(Arc::new(move |created| {
        if created == 2 {
            flaky.fail_next_load();
        }
    }));
    let service = service(MockContactSource::new(contacts(5)), store, progress.clone());

    // Act
    let summary = service.run_bulk_import().await.unwrap();

    // Assert
    assert_eq!(summary.stats.created, 5);
    let snapshot = progress.snapshot();
    assert_eq!(snapshot.phase, ImportPhase::Completed);
    assert_eq!(snapshot.total_to_process, 5);
    assert_eq!(snapshot.collected_so_far, 5);
    assert_eq!(snapshot.processed_totally, 5);
    assert!(snapshot.started_at.is_some());

    let processing_writes: Vec<_> = progress
        .history()
        .into_iter()
        .filter(|p| p.processed_totally > 0)
        .collect();
    assert!(!processing_writes.iter().any(|p| p.processed_totally == 2));
    for written in processing_writes {
        assert_eq!(written.total_to_process, 5);
        assert!(written.started_at.is_some());
        assert!(written.counters_consistent());
    }
}
