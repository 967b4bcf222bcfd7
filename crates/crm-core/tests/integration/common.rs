//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of the core traits for testing
//! `ImportService` and `ClientSyncService` in isolation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use crm_core::models::{Client, ContactPage, ContactUpdate, NewClient, RemoteContact};
use crm_core::traits::{ClientStore, ContactSource, SubscriberDirectory};
use crm_core::{AppError, ImportConfig, ImportProgress, ProgressStore, SubscriberPayload};
use uuid::Uuid;

/// Callback invoked from inside a mock, used to flip control flags mid-run.
pub type Hook = Arc<dyn Fn(usize) + Send + Sync>;

/// Import config with a fast pause poll, suitable for tests.
pub fn test_config() -> ImportConfig {
    ImportConfig::default().with_pause_poll_interval(Duration::from_millis(10))
}

/// Generates `n` contacts with external ids `sub-0..n` and phone numbers.
pub fn contacts(n: usize) -> Vec<RemoteContact> {
    (0..n)
        .map(|i| RemoteContact {
            user_ns: Some(format!("sub-{}", i)),
            first_name: Some(format!("Contact{}", i)),
            last_name: Some("Silva".to_string()),
            name: None,
            phone: Some(format!("+55 11 9{:08}", i)),
            email: None,
        })
        .collect()
}

// =============================================================================
// MockContactSource
// =============================================================================

/// Serves a fixed list of contacts page by page.
#[derive(Clone)]
pub struct MockContactSource {
    contacts: Arc<Vec<RemoteContact>>,
    /// Page number that answers with an HTTP 500.
    fail_on_page: Option<u32>,
    /// Whether pages carry `meta.current_page` / `meta.last_page`.
    with_meta: bool,
    /// Whether pages carry a `links.next` URL.
    with_links: bool,
    /// Pages requested, in order.
    pub requested_pages: Arc<Mutex<Vec<u32>>>,
    on_fetch: Option<Hook>,
}

impl MockContactSource {
    pub fn new(contacts: Vec<RemoteContact>) -> Self {
        Self {
            contacts: Arc::new(contacts),
            fail_on_page: None,
            with_meta: true,
            with_links: false,
            requested_pages: Arc::new(Mutex::new(Vec::new())),
            on_fetch: None,
        }
    }

    pub fn failing_on_page(mut self, page: u32) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Drops `meta` and reports continuation only through `links.next`.
    pub fn links_only(mut self) -> Self {
        self.with_meta = false;
        self.with_links = true;
        self
    }

    /// Drops every pagination signal; only the page-size fallback remains.
    pub fn without_signals(mut self) -> Self {
        self.with_meta = false;
        self.with_links = false;
        self
    }

    /// Calls `hook(page)` after each successful page.
    pub fn on_fetch(mut self, hook: Hook) -> Self {
        self.on_fetch = Some(hook);
        self
    }

    pub fn pages(&self) -> Vec<u32> {
        self.requested_pages.lock().unwrap().clone()
    }
}

impl ContactSource for MockContactSource {
    async fn fetch_page(&self, page: u32, limit: u32) -> Result<ContactPage, AppError> {
        self.requested_pages.lock().unwrap().push(page);

        if self.fail_on_page == Some(page) {
            return Err(AppError::ClientError(format!(
                "HTTP 500 from https://talkbi.test/subscribers?page={}",
                page
            )));
        }

        let limit = limit as usize;
        let start = (page as usize - 1) * limit;
        let end = (start + limit).min(self.contacts.len());
        let slice = if start < self.contacts.len() {
            self.contacts[start..end].to_vec()
        } else {
            Vec::new()
        };

        let last_page = self.contacts.len().div_ceil(limit).max(1) as u32;
        let mut result = ContactPage::new(slice);
        if self.with_meta {
            result = result.with_meta(page, last_page);
        }
        if self.with_links && page < last_page {
            result = result.with_next_link(format!(
                "https://talkbi.test/subscribers?page={}",
                page + 1
            ));
        }

        if let Some(hook) = &self.on_fetch {
            hook(page as usize);
        }

        Ok(result)
    }
}

// =============================================================================
// MockClientStore
// =============================================================================

/// In-memory client table.
#[derive(Clone, Default)]
pub struct MockClientStore {
    clients: Arc<Mutex<HashMap<Uuid, Client>>>,
    /// External ids whose lookup fails.
    failing_ids: Arc<Mutex<HashSet<String>>>,
    creates: Arc<AtomicUsize>,
    create_delay: Option<Duration>,
    on_create: Option<Hook>,
    fail_set_external_id: Arc<AtomicBool>,
}

impl MockClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every insert, to keep a run alive long enough to interact with it.
    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = Some(delay);
        self
    }

    /// Calls `hook(created_so_far)` after each insert.
    pub fn on_create(mut self, hook: Hook) -> Self {
        self.on_create = Some(hook);
        self
    }

    pub fn fail_lookup_for(&self, external_id: &str) {
        self.failing_ids
            .lock()
            .unwrap()
            .insert(external_id.to_string());
    }

    pub fn fail_set_external_id(&self) {
        self.fail_set_external_id.store(true, Ordering::SeqCst);
    }

    /// Inserts a client directly, bypassing the create counter.
    pub fn seed(&self, name: &str, external_id: Option<&str>) -> Client {
        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: Some("+55 11 3000-0000".to_string()),
            email: Some("seed@example.com".to_string()),
            document: "123.456.789-00".to_string(),
            segment: Some("vip".to_string()),
            external_id: external_id.map(String::from),
            created_at: now,
            updated_at: now,
        };
        self.clients
            .lock()
            .unwrap()
            .insert(client.id, client.clone());
        client
    }

    pub fn len(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn by_external_id(&self, external_id: &str) -> Option<Client> {
        self.clients
            .lock()
            .unwrap()
            .values()
            .find(|c| c.external_id.as_deref() == Some(external_id))
            .cloned()
    }

    pub fn by_id(&self, id: Uuid) -> Option<Client> {
        self.clients.lock().unwrap().get(&id).cloned()
    }
}

impl ClientStore for MockClientStore {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Client>, AppError> {
        if self.failing_ids.lock().unwrap().contains(external_id) {
            return Err(AppError::Generic("simulated database failure".to_string()));
        }
        Ok(self.by_external_id(external_id))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        Ok(self.by_id(id))
    }

    async fn create(&self, new_client: &NewClient) -> Result<Client, AppError> {
        if let Some(delay) = self.create_delay {
            tokio::time::sleep(delay).await;
        }

        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            name: new_client.name.clone(),
            phone: new_client.phone.clone(),
            email: new_client.email.clone(),
            document: new_client.document.clone(),
            segment: new_client.segment.clone(),
            external_id: new_client.external_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.clients
            .lock()
            .unwrap()
            .insert(client.id, client.clone());

        let created = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.on_create {
            hook(created);
        }

        Ok(client)
    }

    async fn update_contact_fields(&self, id: Uuid, changes: &ContactUpdate) -> Result<(), AppError> {
        let mut clients = self.clients.lock().unwrap();
        let client = clients
            .get_mut(&id)
            .ok_or(AppError::ClientNotFound(id))?;

        if let Some(name) = &changes.name {
            client.name = name.clone();
        }
        if let Some(phone) = &changes.phone {
            client.phone = Some(phone.clone());
        }
        if let Some(email) = &changes.email {
            client.email = Some(email.clone());
        }
        client.updated_at = Utc::now();
        Ok(())
    }

    async fn set_external_id(&self, id: Uuid, external_id: Option<&str>) -> Result<(), AppError> {
        if self.fail_set_external_id.load(Ordering::SeqCst) {
            return Err(AppError::Generic("simulated write failure".to_string()));
        }

        let mut clients = self.clients.lock().unwrap();
        let client = clients
            .get_mut(&id)
            .ok_or(AppError::ClientNotFound(id))?;
        client.external_id = external_id.map(String::from);
        Ok(())
    }
}

// =============================================================================
// InMemoryProgressStore
// =============================================================================

/// Progress store keeping the record and every saved version in memory.
#[derive(Clone, Default)]
pub struct InMemoryProgressStore {
    record: Arc<Mutex<Option<ImportProgress>>>,
    /// Every record passed to `save`, in order.
    history: Arc<Mutex<Vec<ImportProgress>>>,
    fail_saves: Arc<AtomicBool>,
    fail_next_load: Arc<AtomicBool>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail.
    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    /// Makes the next load fail, as a dropped database connection would.
    pub fn fail_next_load(&self) {
        self.fail_next_load.store(true, Ordering::SeqCst);
    }

    /// Edits the stored record in place, as another process would.
    pub fn modify(&self, f: impl FnOnce(&mut ImportProgress)) {
        let mut record = self.record.lock().unwrap();
        let progress = record.get_or_insert_with(ImportProgress::default);
        f(progress);
    }

    pub fn snapshot(&self) -> ImportProgress {
        self.record.lock().unwrap().clone().unwrap_or_default()
    }

    pub fn history(&self) -> Vec<ImportProgress> {
        self.history.lock().unwrap().clone()
    }
}

impl ProgressStore for InMemoryProgressStore {
    async fn load(&self) -> Result<Option<ImportProgress>, AppError> {
        if self.fail_next_load.swap(false, Ordering::SeqCst) {
            return Err(AppError::ProgressStoreError("connection reset".to_string()));
        }
        Ok(self.record.lock().unwrap().clone())
    }

    async fn save(&self, progress: &ImportProgress) -> Result<(), AppError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::ProgressStoreError("disk full".to_string()));
        }
        *self.record.lock().unwrap() = Some(progress.clone());
        self.history.lock().unwrap().push(progress.clone());
        Ok(())
    }
}

// =============================================================================
// MockDirectory
// =============================================================================

/// In-memory TalkBI subscriber directory.
#[derive(Clone, Default)]
pub struct MockDirectory {
    subscribers: Arc<Mutex<HashMap<String, SubscriberPayload>>>,
    /// Calls in order, e.g. `delete:sub-1`, `create:sub-new-0`.
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Sub-flows sent as `(user_ns, flow_ns)`.
    pub flows: Arc<Mutex<Vec<(String, String)>>>,
    next_id: Arc<AtomicUsize>,
    fail_create: Arc<AtomicBool>,
    fail_delete: Arc<AtomicBool>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    pub fn insert(&self, user_ns: &str) {
        self.subscribers
            .lock()
            .unwrap()
            .insert(user_ns.to_string(), SubscriberPayload::default());
    }

    pub fn contains(&self, user_ns: &str) -> bool {
        self.subscribers.lock().unwrap().contains_key(user_ns)
    }

    pub fn get(&self, user_ns: &str) -> Option<SubscriberPayload> {
        self.subscribers.lock().unwrap().get(user_ns).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SubscriberDirectory for MockDirectory {
    async fn create_subscriber(&self, payload: &SubscriberPayload) -> Result<String, AppError> {
        if self.fail_create.load(Ordering::SeqCst) {
            self.calls.lock().unwrap().push("create:failed".to_string());
            return Err(AppError::ClientError(
                "HTTP 422 from https://talkbi.test/subscriber/create".to_string(),
            ));
        }

        let user_ns = format!("sub-new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers
            .lock()
            .unwrap()
            .insert(user_ns.clone(), payload.clone());
        self.calls.lock().unwrap().push(format!("create:{}", user_ns));
        Ok(user_ns)
    }

    async fn delete_subscriber(&self, user_ns: &str) -> Result<(), AppError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            self.calls.lock().unwrap().push("delete:failed".to_string());
            return Err(AppError::NetworkError("connection reset".to_string()));
        }

        self.subscribers.lock().unwrap().remove(user_ns);
        self.calls.lock().unwrap().push(format!("delete:{}", user_ns));
        Ok(())
    }

    async fn send_sub_flow(&self, user_ns: &str, flow_ns: &str) -> Result<(), AppError> {
        self.flows
            .lock()
            .unwrap()
            .push((user_ns.to_string(), flow_ns.to_string()));
        Ok(())
    }
}
