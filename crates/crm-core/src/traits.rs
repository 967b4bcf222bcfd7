//! Trait definitions for external dependencies.
//!
//! The import pipeline talks to TalkBI and to the client table only through
//! these traits, so the services can be driven by mocks in tests and by
//! `crm-talkbi` / `crm-db` in production.
//!
//! # Example
//!
//! ```
//! use crm_core::traits::{ClientStore, ContactSource};
//!
//! async fn count_unknown<C, S>(
//!     source: &C,
//!     store: &S,
//! ) -> Result<usize, crm_core::AppError>
//! where
//!     C: ContactSource,
//!     S: ClientStore,
//! {
//!     let page = source.fetch_page(1, 100).await?;
//!     let mut unknown = 0;
//!     for contact in &page.contacts {
//!         if let Some(id) = contact.external_id() {
//!             if store.find_by_external_id(id).await?.is_none() {
//!                 unknown += 1;
//!             }
//!         }
//!     }
//!     Ok(unknown)
//! }
//! ```
//!
//! The progress persistence contract lives next to its file backend in
//! [`crate::progress_store`].

use std::future::Future;

use uuid::Uuid;

use crate::AppError;
use crate::models::{Client, ContactPage, ContactUpdate, NewClient, SubscriberPayload};

/// Paginated source of remote contacts.
pub trait ContactSource: Send + Sync + Clone {
    /// Fetches one page of contacts.
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `limit` - Maximum contacts per page
    ///
    /// # Returns
    ///
    /// The contacts on the page along with the pagination signals the API sent.
    /// A non-success response is an error; no partial page is returned.
    fn fetch_page(
        &self,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<ContactPage, AppError>> + Send;
}

/// Write access to the remote subscriber directory.
pub trait SubscriberDirectory: Send + Sync + Clone {
    /// Creates a subscriber and returns its `user_ns`.
    fn create_subscriber(
        &self,
        payload: &SubscriberPayload,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Deletes the subscriber identified by `user_ns`.
    fn delete_subscriber(&self, user_ns: &str)
    -> impl Future<Output = Result<(), AppError>> + Send;

    /// Starts the sub-flow `flow_ns` for the subscriber `user_ns`.
    fn send_sub_flow(
        &self,
        user_ns: &str,
        flow_ns: &str,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Persistence for local client records.
pub trait ClientStore: Send + Sync + Clone {
    /// Looks up a client by its TalkBI `user_ns`.
    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<Client>, AppError>> + Send;

    /// Retrieves a client by primary key.
    fn get(&self, id: Uuid) -> impl Future<Output = Result<Option<Client>, AppError>> + Send;

    /// Inserts a new client and returns it.
    fn create(&self, client: &NewClient) -> impl Future<Output = Result<Client, AppError>> + Send;

    /// Overwrites name, phone and email with the values present in `changes`.
    ///
    /// Fields left as `None` keep their stored value. Every other column is
    /// untouched.
    fn update_contact_fields(
        &self,
        id: Uuid,
        changes: &ContactUpdate,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Links (or unlinks, with `None`) the client to a TalkBI subscriber.
    fn set_external_id(
        &self,
        id: Uuid,
        external_id: Option<&str>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}
