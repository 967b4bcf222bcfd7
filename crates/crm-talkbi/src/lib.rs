//! CRM TalkBI - HTTP client for the TalkBI subscribers API.
//!
//! [`TalkbiClient`] implements the `crm-core` traits used by the import and
//! single-client sync services:
//!
//! - [`crm_core::ContactSource`] for paginated contact listing
//! - [`crm_core::SubscriberDirectory`] for creating, deleting and messaging subscribers
//!
//! Authentication, retries and response parsing live here so the services
//! only ever see domain types and [`crm_core::AppError`].

pub mod talkbi;

pub use talkbi::TalkbiClient;
