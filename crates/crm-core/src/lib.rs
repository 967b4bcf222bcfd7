//! CRM Core - Domain types, import pipeline and progress tracking.
//!
//! This crate provides the core of the TalkBI client synchronization:
//!
//! - **Domain models**: [`RemoteContact`], [`Client`], [`NewClient`], [`ContactPage`]
//! - **Progress**: [`ImportProgress`] state machine, [`ProgressStore`] contract and
//!   the [`FileProgressStore`] backend
//! - **Services**: [`ImportService`] for bulk imports, [`ImportControl`] for
//!   pausing or cancelling them, [`ClientSyncService`] for pushing single
//!   clients to TalkBI
//! - **Traits**: [`ContactSource`], [`SubscriberDirectory`], [`ClientStore`] for
//!   dependency injection
//! - **Event reporting**: [`ImportReporter`] trait for decoupled logging
//!
//! # Architecture
//!
//! Frontends (`crm-server`, `crm-cli`) wire concrete implementations from
//! `crm-talkbi` and `crm-db` into the generic services defined here.
//!
//! # Example
//!
//! ```ignore
//! use crm_core::{FileProgressStore, ImportService, TracingReporter};
//! use tokio_util::sync::CancellationToken;
//!
//! let progress = FileProgressStore::at_default_location()?;
//! let import = ImportService::new(talkbi, repo, progress);
//! let summary = import
//!     .run_bulk_import_with_progress(&TracingReporter, CancellationToken::new())
//!     .await?;
//! println!("{} created, {} updated", summary.stats.created, summary.stats.updated);
//! ```

pub mod client_sync;
pub mod config;
pub mod control;
pub mod error;
pub mod import;
pub mod models;
pub mod progress;
pub mod progress_store;
pub mod report;
pub mod sync;
pub mod traits;

// Configuration
pub use config::{
    BATCH_SIZE, DbConfig, HttpConfig, ImportConfig, PAGE_LIMIT, ProgressBackendKind, Settings,
    default_config_path, default_progress_path, load_settings,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{
    Client, ContactPage, ContactUpdate, NewClient, RemoteContact, SubscriberPayload,
    placeholder_document,
};

// Progress record and persistence
pub use progress::{ImportPhase, ImportProgress, ProgressPatch};
pub use progress_store::{FileProgressStore, ProgressStore};

// Sync types and business logic
pub use sync::{ContactAction, ImportStats, ImportStatus, ImportSummary, SyncOutcome, plan_contact};

// Event reporting
pub use report::{ImportEvent, ImportReporter, SilentReporter, TracingReporter};

// Traits for dependency injection
pub use traits::{ClientStore, ContactSource, SubscriberDirectory};

// Services (generic over trait implementations)
pub use client_sync::{ClientSyncResult, ClientSyncService, SyncStage};
pub use control::ImportControl;
pub use import::ImportService;
