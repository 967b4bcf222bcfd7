//! CRM DB - PostgreSQL persistence for clients and import progress
//!
//! # Overview
//!
//! The main components are:
//! - [`ClientRepository`] - Local client records, implements `ClientStore`
//! - [`ProgressRepository`] - Import progress as a JSONB row, implements `ProgressStore`
//! - [`ProgressBackend`] - Runtime choice between the file and PostgreSQL progress stores
//!
//! The schema lives in the workspace `migrations/` directory.

mod progress_repository;
mod repository;

pub use progress_repository::{DEFAULT_PROGRESS_KEY, ProgressBackend, ProgressRepository};
pub use repository::{ClientCounts, ClientRepository};
