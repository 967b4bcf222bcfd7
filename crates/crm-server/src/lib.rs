//! CRM Server - REST API for the TalkBI client import
//!
//! This crate exposes the import pipeline over HTTP:
//!
//! - **Import**: Start a bulk import, poll its progress, pause, resume, cancel or reset it
//! - **Clients**: Push a single client to TalkBI, or start a sub-flow for it
//!
//! # API Documentation
//!
//! When running the server, interactive API documentation is available
//! at `/swagger-ui`.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::create_router;
pub use state::AppState;
