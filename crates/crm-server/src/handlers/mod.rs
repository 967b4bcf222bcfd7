//! HTTP request handlers for API endpoints.

pub mod clients;
pub mod health;
pub mod import;
