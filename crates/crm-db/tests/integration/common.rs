//! Test utilities for integration tests.
//!
//! Provides helper functions to set up isolated PostgreSQL containers
//! with the client and progress schema for each test.

use crm_core::models::NewClient;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Schema from the workspace `migrations/` directory.
const MIGRATIONS: &[&str] = &[
    include_str!("../../../../migrations/0001_clients.sql"),
    include_str!("../../../../migrations/0002_import_progress.sql"),
];

/// Starts a fresh PostgreSQL container, applies the schema and returns a pool.
///
/// Keep the returned container alive for the duration of the test; it is
/// removed when dropped.
pub async fn setup_test_db() -> (PgPool, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("postgres", "16-alpine")
        .with_exposed_port(ContainerPort::Tcp(5432))
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
        .with_env_var("POSTGRES_PASSWORD", "postgres")
        .with_env_var("POSTGRES_DB", "postgres")
        .start()
        .await
        .expect("Failed to start PostgreSQL container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

    // The server restarts once during init, so the first attempts may fail
    const MAX_RETRIES: u32 = 30;
    let mut retries = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(&connection_string)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!(
                        "Failed to connect to database after {} retries: {}",
                        MAX_RETRIES, e
                    );
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    // Each file holds a single statement
    for migration in MIGRATIONS {
        sqlx::query(migration)
            .execute(&pool)
            .await
            .expect("Failed to run migration");
    }

    (pool, container)
}

/// A client as the import would create it for subscriber `external_id`.
pub fn sample_new_client(external_id: &str, phone: &str) -> NewClient {
    NewClient {
        name: format!("Client {}", external_id),
        phone: Some(phone.to_string()),
        email: None,
        document: crm_core::placeholder_document(Some(phone), external_id),
        segment: None,
        external_id: Some(external_id.to_string()),
    }
}
