//! Client repository for PostgreSQL.

use crm_core::error::AppError;
use crm_core::models::{Client, ContactUpdate, NewClient};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
const CLIENT_COLUMNS: &str =
    "id, name, phone, email, document, segment, external_id, created_at, updated_at";

/// Repository for client persistence in PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use crm_db::ClientRepository;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/crm")
///     .await?;
///
/// let repo = ClientRepository::new(pool);
/// let linked = repo.find_by_external_id("a1b2c3").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientRepository {
    pool: Pool<Postgres>,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Looks up the client linked to a TalkBI subscriber.
    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Client>, AppError> {
        let query = format!("SELECT {} FROM clients WHERE external_id = $1", CLIENT_COLUMNS);
        sqlx::query_as::<_, Client>(&query)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Retrieves a client by UUID.
    pub async fn get(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        let query = format!("SELECT {} FROM clients WHERE id = $1", CLIENT_COLUMNS);
        sqlx::query_as::<_, Client>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Inserts a client and returns the stored row.
    ///
    /// # Errors
    ///
    /// Fails with `AppError::DatabaseError` on a duplicate `document` or
    /// `external_id`.
    pub async fn create(&self, new_client: &NewClient) -> Result<Client, AppError> {
        let query = format!(
            r#"
            INSERT INTO clients (name, phone, email, document, segment, external_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        );
        sqlx::query_as::<_, Client>(&query)
            .bind(&new_client.name)
            .bind(&new_client.phone)
            .bind(&new_client.email)
            .bind(&new_client.document)
            .bind(&new_client.segment)
            .bind(&new_client.external_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// Overwrites name, phone and email with the values present in `changes`.
    ///
    /// Absent values keep what is stored; `document` and `segment` are never touched.
    pub async fn update_contact_fields(
        &self,
        id: Uuid,
        changes: &ContactUpdate,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.phone)
        .bind(&changes.email)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::ClientNotFound(id));
        }
        Ok(())
    }

    /// Links (or with `None`, unlinks) a client to a TalkBI subscriber.
    pub async fn set_external_id(&self, id: Uuid, external_id: Option<&str>) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET external_id = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(external_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(AppError::ClientNotFound(id));
        }
        Ok(())
    }

    /// Number of clients, and how many of them are linked to TalkBI.
    pub async fn counts(&self) -> Result<ClientCounts, AppError> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(external_id)
            FROM clients
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(ClientCounts {
            total: row.0,
            linked: row.1,
        })
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }
}

/// Result of [`ClientRepository::counts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCounts {
    pub total: i64,
    pub linked: i64,
}

// =============================================================================
// Trait Implementation: ClientStore
// =============================================================================

impl crm_core::traits::ClientStore for ClientRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Client>, AppError> {
        ClientRepository::find_by_external_id(self, external_id).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        ClientRepository::get(self, id).await
    }

    async fn create(&self, new_client: &NewClient) -> Result<Client, AppError> {
        ClientRepository::create(self, new_client).await
    }

    async fn update_contact_fields(&self, id: Uuid, changes: &ContactUpdate) -> Result<(), AppError> {
        ClientRepository::update_contact_fields(self, id, changes).await
    }

    async fn set_external_id(&self, id: Uuid, external_id: Option<&str>) -> Result<(), AppError> {
        ClientRepository::set_external_id(self, id, external_id).await
    }
}
