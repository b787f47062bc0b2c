use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use glimpse_core::{MediaResource, NewMediaResource};
use glimpse_store::{MediaStore, StoreError, ViewLease};

use crate::config::PostgresConfig;
use crate::migrations;

const COLUMNS: &str = "id, resource_key, password_hash, expires_at, viewed, created_at, \
                       salt, filename, file_extension, blur_enabled";

/// PostgreSQL-backed implementation of [`MediaStore`].
///
/// Uses `sqlx::PgPool` for connection pooling. The consuming-download lock
/// is a `SELECT ... FOR UPDATE` inside a transaction held by the returned
/// [`ViewLease`]; the `viewed` flag flips and commits in that same
/// transaction, which is what serializes concurrent consumers of one key.
pub struct PostgresMediaStore {
    pool: PgPool,
    table: String,
}

/// Row shape mirroring the `media_resources` table.
#[derive(sqlx::FromRow)]
struct MediaRow {
    id: Uuid,
    resource_key: String,
    password_hash: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    viewed: bool,
    created_at: DateTime<Utc>,
    salt: Vec<u8>,
    filename: Option<String>,
    file_extension: Option<String>,
    blur_enabled: bool,
}

impl From<MediaRow> for MediaResource {
    fn from(row: MediaRow) -> Self {
        Self {
            id: row.id,
            resource_key: row.resource_key,
            password_hash: row.password_hash,
            expires_at: row.expires_at,
            viewed: row.viewed,
            created_at: row.created_at,
            salt: row.salt,
            filename: row.filename,
            file_extension: row.file_extension,
            blur_enabled: row.blur_enabled,
        }
    }
}

impl PostgresMediaStore {
    /// Create a new `PostgresMediaStore` from the provided configuration.
    ///
    /// Connects to PostgreSQL, creates the connection pool, and runs
    /// migrations to ensure the required table exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if pool creation fails, or
    /// [`StoreError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect(&config.url())
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Self::from_pool(pool, config).await
    }

    /// Create a `PostgresMediaStore` from an existing pool. Runs migrations
    /// on creation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StoreError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            pool,
            table: config.media_table(),
        })
    }

    async fn fetch_with_filter(
        &self,
        resource_key: &str,
        filter: &str,
    ) -> Result<Option<MediaResource>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM {table} WHERE resource_key = $1{filter}",
            table = self.table,
        );

        let row: Option<MediaRow> = sqlx::query_as(&query)
            .bind(resource_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.map(MediaResource::from))
    }
}

#[async_trait]
impl MediaStore for PostgresMediaStore {
    async fn insert(&self, resource: NewMediaResource) -> Result<MediaResource, StoreError> {
        let query = format!(
            "INSERT INTO {table} \
             (id, resource_key, password_hash, expires_at, viewed, created_at, \
              salt, filename, file_extension, blur_enabled) \
             VALUES ($1, $2, $3, $4, FALSE, NOW(), $5, $6, $7, $8) \
             RETURNING {COLUMNS}",
            table = self.table,
        );

        let row: MediaRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(&resource.resource_key)
            .bind(&resource.password_hash)
            .bind(resource.expires_at)
            .bind(&resource.salt)
            .bind(&resource.filename)
            .bind(&resource.file_extension)
            .bind(resource.blur_enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    StoreError::Duplicate(resource.resource_key.clone())
                } else {
                    StoreError::Backend(e.to_string())
                }
            })?;

        Ok(row.into())
    }

    async fn get(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError> {
        self.fetch_with_filter(resource_key, "").await
    }

    async fn get_active(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError> {
        self.fetch_with_filter(
            resource_key,
            " AND (expires_at IS NULL OR expires_at > NOW()) AND viewed = FALSE",
        )
        .await
    }

    async fn get_active_any(
        &self,
        resource_key: &str,
    ) -> Result<Option<MediaResource>, StoreError> {
        self.fetch_with_filter(resource_key, " AND (expires_at IS NULL OR expires_at > NOW())")
            .await
    }

    async fn begin_view(
        &self,
        resource_key: &str,
    ) -> Result<Option<Box<dyn ViewLease>>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Unfiltered fetch under the row lock; the caller re-checks
        // expiration and the one-shot flag so they map to their own errors
        // rather than NotFound.
        let query = format!(
            "SELECT {COLUMNS} FROM {table} WHERE resource_key = $1 FOR UPDATE",
            table = self.table,
        );

        let row: Option<MediaRow> = sqlx::query_as(&query)
            .bind(resource_key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(row) = row else {
            // Dropping the transaction rolls it back.
            return Ok(None);
        };

        Ok(Some(Box::new(PgViewLease {
            resource: row.into(),
            mark_query: format!(
                "UPDATE {table} SET viewed = TRUE WHERE resource_key = $1",
                table = self.table,
            ),
            tx,
        })))
    }

    async fn delete(&self, resource_key: &str) -> Result<bool, StoreError> {
        let query = format!(
            "DELETE FROM {table} WHERE resource_key = $1",
            table = self.table
        );

        let result = sqlx::query(&query)
            .bind(resource_key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_expired(&self) -> Result<Vec<String>, StoreError> {
        let query = format!(
            "SELECT resource_key FROM {table} \
             WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
            table = self.table,
        );

        let rows: Vec<(String,)> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let query = format!(
            "DELETE FROM {table} WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
            table = self.table,
        );

        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// A `SELECT ... FOR UPDATE` row lock held open as a [`ViewLease`].
struct PgViewLease {
    resource: MediaResource,
    mark_query: String,
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ViewLease for PgViewLease {
    fn resource(&self) -> &MediaResource {
        &self.resource
    }

    async fn mark_viewed(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = *self;

        sqlx::query(&this.mark_query)
            .bind(&this.resource.resource_key)
            .execute(&mut *this.tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        this.tx
            .commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
