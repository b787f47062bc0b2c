use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating the media resources table and its
/// indexes if they do not exist.
///
/// The unique index on `resource_key` backs the duplicate-key insert
/// failure; the partial index on `expires_at` keeps the expiration sweep
/// from scanning never-expiring rows.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let table = config.media_table();

    let create_table = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id UUID PRIMARY KEY,
            resource_key TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            expires_at TIMESTAMPTZ,
            viewed BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            salt BYTEA NOT NULL,
            filename VARCHAR(255),
            file_extension VARCHAR(50),
            blur_enabled BOOLEAN NOT NULL DEFAULT FALSE
        )"
    );

    let create_expires_index = format!(
        "CREATE INDEX IF NOT EXISTS {table}_expires_at_idx \
         ON {table} (expires_at) WHERE expires_at IS NOT NULL"
    );

    sqlx::query(&create_table).execute(pool).await?;
    sqlx::query(&create_expires_index).execute(pool).await?;

    Ok(())
}
