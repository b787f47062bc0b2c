use std::sync::Arc;

use tracing::info;

use glimpse_blob::BlobStore;
use glimpse_blob_memory::MemoryBlobStore;
use glimpse_blob_s3::S3BlobStore;
use glimpse_store::MediaStore;
use glimpse_store_memory::MemoryMediaStore;
use glimpse_store_postgres::PostgresMediaStore;

use crate::config::{BlobConfig, StoreConfig};
use crate::error::ServerError;

/// Create the metadata store backend named by the configuration.
///
/// # Errors
///
/// Returns [`ServerError::Config`] for an unknown backend name, or the
/// store's own error when connecting fails.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn MediaStore>, ServerError> {
    match config.backend.as_str() {
        "postgres" => {
            info!(
                host = %config.postgres.host,
                dbname = %config.postgres.dbname,
                "using postgres metadata store"
            );
            let store = PostgresMediaStore::new(config.postgres.clone()).await?;
            Ok(Arc::new(store))
        }
        "memory" => {
            info!("using in-memory metadata store");
            Ok(Arc::new(MemoryMediaStore::new()))
        }
        other => Err(ServerError::Config(format!(
            "unknown store backend '{other}' (expected 'postgres' or 'memory')"
        ))),
    }
}

/// Create the blob store backend named by the configuration.
///
/// # Errors
///
/// Returns [`ServerError::Config`] for an unknown backend name.
pub async fn create_blobs(config: &BlobConfig) -> Result<Arc<dyn BlobStore>, ServerError> {
    match config.backend.as_str() {
        "s3" => {
            info!(
                region = %config.s3.region,
                bucket = %config.s3.bucket,
                endpoint = config.s3.endpoint_url.as_deref().unwrap_or("default"),
                "using s3 blob store"
            );
            let store = S3BlobStore::new(config.s3.clone()).await;
            Ok(Arc::new(store))
        }
        "memory" => {
            info!("using in-memory blob store");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
        other => Err(ServerError::Config(format!(
            "unknown blob backend '{other}' (expected 's3' or 'memory')"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BlobConfig, StoreConfig};

    #[tokio::test]
    async fn memory_backends_build() {
        let store_config = StoreConfig {
            backend: "memory".to_owned(),
            ..StoreConfig::default()
        };
        assert!(create_store(&store_config).await.is_ok());

        let blob_config = BlobConfig {
            backend: "memory".to_owned(),
            ..BlobConfig::default()
        };
        assert!(create_blobs(&blob_config).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_backends_are_rejected() {
        let store_config = StoreConfig {
            backend: "sqlite".to_owned(),
            ..StoreConfig::default()
        };
        let err = create_store(&store_config).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));

        let blob_config = BlobConfig {
            backend: "gcs".to_owned(),
            ..BlobConfig::default()
        };
        let err = create_blobs(&blob_config).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
