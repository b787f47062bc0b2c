use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, error, info};

use glimpse_blob::{BlobError, BlobStore};

use crate::config::S3Config;

/// S3-backed implementation of [`BlobStore`].
///
/// Objects are opaque ciphertext; the adapter never inspects content.
/// Failures surface to the caller; retries are the SDK's business, not
/// the adapter's.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("bucket", &self.bucket)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3BlobStore {
    /// Create a new `S3BlobStore` by building an AWS SDK client from the
    /// given configuration.
    ///
    /// Static credentials take precedence over the environment credential
    /// chain when configured. An endpoint URL override switches the client
    /// to path-style addressing for S3-compatible services.
    pub async fn new(config: S3Config) -> Self {
        let mut loader =
            aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            debug!("using static S3 credentials");
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let Some(endpoint) = &config.endpoint_url {
            debug!(endpoint = %endpoint, "using custom S3 endpoint");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let client = aws_sdk_s3::Client::from_conf(builder.build());
        Self {
            client,
            bucket: config.bucket,
        }
    }

    /// Create an `S3BlobStore` with a pre-built client (for testing).
    pub fn with_client(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Resolve the bucket name from the per-call override or the default.
    fn resolve_bucket<'a>(&'a self, bucket: Option<&'a str>) -> Result<&'a str, BlobError> {
        match bucket {
            Some(b) if !b.is_empty() => Ok(b),
            _ if !self.bucket.is_empty() => Ok(&self.bucket),
            _ => Err(BlobError::NoBucket("no bucket in call or config".to_owned())),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, bucket: Option<&str>, key: &str, data: Bytes) -> Result<String, BlobError> {
        let bucket = self.resolve_bucket(bucket)?;

        debug!(bucket = %bucket, key = %key, size = data.len(), "uploading object");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %bucket, key = %key, error = %e, "put_object failed");
                BlobError::Storage(e.to_string())
            })?;

        info!(bucket = %bucket, key = %key, "object uploaded");
        Ok(key.to_owned())
    }

    async fn get(&self, bucket: Option<&str>, key: &str) -> Result<Bytes, BlobError> {
        let bucket = self.resolve_bucket(bucket)?;

        debug!(bucket = %bucket, key = %key, "downloading object");

        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    BlobError::NotFound(key.to_owned())
                } else {
                    error!(bucket = %bucket, key = %key, error = %service_err, "get_object failed");
                    BlobError::Storage(service_err.to_string())
                }
            })?;

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| BlobError::Storage(format!("failed to read object body: {e}")))?;

        Ok(body.into_bytes())
    }

    async fn delete(&self, bucket: Option<&str>, key: &str) -> Result<(), BlobError> {
        let bucket = self.resolve_bucket(bucket)?;

        debug!(bucket = %bucket, key = %key, "deleting object");

        // DeleteObject is idempotent on the service side: deleting a missing
        // key succeeds.
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %bucket, key = %key, error = %e, "delete_object failed");
                BlobError::Storage(e.to_string())
            })?;

        Ok(())
    }
}
