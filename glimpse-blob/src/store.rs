use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;

/// Pluggable blob storage backend for ciphertext objects.
///
/// Implementors provide the actual storage mechanism (S3-compatible object
/// storage in production, an in-memory map in tests). Implementations must
/// be `Send + Sync` and safe for concurrent use.
///
/// Every method takes an optional per-call bucket; `None` resolves to the
/// backend's configured default. A single-object `put` is atomic: the
/// object either becomes fully visible under its key or the call fails.
/// No ordering is assumed between different keys, and no retries happen
/// inside the adapter.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, overwriting any previous object.
    /// Returns the key the object was stored under.
    async fn put(&self, bucket: Option<&str>, key: &str, data: Bytes) -> Result<String, BlobError>;

    /// Retrieve the object stored under `key`.
    ///
    /// Fails with [`BlobError::NotFound`] when no object exists.
    async fn get(&self, bucket: Option<&str>, key: &str) -> Result<Bytes, BlobError>;

    /// Delete the object stored under `key`. Deleting a missing object is
    /// not an error.
    async fn delete(&self, bucket: Option<&str>, key: &str) -> Result<(), BlobError>;
}
