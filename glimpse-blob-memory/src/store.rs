use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use glimpse_blob::{BlobError, BlobStore};

/// In-memory [`BlobStore`] backed by a [`DashMap`].
///
/// Objects are namespaced by bucket so per-call overrides behave like the
/// real backend. Intended as a test double; the async trait methods return
/// immediately.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: DashMap<(String, String), Bytes>,
}

impl MemoryBlobStore {
    /// Create a new, empty in-memory blob store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn render_key(bucket: Option<&str>, key: &str) -> (String, String) {
        (bucket.unwrap_or_default().to_owned(), key.to_owned())
    }

    /// Whether an object exists under `key`.
    #[must_use]
    pub fn contains(&self, bucket: Option<&str>, key: &str) -> bool {
        self.objects.contains_key(&Self::render_key(bucket, key))
    }

    /// Number of stored objects across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Flip one bit of a stored object, for exercising fail-closed
    /// decryption. Returns `false` if the object is missing or empty.
    pub fn corrupt(&self, bucket: Option<&str>, key: &str) -> bool {
        let Some(mut entry) = self.objects.get_mut(&Self::render_key(bucket, key)) else {
            return false;
        };
        if entry.is_empty() {
            return false;
        }
        let mut data = entry.to_vec();
        let last = data.len() - 1;
        data[last] ^= 0x01;
        *entry = Bytes::from(data);
        true
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bucket: Option<&str>, key: &str, data: Bytes) -> Result<String, BlobError> {
        self.objects.insert(Self::render_key(bucket, key), data);
        Ok(key.to_owned())
    }

    async fn get(&self, bucket: Option<&str>, key: &str) -> Result<Bytes, BlobError> {
        self.objects
            .get(&Self::render_key(bucket, key))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobError::NotFound(key.to_owned()))
    }

    async fn delete(&self, bucket: Option<&str>, key: &str) -> Result<(), BlobError> {
        self.objects.remove(&Self::render_key(bucket, key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = MemoryBlobStore::new();
        store
            .put(None, "media/abc", Bytes::from_static(b"ciphertext"))
            .await
            .unwrap();
        let data = store.get(None, "media/abc").await.unwrap();
        assert_eq!(data.as_ref(), b"ciphertext");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = store.get(None, "media/nope").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryBlobStore::new();
        store
            .put(None, "media/abc", Bytes::from_static(b"x"))
            .await
            .unwrap();
        store.delete(None, "media/abc").await.unwrap();
        store.delete(None, "media/abc").await.unwrap();
        assert!(!store.contains(None, "media/abc"));
    }

    #[tokio::test]
    async fn buckets_are_isolated() {
        let store = MemoryBlobStore::new();
        store
            .put(Some("a"), "k", Bytes::from_static(b"in-a"))
            .await
            .unwrap();
        assert!(store.get(Some("b"), "k").await.is_err());
        assert!(store.get(None, "k").await.is_err());
        assert_eq!(store.get(Some("a"), "k").await.unwrap().as_ref(), b"in-a");
    }

    #[tokio::test]
    async fn corrupt_flips_a_bit() {
        let store = MemoryBlobStore::new();
        store
            .put(None, "k", Bytes::from_static(b"\x00\x00"))
            .await
            .unwrap();
        assert!(store.corrupt(None, "k"));
        assert_eq!(store.get(None, "k").await.unwrap().as_ref(), b"\x00\x01");
        assert!(!store.corrupt(None, "missing"));
    }
}
