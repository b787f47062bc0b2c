use std::sync::Arc;

use glimpse_blob::BlobStore;
use glimpse_crypto::Encryptor;
use glimpse_store::MediaStore;

use crate::error::MediaError;
use crate::pipeline::{MediaPipeline, DEFAULT_BODY_LIMIT};

/// Fluent builder for constructing a [`MediaPipeline`].
///
/// A metadata store and a blob store must be supplied; the PBKDF2
/// iteration count and the body limit have canonical defaults.
pub struct MediaPipelineBuilder {
    store: Option<Arc<dyn MediaStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    encryptor: Encryptor,
    body_limit: u64,
}

impl MediaPipelineBuilder {
    /// Create a new builder with default crypto settings and body limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: None,
            blobs: None,
            encryptor: Encryptor::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Set the metadata store implementation.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the blob store implementation.
    #[must_use]
    pub fn blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Set the PBKDF2 iteration count. Stored blobs are bound to the count
    /// they were sealed under.
    #[must_use]
    pub fn pbkdf2_iterations(mut self, iterations: u32) -> Self {
        self.encryptor = Encryptor::new(iterations);
        self
    }

    /// Set the maximum accepted upload size in bytes.
    #[must_use]
    pub fn body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    /// Consume the builder and produce a configured [`MediaPipeline`].
    ///
    /// Returns [`MediaError::Configuration`] if a required store has not
    /// been set.
    pub fn build(self) -> Result<MediaPipeline, MediaError> {
        let store = self
            .store
            .ok_or_else(|| MediaError::Configuration("metadata store is required".into()))?;
        let blobs = self
            .blobs
            .ok_or_else(|| MediaError::Configuration("blob store is required".into()))?;

        Ok(MediaPipeline {
            store,
            blobs,
            encryptor: self.encryptor,
            body_limit: self.body_limit,
        })
    }
}

impl Default for MediaPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glimpse_blob_memory::MemoryBlobStore;
    use glimpse_store_memory::MemoryMediaStore;

    use super::*;

    #[test]
    fn build_missing_store_returns_error() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let result = MediaPipelineBuilder::new().blobs(blobs).build();
        let err = result.expect_err("missing store should fail");
        assert!(err.to_string().contains("metadata store is required"));
    }

    #[test]
    fn build_missing_blobs_returns_error() {
        let store = Arc::new(MemoryMediaStore::new());
        let result = MediaPipelineBuilder::new().store(store).build();
        let err = result.expect_err("missing blob store should fail");
        assert!(err.to_string().contains("blob store is required"));
    }

    #[test]
    fn build_with_required_fields_succeeds() {
        let store = Arc::new(MemoryMediaStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let result = MediaPipelineBuilder::new().store(store).blobs(blobs).build();
        assert!(result.is_ok());
    }
}
