use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use glimpse_blob::{BlobError, BlobStore};
use glimpse_core::resource::split_filename;
use glimpse_core::{check_access, MediaResource, NewMediaResource};
use glimpse_crypto::Encryptor;
use glimpse_store::{MediaStore, ViewLease};

use crate::error::MediaError;

/// Blob keys are the resource key under this prefix.
const BLOB_PREFIX: &str = "media/";

/// Default upload body limit: 100 MiB.
pub const DEFAULT_BODY_LIMIT: u64 = 100 * 1024 * 1024;

/// An upload: the payload plus its protection and naming options.
///
/// `expires_at` is the already-resolved instant; the request surface owns
/// parsing and the 24-hour default, so `None` here means "never expires".
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Bytes,
    pub password: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub filename: Option<String>,
    pub blur_enabled: bool,
}

/// The two halves of a share URL.
///
/// `encryption_key` travels back to the uploader only; it is never stored
/// and never logged.
#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub resource_key: String,
    pub encryption_key: String,
}

impl UploadResponse {
    /// Canonical share URL: the encryption key rides in the fragment, which
    /// browsers do not transmit.
    #[must_use]
    pub fn url(&self) -> String {
        format!("/media/{}#{}", self.resource_key, self.encryption_key)
    }
}

/// A retrieval request, for both the preview and the consuming download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub resource_key: String,
    pub password: Option<String>,
    /// The fragment key, relayed by the client as a query parameter or an
    /// embedded `key#fragment` path token.
    pub encryption_key: Option<String>,
}

/// Decrypted payload plus the naming metadata the surface needs for
/// `Content-Disposition` and content-type mapping.
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    pub data: Bytes,
    pub filename: Option<String>,
    pub file_extension: Option<String>,
}

/// Resource metadata for the view page; never includes secrets.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub filename: Option<String>,
    pub file_extension: Option<String>,
    pub display_filename: String,
    pub is_image: bool,
    pub blur_enabled: bool,
    pub password_required: bool,
}

/// The media pipeline: orchestrates crypto, the blob store, and the
/// metadata store. Construct via [`crate::MediaPipelineBuilder`].
///
/// Shared process-wide behind an `Arc`; all methods take `&self` and are
/// safe for concurrent use.
pub struct MediaPipeline {
    pub(crate) store: Arc<dyn MediaStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) encryptor: Encryptor,
    pub(crate) body_limit: u64,
}

impl std::fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("body_limit", &self.body_limit)
            .finish_non_exhaustive()
    }
}

impl MediaPipeline {
    fn blob_key(resource_key: &str) -> String {
        format!("{BLOB_PREFIX}{resource_key}")
    }

    /// The secret fed to key derivation: the raw fragment key, prefixed by
    /// the user password when one is set. Neither half alone decrypts.
    fn password_material(password: Option<&str>, key_bytes: &[u8]) -> Vec<u8> {
        match password {
            Some(password) if !password.is_empty() => {
                let mut material = Vec::with_capacity(password.len() + key_bytes.len());
                material.extend_from_slice(password.as_bytes());
                material.extend_from_slice(key_bytes);
                material
            }
            _ => key_bytes.to_vec(),
        }
    }

    /// Decode the fragment key, mapping absence and bad encoding to their
    /// own errors.
    fn decode_fragment_key(encryption_key: Option<&str>) -> Result<Vec<u8>, MediaError> {
        let encoded = encryption_key
            .filter(|k| !k.is_empty())
            .ok_or(MediaError::MissingEncryptionKey)?;
        glimpse_crypto::decode_key(encoded).map_err(|_| MediaError::InvalidEncryptionKey)
    }

    /// Upload a payload: encrypt under a fresh fragment key, write the
    /// ciphertext blob, then insert the metadata row. A failed insert rolls
    /// the blob back so no orphan ciphertext survives the request.
    #[instrument(skip(self, request), fields(size = request.data.len()))]
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadResponse, MediaError> {
        let size = request.data.len() as u64;
        if size > self.body_limit {
            return Err(MediaError::TooLarge {
                size,
                limit: self.body_limit,
            });
        }

        let resource_key = glimpse_crypto::generate_resource_key();
        let key_bytes = glimpse_crypto::generate_key();
        let encryption_key = glimpse_crypto::encode_key(&key_bytes);

        let material = Self::password_material(request.password.as_deref(), &key_bytes);

        // PBKDF2 + AES are CPU-bound; keep them off the async workers.
        let encryptor = self.encryptor.clone();
        let data = request.data.clone();
        let (ciphertext, salt) =
            tokio::task::spawn_blocking(move || encryptor.encrypt(&data, &material))
                .await
                .map_err(|e| MediaError::Internal(e.to_string()))??;

        let blob_key = Self::blob_key(&resource_key);
        self.blobs
            .put(None, &blob_key, Bytes::from(ciphertext))
            .await
            .map_err(|e| MediaError::Blob(e.to_string()))?;

        let password_hash = match request.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                let password = password.to_owned();
                let hashed =
                    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
                        .await
                        .map_err(|e| MediaError::Internal(e.to_string()))
                        .and_then(|r| r.map_err(|e| MediaError::Internal(e.to_string())));
                match hashed {
                    Ok(hash) => Some(hash),
                    Err(e) => {
                        self.rollback_blob(&blob_key).await;
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        let (filename, file_extension) = request
            .filename
            .as_deref()
            .map(split_filename)
            .unwrap_or((None, None));

        let insert = self
            .store
            .insert(NewMediaResource {
                resource_key: resource_key.clone(),
                password_hash,
                expires_at: request.expires_at,
                salt: salt.to_vec(),
                filename,
                file_extension,
                blur_enabled: request.blur_enabled,
            })
            .await;

        if let Err(e) = insert {
            self.rollback_blob(&blob_key).await;
            return Err(e.into());
        }

        info!(resource_key = %resource_key, size, "media uploaded");

        Ok(UploadResponse {
            resource_key,
            encryption_key,
        })
    }

    async fn rollback_blob(&self, blob_key: &str) {
        if let Err(e) = self.blobs.delete(None, blob_key).await {
            warn!(blob_key = %blob_key, error = %e, "failed to roll back blob after upload error");
        }
    }

    /// Metadata for the view page, via the viewed-tolerant lookup so the
    /// already-viewed page can still name the file.
    pub async fn media_info(&self, resource_key: &str) -> Result<MediaInfo, MediaError> {
        let resource = self
            .store
            .get_active_any(resource_key)
            .await?
            .ok_or(MediaError::NotFound)?;

        Ok(MediaInfo {
            display_filename: resource.display_filename(),
            is_image: resource.is_image(),
            blur_enabled: resource.blur_enabled,
            password_required: resource.password_hash.is_some(),
            filename: resource.filename,
            file_extension: resource.file_extension,
        })
    }

    /// Apply the access guard without touching blobs. The view page uses
    /// this to decide between the password prompt and the error pages.
    pub async fn verify_access(
        &self,
        resource_key: &str,
        password: Option<&str>,
    ) -> Result<(), MediaError> {
        let resource = self
            .store
            .get(resource_key)
            .await?
            .ok_or(MediaError::NotFound)?;
        check_access(&resource, password, Utc::now())?;
        Ok(())
    }

    /// Non-consuming retrieval for inline image previews. Decrypts like the
    /// download but neither locks the row nor marks it viewed.
    #[instrument(skip(self, request), fields(resource_key = %request.resource_key))]
    pub async fn preview(&self, request: &DownloadRequest) -> Result<DownloadResponse, MediaError> {
        let key_bytes = Self::decode_fragment_key(request.encryption_key.as_deref())?;

        let resource = match self.store.get_active(&request.resource_key).await? {
            Some(resource) => resource,
            None => return Err(self.classify_unavailable(&request.resource_key).await?),
        };
        check_access(&resource, request.password.as_deref(), Utc::now())?;

        let response = self
            .fetch_and_decrypt(&resource, request.password.as_deref(), &key_bytes)
            .await?;

        Ok(response)
    }

    /// Consuming one-shot download.
    ///
    /// Runs under the store's exclusive view lease: policy is re-checked
    /// under the lock, and `viewed` flips in the same transaction only
    /// after decryption succeeds. Concurrent consumers of one key
    /// serialize here; exactly one wins, the rest observe `AlreadyViewed`.
    /// A decryption failure releases the lease without marking, so the
    /// single view survives a mistyped password or fragment.
    #[instrument(skip(self, request), fields(resource_key = %request.resource_key))]
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadResponse, MediaError> {
        let key_bytes = Self::decode_fragment_key(request.encryption_key.as_deref())?;

        let lease = self
            .store
            .begin_view(&request.resource_key)
            .await?
            .ok_or(MediaError::NotFound)?;

        if let Err(denied) =
            check_access(lease.resource(), request.password.as_deref(), Utc::now())
        {
            lease.release().await?;
            return Err(denied.into());
        }

        let resource = lease.resource().clone();
        let response = match self
            .fetch_and_decrypt(&resource, request.password.as_deref(), &key_bytes)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                lease.release().await?;
                return Err(e);
            }
        };

        lease.mark_viewed().await?;
        info!(resource_key = %request.resource_key, "media consumed");

        Ok(response)
    }

    /// Remove everything past its expiration instant: blobs first
    /// (best-effort, logged), then the metadata rows in one statement.
    /// Returns the number of rows removed. Idempotent.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Result<u64, MediaError> {
        let expired = self.store.list_expired().await?;

        for resource_key in &expired {
            match self.blobs.delete(None, &Self::blob_key(resource_key)).await {
                Ok(()) => info!(resource_key = %resource_key, "deleted expired blob"),
                Err(e) => {
                    warn!(resource_key = %resource_key, error = %e, "failed to delete expired blob");
                }
            }
        }

        let removed = self.store.delete_expired().await?;
        info!(removed, "expiration sweep complete");
        Ok(removed)
    }

    /// Map an active-lookup miss onto the precise error: the row may be
    /// missing outright, expired, or already consumed.
    async fn classify_unavailable(&self, resource_key: &str) -> Result<MediaError, MediaError> {
        let Some(resource) = self.store.get(resource_key).await? else {
            return Ok(MediaError::NotFound);
        };
        if resource.is_expired(Utc::now()) {
            Ok(MediaError::Expired)
        } else if resource.viewed {
            Ok(MediaError::AlreadyViewed)
        } else {
            Ok(MediaError::NotFound)
        }
    }

    async fn fetch_and_decrypt(
        &self,
        resource: &MediaResource,
        password: Option<&str>,
        key_bytes: &[u8],
    ) -> Result<DownloadResponse, MediaError> {
        let ciphertext = self
            .blobs
            .get(None, &Self::blob_key(&resource.resource_key))
            .await
            .map_err(|e| match e {
                BlobError::NotFound(_) => MediaError::NotFound,
                other => MediaError::Blob(other.to_string()),
            })?;

        let material = Self::password_material(password, key_bytes);
        let encryptor = self.encryptor.clone();
        let salt = resource.salt.clone();
        let plaintext =
            tokio::task::spawn_blocking(move || encryptor.decrypt(&ciphertext, &salt, &material))
                .await
                .map_err(|e| MediaError::Internal(e.to_string()))??;

        Ok(DownloadResponse {
            data: Bytes::from(plaintext),
            filename: resource.filename.clone(),
            file_extension: resource.file_extension.clone(),
        })
    }
}
