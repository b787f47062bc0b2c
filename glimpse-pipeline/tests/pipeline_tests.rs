use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};

use glimpse_blob_memory::MemoryBlobStore;
use glimpse_core::{MediaResource, NewMediaResource};
use glimpse_pipeline::{
    DownloadRequest, MediaError, MediaPipeline, MediaPipelineBuilder, UploadRequest,
};
use glimpse_store::{MediaStore, StoreError, ViewLease};
use glimpse_store_memory::MemoryMediaStore;

// Low iteration count keeps PBKDF2 fast in tests; the count is not under test.
const TEST_ITERATIONS: u32 = 1_000;

struct Harness {
    pipeline: Arc<MediaPipeline>,
    store: Arc<MemoryMediaStore>,
    blobs: Arc<MemoryBlobStore>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryMediaStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let pipeline = MediaPipelineBuilder::new()
        .store(Arc::clone(&store) as Arc<dyn MediaStore>)
        .blobs(Arc::clone(&blobs) as Arc<dyn glimpse_blob::BlobStore>)
        .pbkdf2_iterations(TEST_ITERATIONS)
        .build()
        .expect("pipeline should build");

    Harness {
        pipeline: Arc::new(pipeline),
        store,
        blobs,
    }
}

fn upload_request(data: &'static [u8]) -> UploadRequest {
    UploadRequest {
        data: Bytes::from_static(data),
        password: None,
        expires_at: None,
        filename: Some("photo.jpg".to_owned()),
        blur_enabled: false,
    }
}

fn download_request(resource_key: &str, encryption_key: &str) -> DownloadRequest {
    DownloadRequest {
        resource_key: resource_key.to_owned(),
        password: None,
        encryption_key: Some(encryption_key.to_owned()),
    }
}

#[tokio::test]
async fn upload_returns_opaque_url_parts() {
    let h = harness();
    let resp = h.pipeline.upload(upload_request(b"hello world")).await.unwrap();

    assert_eq!(resp.resource_key.len(), 22);
    assert_eq!(resp.encryption_key.len(), 43);
    assert_eq!(
        resp.url(),
        format!("/media/{}#{}", resp.resource_key, resp.encryption_key)
    );
    assert!(h.blobs.contains(None, &format!("media/{}", resp.resource_key)));
}

#[tokio::test]
async fn download_roundtrip_and_one_shot() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"hello world")).await.unwrap();

    let req = download_request(&up.resource_key, &up.encryption_key);
    let down = h.pipeline.download(&req).await.unwrap();
    assert_eq!(down.data.as_ref(), b"hello world");
    assert_eq!(down.filename.as_deref(), Some("photo"));
    assert_eq!(down.file_extension.as_deref(), Some("jpg"));

    // The blob outlives consumption; only the sweep removes it.
    assert!(h.blobs.contains(None, &format!("media/{}", up.resource_key)));

    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::AlreadyViewed), "got {err}");
}

#[tokio::test]
async fn exactly_one_of_concurrent_downloads_wins() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"contended payload")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pipeline = Arc::clone(&h.pipeline);
        let req = download_request(&up.resource_key, &up.encryption_key);
        handles.push(tokio::spawn(async move { pipeline.download(&req).await }));
    }

    let mut successes = 0;
    let mut already_viewed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(resp) => {
                assert_eq!(resp.data.as_ref(), b"contended payload");
                successes += 1;
            }
            Err(MediaError::AlreadyViewed) => already_viewed += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(successes, 1, "exactly one download may succeed");
    assert_eq!(already_viewed, 9);
}

#[tokio::test]
async fn password_protection_flow() {
    let h = harness();
    let up = h
        .pipeline
        .upload(UploadRequest {
            password: Some("s3cr3t".to_owned()),
            ..upload_request(b"guarded")
        })
        .await
        .unwrap();

    let mut req = download_request(&up.resource_key, &up.encryption_key);
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::PasswordRequired), "got {err}");

    req.password = Some("wrong".to_owned());
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::InvalidPassword), "got {err}");

    // Failed attempts must not burn the one view.
    let row = h.store.get(&up.resource_key).await.unwrap().unwrap();
    assert!(!row.viewed);

    req.password = Some("s3cr3t".to_owned());
    let down = h.pipeline.download(&req).await.unwrap();
    assert_eq!(down.data.as_ref(), b"guarded");
}

#[tokio::test]
async fn preview_does_not_consume() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"inline image")).await.unwrap();
    let req = download_request(&up.resource_key, &up.encryption_key);

    for _ in 0..3 {
        let preview = h.pipeline.preview(&req).await.unwrap();
        assert_eq!(preview.data.as_ref(), b"inline image");
    }

    let row = h.store.get(&up.resource_key).await.unwrap().unwrap();
    assert!(!row.viewed, "previews never mark viewed");

    // The one-shot download still works afterwards.
    let down = h.pipeline.download(&req).await.unwrap();
    assert_eq!(down.data.as_ref(), b"inline image");

    let err = h.pipeline.preview(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::AlreadyViewed), "got {err}");
}

#[tokio::test]
async fn missing_and_invalid_fragment_keys() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"payload")).await.unwrap();

    let mut req = download_request(&up.resource_key, "");
    req.encryption_key = None;
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::MissingEncryptionKey), "got {err}");

    req.encryption_key = Some(String::new());
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::MissingEncryptionKey), "got {err}");

    req.encryption_key = Some("!!!not-base64!!!".to_owned());
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::InvalidEncryptionKey), "got {err}");
}

#[tokio::test]
async fn wrong_fragment_key_does_not_burn_the_view() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"retryable")).await.unwrap();

    let wrong_key = glimpse_crypto::encode_key(&glimpse_crypto::generate_key());
    let req = download_request(&up.resource_key, &wrong_key);
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::DecryptionFailed), "got {err}");

    let row = h.store.get(&up.resource_key).await.unwrap().unwrap();
    assert!(!row.viewed, "decryption failure must not mark viewed");

    // Retrying with the correct fragment succeeds.
    let req = download_request(&up.resource_key, &up.encryption_key);
    let down = h.pipeline.download(&req).await.unwrap();
    assert_eq!(down.data.as_ref(), b"retryable");
}

#[tokio::test]
async fn corrupted_blob_fails_closed() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"integrity")).await.unwrap();

    assert!(h.blobs.corrupt(None, &format!("media/{}", up.resource_key)));

    let req = download_request(&up.resource_key, &up.encryption_key);
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::DecryptionFailed), "got {err}");

    let row = h.store.get(&up.resource_key).await.unwrap().unwrap();
    assert!(!row.viewed);

    // The damage is permanent, but every retry reports the same failure
    // instead of a burned view.
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::DecryptionFailed), "got {err}");
}

#[tokio::test]
async fn expired_resource_reads_as_expired_regardless_of_viewed() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"short-lived")).await.unwrap();

    // Backdate the expiration directly in the store.
    {
        let row = h.store.get(&up.resource_key).await.unwrap().unwrap();
        h.store.delete(&up.resource_key).await.unwrap();
        h.store
            .insert(NewMediaResource {
                resource_key: row.resource_key.clone(),
                password_hash: row.password_hash.clone(),
                expires_at: Some(Utc::now() - Duration::seconds(2)),
                salt: row.salt.clone(),
                filename: row.filename.clone(),
                file_extension: row.file_extension.clone(),
                blur_enabled: row.blur_enabled,
            })
            .await
            .unwrap();
    }

    let req = download_request(&up.resource_key, &up.encryption_key);
    let err = h.pipeline.download(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::Expired), "got {err}");

    let err = h.pipeline.preview(&req).await.unwrap_err();
    assert!(matches!(err, MediaError::Expired), "got {err}");

    let err = h.pipeline.verify_access(&up.resource_key, None).await.unwrap_err();
    assert!(matches!(err, MediaError::Expired), "got {err}");
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let h = harness();
    let req = download_request("AAAAAAAAAAAAAAAAAAAAAA", &glimpse_crypto::encode_key(&[1; 32]));

    assert!(matches!(h.pipeline.download(&req).await.unwrap_err(), MediaError::NotFound));
    assert!(matches!(h.pipeline.preview(&req).await.unwrap_err(), MediaError::NotFound));
    assert!(matches!(
        h.pipeline.media_info("AAAAAAAAAAAAAAAAAAAAAA").await.unwrap_err(),
        MediaError::NotFound
    ));
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let store = Arc::new(MemoryMediaStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let pipeline = MediaPipelineBuilder::new()
        .store(store)
        .blobs(Arc::clone(&blobs) as Arc<dyn glimpse_blob::BlobStore>)
        .pbkdf2_iterations(TEST_ITERATIONS)
        .body_limit(8)
        .build()
        .unwrap();

    let err = pipeline
        .upload(upload_request(b"nine bytes"))
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::TooLarge { size: 10, limit: 8 }), "got {err}");
    assert!(blobs.is_empty(), "nothing may reach the blob store");
}

#[tokio::test]
async fn media_info_reports_metadata() {
    let h = harness();
    let up = h
        .pipeline
        .upload(UploadRequest {
            password: Some("pw".to_owned()),
            blur_enabled: true,
            ..upload_request(b"img")
        })
        .await
        .unwrap();

    let info = h.pipeline.media_info(&up.resource_key).await.unwrap();
    assert_eq!(info.display_filename, "photo.jpg");
    assert!(info.is_image);
    assert!(info.blur_enabled);
    assert!(info.password_required);
}

#[tokio::test]
async fn media_info_survives_consumption() {
    let h = harness();
    let up = h.pipeline.upload(upload_request(b"seen")).await.unwrap();
    let req = download_request(&up.resource_key, &up.encryption_key);
    h.pipeline.download(&req).await.unwrap();

    // The already-viewed page still names the file.
    let info = h.pipeline.media_info(&up.resource_key).await.unwrap();
    assert_eq!(info.display_filename, "photo.jpg");
}

#[tokio::test]
async fn unicode_filename_is_preserved() {
    let h = harness();
    let up = h
        .pipeline
        .upload(UploadRequest {
            filename: Some("отчёт.pdf".to_owned()),
            ..upload_request(b"report")
        })
        .await
        .unwrap();

    let req = download_request(&up.resource_key, &up.encryption_key);
    let down = h.pipeline.download(&req).await.unwrap();
    assert_eq!(down.filename.as_deref(), Some("отчёт"));
    assert_eq!(down.file_extension.as_deref(), Some("pdf"));
}

#[tokio::test]
async fn sweep_removes_expired_rows_and_blobs() {
    let h = harness();
    let expired = h
        .pipeline
        .upload(UploadRequest {
            expires_at: Some(Utc::now() + Duration::milliseconds(10)),
            ..upload_request(b"doomed")
        })
        .await
        .unwrap();
    let live = h
        .pipeline
        .upload(UploadRequest {
            expires_at: Some(Utc::now() + Duration::hours(1)),
            ..upload_request(b"alive")
        })
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let removed = h.pipeline.sweep_expired().await.unwrap();
    assert_eq!(removed, 1);
    assert!(!h.blobs.contains(None, &format!("media/{}", expired.resource_key)));
    assert!(h.blobs.contains(None, &format!("media/{}", live.resource_key)));
    assert!(h.store.get(&expired.resource_key).await.unwrap().is_none());

    // Idempotent: a second sweep finds nothing.
    let removed = h.pipeline.sweep_expired().await.unwrap();
    assert_eq!(removed, 0);
}

// -- Rollback ---------------------------------------------------------------

/// Store wrapper whose insert always fails, for exercising upload rollback.
struct FailingInsertStore {
    inner: MemoryMediaStore,
}

#[async_trait]
impl MediaStore for FailingInsertStore {
    async fn insert(&self, _resource: NewMediaResource) -> Result<MediaResource, StoreError> {
        Err(StoreError::Backend("insert refused".to_owned()))
    }

    async fn get(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError> {
        self.inner.get(resource_key).await
    }

    async fn get_active(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError> {
        self.inner.get_active(resource_key).await
    }

    async fn get_active_any(
        &self,
        resource_key: &str,
    ) -> Result<Option<MediaResource>, StoreError> {
        self.inner.get_active_any(resource_key).await
    }

    async fn begin_view(
        &self,
        resource_key: &str,
    ) -> Result<Option<Box<dyn ViewLease>>, StoreError> {
        self.inner.begin_view(resource_key).await
    }

    async fn delete(&self, resource_key: &str) -> Result<bool, StoreError> {
        self.inner.delete(resource_key).await
    }

    async fn list_expired(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_expired().await
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        self.inner.delete_expired().await
    }
}

#[tokio::test]
async fn failed_insert_rolls_back_the_blob() {
    let store = Arc::new(FailingInsertStore {
        inner: MemoryMediaStore::new(),
    });
    let blobs = Arc::new(MemoryBlobStore::new());
    let pipeline = MediaPipelineBuilder::new()
        .store(store)
        .blobs(Arc::clone(&blobs) as Arc<dyn glimpse_blob::BlobStore>)
        .pbkdf2_iterations(TEST_ITERATIONS)
        .build()
        .unwrap();

    let err = pipeline.upload(upload_request(b"orphan")).await.unwrap_err();
    assert!(matches!(err, MediaError::Store(_)), "got {err}");
    assert!(blobs.is_empty(), "blob must be rolled back after insert failure");
}
