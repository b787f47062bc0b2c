//! Shared conformance test suite for [`MediaStore`] backends.
//!
//! Call [`run_store_conformance_tests`] from a backend's test module with a
//! fresh, empty store instance.

use chrono::{Duration, Utc};

use glimpse_core::NewMediaResource;

use crate::error::StoreError;
use crate::store::{MediaStore, ViewLease};

fn new_resource(resource_key: &str) -> NewMediaResource {
    NewMediaResource {
        resource_key: resource_key.to_owned(),
        password_hash: None,
        expires_at: None,
        salt: vec![7u8; 16],
        filename: Some("photo".to_owned()),
        file_extension: Some("jpg".to_owned()),
        blur_enabled: false,
    }
}

/// Run the full metadata store conformance test suite.
///
/// # Errors
///
/// Returns an error if any conformance test fails.
pub async fn run_store_conformance_tests(store: &dyn MediaStore) -> Result<(), StoreError> {
    test_insert_and_get(store).await?;
    test_insert_duplicate(store).await?;
    test_get_missing(store).await?;
    test_expired_row_is_inactive(store).await?;
    test_viewed_filter(store).await?;
    test_begin_view_marks_viewed(store).await?;
    test_begin_view_release_keeps_unviewed(store).await?;
    test_begin_view_missing(store).await?;
    test_delete(store).await?;
    test_expired_listing_and_sweep(store).await?;
    Ok(())
}

async fn test_insert_and_get(store: &dyn MediaStore) -> Result<(), StoreError> {
    let inserted = store.insert(new_resource("conf-insert")).await?;
    assert_eq!(inserted.resource_key, "conf-insert");
    assert!(!inserted.viewed, "fresh rows start unviewed");
    assert_eq!(inserted.salt, vec![7u8; 16]);

    let fetched = store.get_active("conf-insert").await?;
    let fetched = fetched.expect("active row should be found");
    assert_eq!(fetched.id, inserted.id);
    assert_eq!(fetched.filename.as_deref(), Some("photo"));
    assert_eq!(fetched.file_extension.as_deref(), Some("jpg"));
    Ok(())
}

async fn test_insert_duplicate(store: &dyn MediaStore) -> Result<(), StoreError> {
    store.insert(new_resource("conf-dup")).await?;
    let err = store
        .insert(new_resource("conf-dup"))
        .await
        .expect_err("duplicate key should fail");
    assert!(
        matches!(err, StoreError::Duplicate(_)),
        "expected Duplicate, got {err}"
    );
    Ok(())
}

async fn test_get_missing(store: &dyn MediaStore) -> Result<(), StoreError> {
    assert!(store.get_active("conf-missing").await?.is_none());
    assert!(store.get_active_any("conf-missing").await?.is_none());
    Ok(())
}

async fn test_expired_row_is_inactive(store: &dyn MediaStore) -> Result<(), StoreError> {
    let mut resource = new_resource("conf-expired");
    resource.expires_at = Some(Utc::now() - Duration::seconds(5));
    store.insert(resource).await?;

    assert!(
        store.get_active("conf-expired").await?.is_none(),
        "expired rows are filtered from get_active"
    );
    assert!(
        store.get_active_any("conf-expired").await?.is_none(),
        "expired rows are filtered from get_active_any"
    );
    assert!(
        store.get("conf-expired").await?.is_some(),
        "unfiltered get still returns expired rows"
    );
    Ok(())
}

async fn test_viewed_filter(store: &dyn MediaStore) -> Result<(), StoreError> {
    store.insert(new_resource("conf-viewed")).await?;

    let lease = store.begin_view("conf-viewed").await?.expect("row exists");
    lease.mark_viewed().await?;

    assert!(
        store.get_active("conf-viewed").await?.is_none(),
        "viewed rows are filtered from get_active"
    );
    let any = store.get_active_any("conf-viewed").await?;
    assert!(
        any.is_some_and(|r| r.viewed),
        "get_active_any still returns viewed rows"
    );
    Ok(())
}

async fn test_begin_view_marks_viewed(store: &dyn MediaStore) -> Result<(), StoreError> {
    store.insert(new_resource("conf-view")).await?;

    let lease = store.begin_view("conf-view").await?.expect("row exists");
    assert!(!lease.resource().viewed);
    lease.mark_viewed().await?;

    let row = store.begin_view("conf-view").await?.expect("row still exists");
    assert!(row.resource().viewed, "mark_viewed must be visible after commit");
    row.release().await?;
    Ok(())
}

async fn test_begin_view_release_keeps_unviewed(store: &dyn MediaStore) -> Result<(), StoreError> {
    store.insert(new_resource("conf-release")).await?;

    let lease = store.begin_view("conf-release").await?.expect("row exists");
    lease.release().await?;

    let row = store.get_active("conf-release").await?;
    assert!(
        row.is_some_and(|r| !r.viewed),
        "released lease must not mark the row viewed"
    );
    Ok(())
}

async fn test_begin_view_missing(store: &dyn MediaStore) -> Result<(), StoreError> {
    assert!(store.begin_view("conf-view-missing").await?.is_none());
    Ok(())
}

async fn test_delete(store: &dyn MediaStore) -> Result<(), StoreError> {
    store.insert(new_resource("conf-delete")).await?;
    assert!(store.delete("conf-delete").await?);
    assert!(!store.delete("conf-delete").await?, "second delete is a no-op");
    assert!(store.get_active_any("conf-delete").await?.is_none());
    Ok(())
}

async fn test_expired_listing_and_sweep(store: &dyn MediaStore) -> Result<(), StoreError> {
    let mut expired = new_resource("conf-sweep-old");
    expired.expires_at = Some(Utc::now() - Duration::minutes(1));
    store.insert(expired).await?;

    let mut live = new_resource("conf-sweep-live");
    live.expires_at = Some(Utc::now() + Duration::hours(1));
    store.insert(live).await?;

    let keys = store.list_expired().await?;
    assert!(keys.contains(&"conf-sweep-old".to_owned()));
    assert!(!keys.contains(&"conf-sweep-live".to_owned()));

    let removed = store.delete_expired().await?;
    assert!(removed >= 1, "at least the expired row is removed");

    // Idempotent: a second sweep over the same set removes nothing new.
    let keys = store.list_expired().await?;
    assert!(!keys.contains(&"conf-sweep-old".to_owned()));
    assert!(store.get_active("conf-sweep-live").await?.is_some());
    Ok(())
}
