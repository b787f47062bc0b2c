use async_trait::async_trait;

use glimpse_core::{MediaResource, NewMediaResource};

use crate::error::StoreError;

/// Trait for persisting media resource metadata.
///
/// One row per uploaded object. Rows are created by the upload pipeline,
/// mutated once by the consuming download (`viewed = true` through a
/// [`ViewLease`]), and deleted by the expiration sweep. Implementations
/// must be `Send + Sync` and safe for concurrent access.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Insert a new row. Fails with [`StoreError::Duplicate`] when the
    /// `resource_key` already exists.
    async fn insert(&self, resource: NewMediaResource) -> Result<MediaResource, StoreError>;

    /// Fetch a row by key with no availability filter. Callers that need
    /// to distinguish "expired" and "already viewed" from "missing" read
    /// through this and apply policy themselves.
    async fn get(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError>;

    /// Fetch a row that is neither expired nor viewed. Returns `None` for
    /// missing, expired, and already-consumed rows alike.
    async fn get_active(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError>;

    /// Like [`MediaStore::get_active`] but without the viewed filter, so
    /// the already-viewed page can still present metadata.
    async fn get_active_any(&self, resource_key: &str)
        -> Result<Option<MediaResource>, StoreError>;

    /// Acquire the row under an exclusive row-level lock for a consuming
    /// download. Returns `None` when the row does not exist.
    ///
    /// The row is fetched unfiltered: expiration and the one-shot flag are
    /// re-checked by the caller under the lock, so concurrent consumers of
    /// the same key serialize and all but one observe `viewed = true`. The
    /// lock is held until the lease is consumed via
    /// [`ViewLease::mark_viewed`] or [`ViewLease::release`] (dropping the
    /// lease also releases without marking).
    async fn begin_view(&self, resource_key: &str)
        -> Result<Option<Box<dyn ViewLease>>, StoreError>;

    /// Delete a row. Returns `true` if the row existed.
    async fn delete(&self, resource_key: &str) -> Result<bool, StoreError>;

    /// Snapshot the keys of all rows whose `expires_at` has passed.
    async fn list_expired(&self) -> Result<Vec<String>, StoreError>;

    /// Delete all expired rows in one statement. Returns the number of
    /// rows removed.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}

/// An exclusive, in-flight claim on a row for a consuming download.
///
/// Exactly one lease per `resource_key` exists at a time; a second
/// `begin_view` blocks until the first lease is consumed or dropped.
#[async_trait]
pub trait ViewLease: Send {
    /// The locked row as it was when the lease was taken.
    fn resource(&self) -> &MediaResource;

    /// Set `viewed = true` and commit, consuming the lease. After this
    /// returns, every later read observes the row as consumed.
    async fn mark_viewed(self: Box<Self>) -> Result<(), StoreError>;

    /// Abort without marking, consuming the lease. Used when decryption
    /// fails so the single view is not burned.
    async fn release(self: Box<Self>) -> Result<(), StoreError>;
}
