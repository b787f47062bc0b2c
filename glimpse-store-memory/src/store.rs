use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use glimpse_core::{MediaResource, NewMediaResource};
use glimpse_store::{MediaStore, StoreError, ViewLease};

/// In-memory [`MediaStore`] backed by a [`DashMap`].
///
/// A per-key async [`Mutex`] stands in for the row-level `FOR UPDATE` lock:
/// `begin_view` holds the key's mutex for the lifetime of the lease, so
/// concurrent consumers of the same resource serialize exactly as they do
/// against the PostgreSQL backend. Intended as a test double.
#[derive(Debug, Default)]
pub struct MemoryMediaStore {
    rows: Arc<DashMap<String, MediaResource>>,
    view_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryMediaStore {
    /// Create a new, empty in-memory media store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn view_lock(&self, resource_key: &str) -> Arc<Mutex<()>> {
        self.view_locks
            .entry(resource_key.to_owned())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn insert(&self, resource: NewMediaResource) -> Result<MediaResource, StoreError> {
        let row = MediaResource {
            id: Uuid::new_v4(),
            resource_key: resource.resource_key.clone(),
            password_hash: resource.password_hash,
            expires_at: resource.expires_at,
            viewed: false,
            created_at: Utc::now(),
            salt: resource.salt,
            filename: resource.filename,
            file_extension: resource.file_extension,
            blur_enabled: resource.blur_enabled,
        };

        match self.rows.entry(resource.resource_key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::Duplicate(resource.resource_key))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let row = vacant.insert(row).clone();
                Ok(row)
            }
        }
    }

    async fn get(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError> {
        Ok(self.rows.get(resource_key).map(|row| row.value().clone()))
    }

    async fn get_active(&self, resource_key: &str) -> Result<Option<MediaResource>, StoreError> {
        let now = Utc::now();
        Ok(self
            .rows
            .get(resource_key)
            .filter(|row| !row.is_expired(now) && !row.viewed)
            .map(|row| row.value().clone()))
    }

    async fn get_active_any(
        &self,
        resource_key: &str,
    ) -> Result<Option<MediaResource>, StoreError> {
        let now = Utc::now();
        Ok(self
            .rows
            .get(resource_key)
            .filter(|row| !row.is_expired(now))
            .map(|row| row.value().clone()))
    }

    async fn begin_view(
        &self,
        resource_key: &str,
    ) -> Result<Option<Box<dyn ViewLease>>, StoreError> {
        let guard = self.view_lock(resource_key).lock_owned().await;

        // Read the row only after the lock is held, so a concurrent
        // mark_viewed is observed.
        let Some(resource) = self.rows.get(resource_key).map(|row| row.value().clone()) else {
            return Ok(None);
        };

        Ok(Some(Box::new(MemoryViewLease {
            resource,
            rows: Arc::clone(&self.rows),
            _guard: guard,
        })))
    }

    async fn delete(&self, resource_key: &str) -> Result<bool, StoreError> {
        Ok(self.rows.remove(resource_key).is_some())
    }

    async fn list_expired(&self) -> Result<Vec<String>, StoreError> {
        let now = Utc::now();
        Ok(self
            .rows
            .iter()
            .filter(|row| row.expires_at.is_some_and(|deadline| deadline <= now))
            .map(|row| row.key().clone())
            .collect())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let before = self.rows.len();
        self.rows
            .retain(|_, row| !row.expires_at.is_some_and(|deadline| deadline <= now));
        Ok((before - self.rows.len()) as u64)
    }
}

/// Lease holding a per-key mutex in place of a database row lock.
struct MemoryViewLease {
    resource: MediaResource,
    rows: Arc<DashMap<String, MediaResource>>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl ViewLease for MemoryViewLease {
    fn resource(&self) -> &MediaResource {
        &self.resource
    }

    async fn mark_viewed(self: Box<Self>) -> Result<(), StoreError> {
        if let Some(mut row) = self.rows.get_mut(&self.resource.resource_key) {
            row.viewed = true;
        }
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
