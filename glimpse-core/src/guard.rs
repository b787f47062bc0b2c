use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::resource::MediaResource;

/// Reasons a candidate request is refused access to a resource.
///
/// `NotFound` is not represented here: the guard operates on a row that was
/// already fetched, so absence is decided by the store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// The resource's expiration instant has passed.
    #[error("resource expired")]
    Expired,

    /// The resource was already consumed by a successful download.
    #[error("resource already viewed")]
    AlreadyViewed,

    /// The resource is password protected and no password was supplied.
    #[error("password required")]
    PasswordRequired,

    /// The supplied password does not match the stored verifier.
    #[error("invalid password")]
    InvalidPassword,
}

/// Decide whether a candidate request may proceed against a metadata row.
///
/// Pure policy: expiration first, then the one-shot flag, then the password.
/// Used both by informational endpoints (to decide whether to show a
/// password prompt) and as the authorization step inside the download
/// transaction. Never touches the blob store.
pub fn check_access(
    resource: &MediaResource,
    password: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), AccessDenied> {
    if resource.is_expired(now) {
        return Err(AccessDenied::Expired);
    }

    if resource.viewed {
        return Err(AccessDenied::AlreadyViewed);
    }

    if let Some(hash) = resource.password_hash.as_deref() {
        let candidate = password.unwrap_or("");
        if candidate.is_empty() {
            return Err(AccessDenied::PasswordRequired);
        }
        if !bcrypt::verify(candidate, hash).unwrap_or(false) {
            return Err(AccessDenied::InvalidPassword);
        }
    }

    Ok(())
}
