use thiserror::Error;

use glimpse_core::{AccessDenied, ExpiryError};
use glimpse_crypto::CryptoError;
use glimpse_store::StoreError;

/// Error taxonomy surfaced by the media pipeline.
///
/// The request surface maps these onto HTTP statuses: `NotFound` to 404,
/// `Expired` and `AlreadyViewed` to 410, the password variants to 401, the
/// key-format variants and `DecryptionFailed` to 400, and the trailing
/// operational variants to 500.
#[derive(Debug, Error)]
pub enum MediaError {
    /// No such resource (or its blob has already been swept).
    #[error("resource not found")]
    NotFound,

    /// The resource's expiration instant has passed.
    #[error("resource expired")]
    Expired,

    /// The resource was already consumed by a successful download.
    #[error("resource already viewed")]
    AlreadyViewed,

    /// The resource is password protected and no password was supplied.
    #[error("password required")]
    PasswordRequired,

    /// The supplied password does not match.
    #[error("invalid password")]
    InvalidPassword,

    /// No encryption key arrived with the request.
    #[error("encryption key missing from URL")]
    MissingEncryptionKey,

    /// The encryption key was not decodable base64url.
    #[error("invalid encryption key")]
    InvalidEncryptionKey,

    /// Authentication failed during decryption; the view is not burned.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The upload payload exceeds the configured body limit.
    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The expiration input was unparseable or in the past.
    #[error("invalid expiration: {0}")]
    InvalidExpiry(#[from] ExpiryError),

    /// The pipeline was assembled without a required component.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A metadata store failure.
    #[error("metadata store error: {0}")]
    Store(#[from] StoreError),

    /// A blob store failure.
    #[error("blob store error: {0}")]
    Blob(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AccessDenied> for MediaError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Expired => Self::Expired,
            AccessDenied::AlreadyViewed => Self::AlreadyViewed,
            AccessDenied::PasswordRequired => Self::PasswordRequired,
            AccessDenied::InvalidPassword => Self::InvalidPassword,
        }
    }
}

impl From<CryptoError> for MediaError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed | CryptoError::Truncated => Self::DecryptionFailed,
            CryptoError::InvalidKeyEncoding(_) => Self::InvalidEncryptionKey,
            CryptoError::EncryptionFailed(e) => Self::Internal(e),
        }
    }
}
