use thiserror::Error;

/// Errors from metadata store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connecting to the backend failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Insert collided with an existing `resource_key`.
    #[error("duplicate resource key: {0}")]
    Duplicate(String),

    /// A backend query failed.
    #[error("backend error: {0}")]
    Backend(String),
}
