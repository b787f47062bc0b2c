use thiserror::Error;

/// Errors that can occur when starting the Glimpse server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A pipeline-level error surfaced during startup.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] glimpse_pipeline::MediaError),

    /// A metadata store error surfaced during startup.
    #[error("store error: {0}")]
    Store(#[from] glimpse_store::StoreError),
}
