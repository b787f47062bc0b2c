//! The ephemeral media pipeline.
//!
//! Orchestrates the upload path (key generation, client-keyed encryption,
//! blob write, metadata insert, rollback) and the retrieval paths (a
//! non-consuming preview and the one-shot consuming download), plus the
//! expiration sweep. The one-shot guarantee lives here: the consuming
//! download holds the store's row-level view lease while it re-checks
//! policy, decrypts, and flips the `viewed` flag.

pub mod builder;
pub mod error;
pub mod pipeline;

pub use builder::MediaPipelineBuilder;
pub use error::MediaError;
pub use pipeline::{
    DownloadRequest, DownloadResponse, MediaInfo, MediaPipeline, UploadRequest, UploadResponse,
};
