use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `POST /upload` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Opaque resource identifier.
    pub resource_key: String,
    /// Share URL with the encryption key in the fragment.
    pub url: String,
    /// When the resource expires.
    pub expires_in: DateTime<Utc>,
}

/// Error body returned by the JSON endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error description.
    pub error: String,
}

/// `GET /health` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is up.
    pub status: String,
}
