use serde::{Deserialize, Serialize};

/// Configuration for the S3 blob storage backend.
///
/// Works against AWS proper and against S3-compatible services (MinIO,
/// LocalStack) via the endpoint URL override, which also switches the
/// client to path-style addressing.
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// AWS region (e.g. `"us-east-1"`).
    #[serde(default = "default_region")]
    pub region: String,

    /// Default bucket name. Callers may override per call.
    #[serde(default)]
    pub bucket: String,

    /// Optional endpoint URL override for S3-compatible services.
    pub endpoint_url: Option<String>,

    /// Optional static access key id. When unset, the SDK's standard
    /// environment credential chain applies.
    pub access_key_id: Option<String>,

    /// Optional static secret access key.
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "[REDACTED]"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl S3Config {
    /// Create a new `S3Config` with the given region and default bucket.
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            bucket: bucket.into(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Set the endpoint URL override (for MinIO / LocalStack).
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Set static credentials instead of the environment credential chain.
    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }
}

fn default_region() -> String {
    "us-east-1".to_owned()
}
