use serde::Deserialize;

use glimpse_blob_s3::S3Config;
use glimpse_store_postgres::PostgresConfig;

/// Top-level configuration for the Glimpse server, loaded from a TOML file
/// with environment variable overrides applied on top.
#[derive(Debug, Default, Deserialize)]
pub struct GlimpseConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logger: LoggerConfig,
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata store backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Blob store backend configuration.
    #[serde(default)]
    pub blob: BlobConfig,
    /// Encryption parameters.
    #[serde(default)]
    pub encryption: EncryptionConfig,
    /// Expiration sweep configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggerConfig {
    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`).
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit: u64,
    /// Graceful shutdown budget in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

/// Which metadata store backend to run against.
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// `"postgres"` or `"memory"`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// PostgreSQL settings, used when `backend = "postgres"`.
    #[serde(default)]
    pub postgres: PostgresConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            postgres: PostgresConfig::default(),
        }
    }
}

/// Which blob store backend to run against.
#[derive(Debug, Deserialize)]
pub struct BlobConfig {
    /// `"s3"` or `"memory"`.
    #[serde(default = "default_blob_backend")]
    pub backend: String,
    /// S3 settings, used when `backend = "s3"`.
    #[serde(default = "default_s3")]
    pub s3: S3Config,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: default_blob_backend(),
            s3: default_s3(),
        }
    }
}

/// Encryption parameters.
#[derive(Debug, Deserialize)]
pub struct EncryptionConfig {
    /// PBKDF2 iteration count. Changing this orphans previously stored
    /// blobs, which were sealed under the old count.
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: default_pbkdf2_iterations(),
        }
    }
}

/// Expiration sweep configuration.
#[derive(Debug, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweep runs.
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
    /// Per-run time budget in seconds.
    #[serde(default = "default_sweep_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval(),
            timeout_seconds: default_sweep_timeout(),
        }
    }
}

impl GlimpseConfig {
    /// Apply environment variable overrides on top of the loaded file.
    ///
    /// Every deployment-relevant setting has an override so the server can
    /// be configured entirely from the environment in containers.
    pub fn apply_env(&mut self) {
        override_string("LOG_LEVEL", &mut self.logger.level);

        override_string("SERVER_HOST", &mut self.server.host);
        override_parse("SERVER_PORT", &mut self.server.port);
        override_parse("SERVER_BODY_LIMIT", &mut self.server.body_limit);

        override_string("STORE_BACKEND", &mut self.store.backend);
        override_string("POSTGRES_HOST", &mut self.store.postgres.host);
        override_parse("POSTGRES_PORT", &mut self.store.postgres.port);
        override_string("POSTGRES_USER", &mut self.store.postgres.user);
        override_string("POSTGRES_PASSWORD", &mut self.store.postgres.password);
        override_string("POSTGRES_DB", &mut self.store.postgres.dbname);
        override_string("POSTGRES_SSLMODE", &mut self.store.postgres.sslmode);

        override_string("BLOB_BACKEND", &mut self.blob.backend);
        override_string("S3_REGION", &mut self.blob.s3.region);
        override_string("S3_BUCKET", &mut self.blob.s3.bucket);
        override_opt_string("S3_ENDPOINT", &mut self.blob.s3.endpoint_url);
        override_opt_string("S3_ACCESS_KEY_ID", &mut self.blob.s3.access_key_id);
        override_opt_string("S3_SECRET_ACCESS_KEY", &mut self.blob.s3.secret_access_key);

        override_parse("PBKDF2_ITERATIONS", &mut self.encryption.pbkdf2_iterations);
        override_parse("SWEEP_INTERVAL_SECONDS", &mut self.sweep.interval_seconds);
    }
}

fn override_string(var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn override_opt_string(var: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(var) {
        if !value.is_empty() {
            *target = Some(value);
        }
    }
}

fn override_parse<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(value) = std::env::var(var) {
        if let Ok(parsed) = value.parse() {
            *target = parsed;
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> u64 {
    100 * 1024 * 1024
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_store_backend() -> String {
    "postgres".to_owned()
}

fn default_blob_backend() -> String {
    "s3".to_owned()
}

fn default_s3() -> S3Config {
    S3Config::new("us-east-1", "glimpse-media")
}

fn default_pbkdf2_iterations() -> u32 {
    100_000
}

fn default_sweep_interval() -> u64 {
    86_400
}

fn default_sweep_timeout() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: GlimpseConfig = toml::from_str("").unwrap();
        assert_eq!(config.logger.level, "info");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.body_limit, 100 * 1024 * 1024);
        assert_eq!(config.store.backend, "postgres");
        assert_eq!(config.blob.backend, "s3");
        assert_eq!(config.encryption.pbkdf2_iterations, 100_000);
        assert_eq!(config.sweep.interval_seconds, 86_400);
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let config: GlimpseConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [store]
            backend = "memory"

            [blob]
            backend = "memory"

            [blob.s3]
            region = "eu-central-1"
            bucket = "override"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.blob.backend, "memory");
        assert_eq!(config.blob.s3.region, "eu-central-1");
        assert_eq!(config.blob.s3.bucket, "override");
    }

    #[test]
    fn env_overrides_apply() {
        // All overrides exercised through one test to avoid env races
        // between parallel tests.
        std::env::set_var("SERVER_PORT", "7070");
        std::env::set_var("STORE_BACKEND", "memory");
        std::env::set_var("S3_ENDPOINT", "http://localhost:9000");
        std::env::set_var("PBKDF2_ITERATIONS", "150000");

        let mut config = GlimpseConfig::default();
        config.apply_env();

        assert_eq!(config.server.port, 7070);
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.blob.s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.encryption.pbkdf2_iterations, 150_000);

        std::env::remove_var("SERVER_PORT");
        std::env::remove_var("STORE_BACKEND");
        std::env::remove_var("S3_ENDPOINT");
        std::env::remove_var("PBKDF2_ITERATIONS");
    }
}
