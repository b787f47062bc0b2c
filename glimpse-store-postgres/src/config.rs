use serde::{Deserialize, Serialize};

/// Configuration for the PostgreSQL metadata store backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database user.
    #[serde(default = "default_user")]
    pub user: String,

    /// Database password.
    #[serde(default)]
    pub password: String,

    /// Database name.
    #[serde(default = "default_dbname")]
    pub dbname: String,

    /// `sslmode` connection parameter (`disable`, `prefer`, `require`, ...).
    #[serde(default = "default_sslmode")]
    pub sslmode: String,

    /// Maximum connections in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Table name prefix, mainly for test isolation.
    #[serde(default)]
    pub table_prefix: String,
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("dbname", &self.dbname)
            .field("sslmode", &self.sslmode)
            .field("pool_size", &self.pool_size)
            .field("table_prefix", &self.table_prefix)
            .finish()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            dbname: default_dbname(),
            sslmode: default_sslmode(),
            pool_size: default_pool_size(),
            table_prefix: String::new(),
        }
    }
}

impl PostgresConfig {
    /// Render the connection URL for the pool.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.dbname, self.sslmode
        )
    }

    /// Fully qualified media resources table name.
    #[must_use]
    pub fn media_table(&self) -> String {
        format!("{}media_resources", self.table_prefix)
    }
}

fn default_host() -> String {
    "localhost".to_owned()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_owned()
}

fn default_dbname() -> String {
    "glimpse".to_owned()
}

fn default_sslmode() -> String {
    "disable".to_owned()
}

fn default_pool_size() -> u32 {
    10
}
