//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (the instance being replicated).
    #[serde(alias = "remote")]
    pub source: DatabaseConfig,

    /// Destination database configuration.
    #[serde(alias = "local", default = "DatabaseConfig::default_target")]
    pub target: DatabaseConfig,

    /// Replication behavior configuration.
    #[serde(alias = "migration", default)]
    pub replication: ReplicationConfig,
}

/// PostgreSQL connection settings for one side of the replication.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    #[serde(default)]
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Catalog schema holding the replicated tables (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_disable", alias = "sslmode")]
    pub ssl_mode: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl DatabaseConfig {
    /// Defaults for a local destination instance when the section is omitted.
    pub fn default_target() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_TARGET_PORT,
            database: "local_db".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            schema: default_public_schema(),
            ssl_mode: default_disable(),
        }
    }

    /// Human-readable `host:port/database` label for logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Replication behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Mask sensitive string columns before writing (default: false).
    #[serde(default)]
    pub anonymize: bool,

    /// Truncate (cascading) each destination table before copying (default: true).
    #[serde(default = "default_true", alias = "truncate_first")]
    pub truncate_tables: bool,

    /// Explicit allow-list. When non-empty, discovery is skipped and this
    /// list is used verbatim.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Table names excluded from discovery.
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Rows per destination transaction (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// bcrypt cost for the placeholder password hash (default: 10).
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            anonymize: false,
            truncate_tables: true,
            tables: Vec::new(),
            exclude_tables: Vec::new(),
            batch_size: default_batch_size(),
            password_hash_cost: default_password_hash_cost(),
        }
    }
}

/// Default destination port; the destination usually runs next to the source.
pub const DEFAULT_TARGET_PORT: u16 = 5433;

// Default value functions for serde
fn default_host() -> String {
    "localhost".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    1000
}

fn default_password_hash_cost() -> u32 {
    10
}
