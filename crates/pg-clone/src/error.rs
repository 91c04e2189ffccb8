//! Error types for the replication library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for replication and verification operations.
#[derive(Error, Debug)]
pub enum ReplicateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listing tables/columns or counting rows failed.
    #[error("Catalog query failed ({context}): {message}")]
    CatalogQuery { context: String, message: String },

    /// Source cursor scan failed for a table.
    #[error("Read failed for table {table}: {message}")]
    Read { table: String, message: String },

    /// Destination truncate/insert/commit failed for a table.
    #[error("Write failed for table {table}: {message}")]
    Write { table: String, message: String },

    /// Database unreachable or pool exhausted.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Tables present in the source are missing in the destination.
    #[error("Schema mismatch: {} tables missing in destination database", missing.len())]
    SchemaMismatch { missing: Vec<String> },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Replication cancelled")]
    Cancelled,
}

/// Failure taxonomy recorded in per-table outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CatalogQuery,
    Read,
    Write,
    Connection,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::CatalogQuery => "catalog_query",
            ErrorKind::Read => "read",
            ErrorKind::Write => "write",
            ErrorKind::Connection => "connection",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Serializable failure cause attached to a copy or verification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    /// Error category.
    pub kind: ErrorKind,
    /// Rendered error message.
    pub message: String,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<&ReplicateError> for FailureCause {
    fn from(err: &ReplicateError) -> Self {
        Self {
            kind: err.kind().unwrap_or(ErrorKind::Connection),
            message: err.to_string(),
        }
    }
}

/// Process exit codes surfaced by the CLI.
pub mod exit_codes {
    pub const CONFIG: u8 = 1;
    pub const CONNECTION: u8 = 2;
    pub const CATALOG_QUERY: u8 = 3;
    pub const TRANSFER: u8 = 4;
    pub const SCHEMA_MISMATCH: u8 = 5;
    pub const JSON: u8 = 6;
    pub const IO: u8 = 7;
    pub const CANCELLED: u8 = 130;
}

impl ReplicateError {
    /// Create a CatalogQuery error with context about which lookup failed.
    pub fn catalog(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ReplicateError::CatalogQuery {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a Read error.
    pub fn read(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ReplicateError::Read {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Write error.
    pub fn write(table: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ReplicateError::Write {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Connection error with context about where it occurred.
    pub fn connection(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        ReplicateError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Classify into the per-table failure taxonomy.
    ///
    /// Returns `None` for errors that never appear in a table outcome
    /// (configuration, file and serialization errors).
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ReplicateError::CatalogQuery { .. } | ReplicateError::SchemaMismatch { .. } => {
                Some(ErrorKind::CatalogQuery)
            }
            ReplicateError::Read { .. } => Some(ErrorKind::Read),
            ReplicateError::Write { .. } => Some(ErrorKind::Write),
            ReplicateError::Connection { .. } => Some(ErrorKind::Connection),
            ReplicateError::Cancelled => Some(ErrorKind::Cancelled),
            ReplicateError::Config(_)
            | ReplicateError::Io(_)
            | ReplicateError::Yaml(_)
            | ReplicateError::Json(_) => None,
        }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            ReplicateError::Config(_) | ReplicateError::Yaml(_) => exit_codes::CONFIG,
            ReplicateError::Connection { .. } => exit_codes::CONNECTION,
            ReplicateError::CatalogQuery { .. } => exit_codes::CATALOG_QUERY,
            ReplicateError::Read { .. } | ReplicateError::Write { .. } => exit_codes::TRANSFER,
            ReplicateError::SchemaMismatch { .. } => exit_codes::SCHEMA_MISMATCH,
            ReplicateError::Json(_) => exit_codes::JSON,
            ReplicateError::Io(_) => exit_codes::IO,
            ReplicateError::Cancelled => exit_codes::CANCELLED,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for replication operations.
pub type Result<T> = std::result::Result<T, ReplicateError>;
