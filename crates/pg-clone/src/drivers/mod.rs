//! Database driver implementations of the core traits.
//!
//! - [`postgres`]: PostgreSQL reader and writer over deadpool-postgres pools
//! - [`common`]: shared TLS setup

pub mod common;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use postgres::{PostgresDialect, PostgresReader, PostgresWriter};
