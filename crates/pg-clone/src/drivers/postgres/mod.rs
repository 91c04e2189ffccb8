//! PostgreSQL driver.
//!
//! - [`PostgresDialect`]: identifier quoting and statement generation
//! - [`PostgresReader`]: cursor-based source reader
//! - [`PostgresWriter`]: transactional batch writer for the destination

mod dialect;
mod pool;
mod reader;
mod writer;

pub use dialect::PostgresDialect;
pub use reader::PostgresReader;
pub use writer::PostgresWriter;
