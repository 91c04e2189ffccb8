//! Core traits for schema-agnostic table replication.
//!
//! - [`Catalog`]: table/column listing and row counts, available on both sides
//! - [`SourceReader`]: forward-only row cursor over a source table
//! - [`TargetWriter`]: truncation and transactional batch writes on the destination
//!
//! The copier, orchestrator and verifier only see these traits, so they can
//! be exercised against in-memory implementations.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::schema::Column;
use super::value::Batch;

/// Options for reading rows from a table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Columns to read, in introspected order.
    pub columns: Vec<Column>,
    /// Number of rows per batch.
    pub batch_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            table: String::new(),
            columns: Vec::new(),
            batch_size: 1_000,
        }
    }
}

/// Catalog queries shared by source and destination.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List base tables in `schema`, ordered by name.
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>>;

    /// List columns of a table ordered by native ordinal.
    ///
    /// Fails with `CatalogQuery` if the table does not exist.
    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<Column>>;

    /// Exact row count of a table.
    async fn row_count(&self, schema: &str, table: &str) -> Result<i64>;

    /// Round-trip a trivial query to check connectivity.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Read rows from a source database.
pub trait SourceReader: Catalog {
    /// Start streaming rows from a table.
    ///
    /// The reader spawns a background task holding one forward-only cursor
    /// and yields batches of at most `opts.batch_size` rows in cursor order.
    /// A scan failure is delivered as a final `Err` item. Dropping the
    /// receiver stops the cursor.
    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>>;
}

/// Write rows to the destination database.
#[async_trait]
pub trait TargetWriter: Catalog {
    /// Truncate a table, cascading to dependent rows.
    async fn truncate_table(&self, schema: &str, table: &str) -> Result<()>;

    /// Insert a batch inside a single transaction and commit it.
    ///
    /// Each row is bound to a parameterized INSERT over `columns` in the
    /// given order. On any failure the transaction is rolled back and
    /// nothing from this batch is kept. Returns the number of rows committed.
    async fn write_batch(
        &self,
        schema: &str,
        table: &str,
        columns: &[Column],
        batch: Batch,
    ) -> Result<u64>;
}
