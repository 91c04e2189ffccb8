//! PostgreSQL destination writer.
//!
//! Every batch is written inside its own transaction with a cached prepared
//! insert, so a batch is either fully visible or absent.

use async_trait::async_trait;
use deadpool_postgres::{Pool, Transaction};
use tokio_postgres::types::ToSql;
use tokio_postgres::Statement;
use tracing::{debug, warn};

use super::dialect::PostgresDialect;
use super::pool;
use crate::config::DatabaseConfig;
use crate::core::schema::{qualified_name, Column};
use crate::core::traits::{Catalog, TargetWriter};
use crate::core::value::Batch;
use crate::error::{ReplicateError, Result};

/// PostgreSQL destination writer.
pub struct PostgresWriter {
    pool: Pool,
}

impl PostgresWriter {
    /// Connect to the destination database.
    pub async fn new(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        let pool = pool::connect(config, max_conns, "destination").await?;
        Ok(Self { pool })
    }

    async fn get_client(&self, table: &str) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            ReplicateError::connection(e, format!("getting connection to write {}", table))
        })
    }
}

#[async_trait]
impl Catalog for PostgresWriter {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        pool::list_tables(&self.pool, schema).await
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<Column>> {
        pool::list_columns(&self.pool, schema, table).await
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        pool::row_count(&self.pool, schema, table).await
    }

    async fn ping(&self) -> Result<()> {
        pool::ping(&self.pool).await
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn truncate_table(&self, schema: &str, table: &str) -> Result<()> {
        let qualified = qualified_name(schema, table);
        let client = self.get_client(&qualified).await?;

        client
            .batch_execute(&PostgresDialect::build_truncate_query(schema, table))
            .await
            .map_err(|e| ReplicateError::write(&qualified, format!("truncate: {}", e)))?;

        debug!("Truncated {}", qualified);
        Ok(())
    }

    async fn write_batch(
        &self,
        schema: &str,
        table: &str,
        columns: &[Column],
        batch: Batch,
    ) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let qualified = qualified_name(schema, table);
        let mut client = self.get_client(&qualified).await?;
        let sql = PostgresDialect::build_insert_query(schema, table, columns);

        let txn = client
            .transaction()
            .await
            .map_err(|e| ReplicateError::write(&qualified, format!("begin: {}", e)))?;

        let stmt = match txn.prepare_cached(&sql).await {
            Ok(stmt) => stmt,
            Err(e) => {
                rollback(txn, &qualified).await;
                return Err(ReplicateError::write(&qualified, format!("prepare: {}", e)));
            }
        };

        match insert_rows(&txn, &stmt, &qualified, columns.len(), &batch).await {
            Ok(written) => {
                txn.commit()
                    .await
                    .map_err(|e| ReplicateError::write(&qualified, format!("commit: {}", e)))?;
                debug!("Committed {} rows into {}", written, qualified);
                Ok(written)
            }
            Err(e) => {
                rollback(txn, &qualified).await;
                Err(e)
            }
        }
    }
}

async fn insert_rows(
    txn: &Transaction<'_>,
    stmt: &Statement,
    table: &str,
    width: usize,
    batch: &Batch,
) -> Result<u64> {
    let mut written = 0u64;
    for (idx, row) in batch.rows.iter().enumerate() {
        if row.len() != width {
            return Err(ReplicateError::write(
                table,
                format!("row {} has {} values for {} columns", idx, row.len(), width),
            ));
        }
        let params: Vec<&(dyn ToSql + Sync)> =
            row.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        txn.execute(stmt, &params)
            .await
            .map_err(|e| ReplicateError::write(table, format!("insert row {}: {}", idx, e)))?;
        written += 1;
    }
    Ok(written)
}

async fn rollback(txn: Transaction<'_>, table: &str) {
    if let Err(e) = txn.rollback().await {
        warn!("Rollback failed for {}: {}", table, e);
    }
}
