//! PostgreSQL source reader.
//!
//! Each table scan runs on its own pooled connection inside a read-only
//! transaction. Rows are pulled from a bound portal `batch_size` rows at a
//! time, so memory stays bounded by the batch size and the read-ahead depth
//! of the channel.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use deadpool_postgres::Pool;
use tokio::sync::mpsc;
use tokio_postgres::types::Type;
use tokio_postgres::Row as PgRow;
use tracing::{debug, warn};
use uuid::Uuid;

use super::dialect::PostgresDialect;
use super::pool;
use crate::config::DatabaseConfig;
use crate::core::schema::{qualified_name, Column};
use crate::core::traits::{Catalog, ReadOptions, SourceReader};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{ReplicateError, Result};

/// Batches buffered between the cursor task and the consumer.
const READ_AHEAD_BATCHES: usize = 2;

/// PostgreSQL source reader.
pub struct PostgresReader {
    pool: Pool,
}

impl PostgresReader {
    /// Connect to the source database.
    pub async fn new(config: &DatabaseConfig, max_conns: usize) -> Result<Self> {
        let pool = pool::connect(config, max_conns, "source").await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Catalog for PostgresReader {
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

impl SourceReader for PostgresReader {
    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(READ_AHEAD_BATCHES);
        let pool = self.pool.clone();

        tokio::spawn(async move {
            if let Err(e) = scan_table(pool, opts, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }
}

async fn scan_table(
    pool: Pool,
    opts: ReadOptions,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let table = qualified_name(&opts.schema, &opts.table);
    let read_err = |stage: &str, e: tokio_postgres::Error| {
        ReplicateError::read(&table, format!("{}: {}", stage, e))
    };

    let mut client = pool.get().await.map_err(|e| {
        ReplicateError::connection(e, format!("getting connection to read {}", table))
    })?;

    let sql = PostgresDialect::build_select_query(&opts.schema, &opts.table, &opts.columns);
    debug!("Opening cursor on {}: {}", table, sql);

    let txn = client
        .build_transaction()
        .read_only(true)
        .start()
        .await
        .map_err(|e| read_err("begin", e))?;
    let stmt = txn.prepare(&sql).await.map_err(|e| read_err("prepare", e))?;
    let portal = txn
        .bind(&stmt, &[])
        .await
        .map_err(|e| read_err("open cursor", e))?;

    let batch_size = opts.batch_size.max(1);
    let fetch_size = i32::try_from(batch_size).unwrap_or(i32::MAX);
    let mut total = 0usize;

    loop {
        let rows = txn
            .query_portal(&portal, fetch_size)
            .await
            .map_err(|e| read_err("fetch", e))?;
        if rows.is_empty() {
            break;
        }

        let exhausted = rows.len() < batch_size;
        let decoded = rows
            .iter()
            .map(decode_row)
            .collect::<std::result::Result<Vec<Row>, _>>()
            .map_err(|e| read_err("decode", e))?;
        total += decoded.len();

        if tx.send(Ok(Batch::new(decoded))).await.is_err() {
            debug!("Consumer dropped, closing cursor on {}", table);
            return Ok(());
        }
        if exhausted {
            break;
        }
    }

    if let Err(e) = txn.commit().await {
        warn!("Closing read transaction on {} failed: {}", table, e);
    }
    debug!("Read {} rows from {}", total, table);
    Ok(())
}

fn decode_row(row: &PgRow) -> std::result::Result<Row, tokio_postgres::Error> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

/// Decode a cell by its wire type. Columns outside the native set are
/// selected as `::text`, so the fallback arm always sees a textual type.
fn decode_value(row: &PgRow, idx: usize) -> std::result::Result<SqlValue, tokio_postgres::Error> {
    let value = match *row.columns()[idx].type_() {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(SqlValue::I16),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::I32),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::I64),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(SqlValue::F32),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::F64),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Bytes),
        Type::UUID => row.try_get::<_, Option<Uuid>>(idx)?.map(SqlValue::Uuid),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<FixedOffset>>>(idx)?
            .map(SqlValue::DateTimeOffset),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx)?.map(SqlValue::Date),
        Type::TIME => row.try_get::<_, Option<NaiveTime>>(idx)?.map(SqlValue::Time),
        _ => row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}
