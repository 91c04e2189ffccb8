//! In-memory catalog, reader and writer for driving the engine without a
//! database.
//!
//! The writer records every truncate, commit and column list so tests can
//! assert on transaction boundaries. Failures are injected per table.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use pg_clone::core::{
    column_names, Batch, Catalog, Column, ReadOptions, Row, SourceReader, SqlValue, TargetWriter,
};
use pg_clone::{ReplicateError, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A table held in memory.
#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl MockTable {
    /// Build a table from `(name, pg type)` pairs.
    pub fn new(columns: &[(&str, &str)]) -> Self {
        Self {
            columns: columns
                .iter()
                .enumerate()
                .map(|(i, (name, ty))| Column::new(*name, *ty, i as i32 + 1))
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    /// `n` rows of `(id, "row-{id}")`.
    pub fn numbered(n: usize) -> Self {
        Self::new(&[("id", "int4"), ("label", "text")]).with_rows(
            (1..=n)
                .map(|i| vec![SqlValue::I32(i as i32), SqlValue::Text(format!("row-{}", i))])
                .collect(),
        )
    }
}

/// Source side: tables plus read-failure injection.
#[derive(Default)]
pub struct MockSource {
    tables: BTreeMap<String, MockTable>,
    /// Fail the scan after this many batches were delivered.
    fail_read_after: HashMap<String, usize>,
    fail_list_tables: bool,
    fail_count: HashSet<String>,
    reads: Mutex<Vec<ReadOptions>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, table: MockTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn fail_read_after(mut self, table: &str, batches: usize) -> Self {
        self.fail_read_after.insert(table.to_string(), batches);
        self
    }

    pub fn fail_list_tables(mut self) -> Self {
        self.fail_list_tables = true;
        self
    }

    pub fn fail_count(mut self, table: &str) -> Self {
        self.fail_count.insert(table.to_string());
        self
    }

    /// Every `read_table` call, in order.
    pub fn reads(&self) -> Vec<ReadOptions> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Catalog for MockSource {
    async fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        if self.fail_list_tables {
            return Err(ReplicateError::catalog(
                format!("listing tables in schema {}", schema),
                "connection reset",
            ));
        }
        Ok(self.tables.keys().cloned().collect())
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<Column>> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| {
                ReplicateError::catalog(
                    format!("listing columns of {}.{}", schema, table),
                    "table not found",
                )
            })
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        match self.tables.get(table) {
            Some(t) if !self.fail_count.contains(table) => Ok(t.rows.len() as i64),
            _ => Err(ReplicateError::catalog(
                format!("counting rows in {}.{}", schema, table),
                "relation does not exist",
            )),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mock"
    }

    async fn close(&self) {}
}

impl SourceReader for MockSource {
    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        self.reads.lock().unwrap().push(opts.clone());

        let (tx, rx) = mpsc::channel(2);
        let rows = self
            .tables
            .get(&opts.table)
            .map(|t| t.rows.clone())
            .unwrap_or_default();
        let fail_after = self.fail_read_after.get(&opts.table).copied();
        let table = opts.table.clone();
        let batch_size = opts.batch_size.max(1);

        tokio::spawn(async move {
            for (idx, chunk) in rows.chunks(batch_size).enumerate() {
                if fail_after == Some(idx) {
                    let _ = tx
                        .send(Err(ReplicateError::read(table, "could not receive data from server")))
                        .await;
                    return;
                }
                if tx.send(Ok(Batch::new(chunk.to_vec()))).await.is_err() {
                    return;
                }
            }
            if let Some(n) = fail_after {
                if n >= rows.len().div_ceil(batch_size) {
                    let _ = tx
                        .send(Err(ReplicateError::read(table, "could not receive data from server")))
                        .await;
                }
            }
        });

        rx
    }
}

/// One committed destination transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Destination side: stores committed rows and records transactions.
#[derive(Default)]
pub struct MockTarget {
    tables: Mutex<BTreeMap<String, Vec<Row>>>,
    commits: Mutex<Vec<Commit>>,
    truncates: Mutex<Vec<String>>,
    /// Fail the write of this (0-based) batch index for a table.
    fail_write_at: HashMap<String, usize>,
    fail_truncate: HashSet<String>,
    /// Cancel the token once this many commits happened in total.
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table in the destination catalog, optionally pre-filled.
    pub fn with_table(self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.lock().unwrap().insert(name.to_string(), rows);
        self
    }

    pub fn fail_write_at(mut self, table: &str, batch: usize) -> Self {
        self.fail_write_at.insert(table.to_string(), batch);
        self
    }

    pub fn fail_truncate(mut self, table: &str) -> Self {
        self.fail_truncate.insert(table.to_string());
        self
    }

    pub fn cancel_after_commits(mut self, commits: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((commits, token));
        self
    }

    pub fn commits(&self) -> Vec<Commit> {
        self.commits.lock().unwrap().clone()
    }

    pub fn commits_for(&self, table: &str) -> Vec<Commit> {
        self.commits()
            .into_iter()
            .filter(|c| c.table == table)
            .collect()
    }

    pub fn truncates(&self) -> Vec<String> {
        self.truncates.lock().unwrap().clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Catalog for MockTarget {
    async fn list_tables(&self, _schema: &str) -> Result<Vec<String>> {
        Ok(self.tables.lock().unwrap().keys().cloned().collect())
    }

    async fn list_columns(&self, schema: &str, table: &str) -> Result<Vec<Column>> {
        Err(ReplicateError::catalog(
            format!("listing columns of {}.{}", schema, table),
            "not tracked by mock",
        ))
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|rows| rows.len() as i64)
            .ok_or_else(|| {
                ReplicateError::catalog(
                    format!("counting rows in {}.{}", schema, table),
                    "relation does not exist",
                )
            })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mock"
    }

    async fn close(&self) {}
}

#[async_trait]
impl TargetWriter for MockTarget {
    async fn truncate_table(&self, schema: &str, table: &str) -> Result<()> {
        if self.fail_truncate.contains(table) {
            return Err(ReplicateError::write(
                format!("{}.{}", schema, table),
                "truncate: permission denied",
            ));
        }
        self.truncates.lock().unwrap().push(table.to_string());
        self.tables
            .lock()
            .unwrap()
            .insert(table.to_string(), Vec::new());
        Ok(())
    }

    async fn write_batch(
        &self,
        schema: &str,
        table: &str,
        columns: &[Column],
        batch: Batch,
    ) -> Result<u64> {
        let batch_index = self.commits_for(table).len();
        if self.fail_write_at.get(table) == Some(&batch_index) {
            return Err(ReplicateError::write(
                format!("{}.{}", schema, table),
                "insert row 0: duplicate key value violates unique constraint",
            ));
        }

        let written = batch.len();
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(batch.rows);

        let total = {
            let mut commits = self.commits.lock().unwrap();
            commits.push(Commit {
                table: table.to_string(),
                columns: column_names(columns),
                rows: written,
            });
            commits.len()
        };
        if let Some((n, token)) = &self.cancel_after {
            if total >= *n {
                token.cancel();
            }
        }

        Ok(written as u64)
    }
}

/// A valid config with the given replication section body.
pub fn config(replication: &str) -> pg_clone::Config {
    let yaml = format!(
        r#"
source:
  host: source-db
  database: app
  user: reader
target:
  host: localhost
  port: 5433
  database: app_copy
  user: writer
replication:
  password_hash_cost: 4
{}
"#,
        replication
    );
    pg_clone::Config::from_yaml(&yaml).expect("test config should be valid")
}
