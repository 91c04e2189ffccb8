//! Streaming table copier.
//!
//! One table at a time: optional truncate, a single forward-only source
//! cursor, and one destination transaction per batch. Batches are written in
//! cursor order by a single writer, so a failure part-way leaves every
//! earlier batch committed and nothing of the failing one.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::anonymize::Anonymizer;
use crate::core::schema::{qualified_name, Column};
use crate::core::traits::{ReadOptions, SourceReader, TargetWriter};
use crate::error::{FailureCause, ReplicateError, Result};

/// Per-table copy settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    /// Truncate the destination table (cascading) before reading.
    pub truncate_first: bool,
    /// Run text values through the anonymizer.
    pub anonymize: bool,
    /// Rows per destination transaction.
    pub batch_size: usize,
}

impl Default for CopyOptions {
    fn default() -> Self {
        Self {
            truncate_first: true,
            anonymize: false,
            batch_size: 1_000,
        }
    }
}

/// Result of copying one table. `rows_copied` counts committed rows only,
/// so it is kept on failure as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub table: String,
    pub rows_copied: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureCause>,
}

impl CopyOutcome {
    pub fn succeeded(table: impl Into<String>, rows_copied: u64) -> Self {
        Self {
            table: table.into(),
            rows_copied,
            success: true,
            error: None,
        }
    }

    pub fn failed(table: impl Into<String>, rows_copied: u64, error: &ReplicateError) -> Self {
        Self {
            table: table.into(),
            rows_copied,
            success: false,
            error: Some(FailureCause::from(error)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.kind == crate::error::ErrorKind::Cancelled)
    }
}

/// Copies tables from a source reader into a destination writer.
pub struct TableCopier {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    anonymizer: Arc<Anonymizer>,
    source_schema: String,
    target_schema: String,
}

impl TableCopier {
    pub fn new(
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
        anonymizer: Arc<Anonymizer>,
        source_schema: impl Into<String>,
        target_schema: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            anonymizer,
            source_schema: source_schema.into(),
            target_schema: target_schema.into(),
        }
    }

    /// Copy one table. Never returns an error: failures are captured in the
    /// outcome together with the number of rows already committed.
    pub async fn copy(
        &self,
        table: &str,
        columns: &[Column],
        opts: &CopyOptions,
        cancel: &CancellationToken,
    ) -> CopyOutcome {
        let span = info_span!("copy", table = %table);
        async {
            let start = Instant::now();
            let mut committed = 0u64;
            match self.copy_rows(table, columns, opts, cancel, &mut committed).await {
                Ok(()) => {
                    info!(
                        "{}: copied {} rows in {:.2}s",
                        table,
                        committed,
                        start.elapsed().as_secs_f64()
                    );
                    CopyOutcome::succeeded(table, committed)
                }
                Err(e) => {
                    if matches!(e, ReplicateError::Cancelled) {
                        warn!("{}: cancelled after {} committed rows", table, committed);
                    } else {
                        warn!("{}: copy failed after {} committed rows: {}", table, committed, e);
                    }
                    CopyOutcome::failed(table, committed, &e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn copy_rows(
        &self,
        table: &str,
        columns: &[Column],
        opts: &CopyOptions,
        cancel: &CancellationToken,
        committed: &mut u64,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ReplicateError::Cancelled);
        }

        let source_name = qualified_name(&self.source_schema, table);
        if opts.truncate_first {
            self.target.truncate_table(&self.target_schema, table).await?;
        }

        let plan = if opts.anonymize {
            Some(Anonymizer::plan(columns))
        } else {
            None
        };

        let mut batches = self.source.read_table(ReadOptions {
            schema: self.source_schema.clone(),
            table: table.to_string(),
            columns: columns.to_vec(),
            batch_size: opts.batch_size.max(1),
        });

        let mut batch_no = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReplicateError::Cancelled),
                next = batches.recv() => next,
            };
            let Some(batch) = next else { break };
            let mut batch = batch?;
            if batch.is_empty() {
                continue;
            }

            if let Some(bad) = batch.rows.iter().find(|r| r.len() != columns.len()) {
                return Err(ReplicateError::read(
                    &source_name,
                    format!(
                        "row has {} values but {} columns were introspected",
                        bad.len(),
                        columns.len()
                    ),
                ));
            }

            if let Some(plan) = &plan {
                self.anonymizer.apply_batch(plan, &mut batch);
            }

            let written = self
                .target
                .write_batch(&self.target_schema, table, columns, batch)
                .await?;
            *committed += written;
            batch_no += 1;
            debug!("{}: batch {} committed ({} rows total)", table, batch_no, committed);
        }

        Ok(())
    }
}
