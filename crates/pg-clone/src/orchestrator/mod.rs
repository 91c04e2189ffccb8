//! Replication orchestrator - main workflow coordinator.
//!
//! Resolves the table set, then copies tables one at a time. A table that
//! fails is recorded and the run moves on; only table-set resolution and the
//! initial connections can fail the whole run.

mod discovery;
mod health;

pub use discovery::{discover, resolve_tables};
pub use health::{health_check, ping_both, HealthCheckResult};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::anonymize::Anonymizer;
use crate::config::Config;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::drivers::{PostgresReader, PostgresWriter};
use crate::error::Result;
use crate::transfer::{CopyOptions, CopyOutcome, TableCopier};
use crate::verify::Verifier;

/// Connections per pool. One for the cursor, one for the writer, spare for
/// catalog queries.
const POOL_SIZE: usize = 4;

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every attempted table succeeded.
    Completed,
    /// Some tables failed.
    PartiallyCompleted,
    /// Every attempted table failed.
    Failed,
    /// Stopped by the cancellation token.
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::PartiallyCompleted => "partially_completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Summary of a replication run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables in the resolved table set.
    pub tables_total: usize,

    /// Tables copied successfully.
    pub tables_success: usize,

    /// Tables that failed (including a cancelled one).
    pub tables_failed: usize,

    /// Committed rows across all tables.
    pub rows_copied: u64,

    /// Names of failed tables.
    pub failed_tables: Vec<String>,

    /// One outcome per attempted table, in processing order.
    pub outcomes: Vec<CopyOutcome>,
}

impl ReplicationResult {
    fn from_outcomes(
        run_id: String,
        started_at: DateTime<Utc>,
        tables_total: usize,
        outcomes: Vec<CopyOutcome>,
        cancelled: bool,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let failed_tables: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.table.clone())
            .collect();
        let tables_failed = failed_tables.len();
        let tables_success = outcomes.len() - tables_failed;
        let rows_copied = outcomes.iter().map(|o| o.rows_copied).sum();

        let status = if cancelled {
            RunStatus::Cancelled
        } else if tables_failed == 0 {
            RunStatus::Completed
        } else if tables_success == 0 {
            RunStatus::Failed
        } else {
            RunStatus::PartiallyCompleted
        };

        Self {
            run_id,
            status,
            started_at,
            completed_at,
            duration_seconds,
            tables_total,
            tables_success,
            tables_failed,
            rows_copied,
            failed_tables,
            outcomes,
        }
    }

    /// Tables whose copy succeeded.
    pub fn succeeded_tables(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| o.table.clone())
            .collect()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Drives discovery, introspection and copying for a run.
pub struct Replicator {
    config: Config,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    anonymizer: Arc<Anonymizer>,
}

impl Replicator {
    /// Connect to both databases. Any connection failure is fatal.
    pub async fn connect(config: Config) -> Result<Self> {
        let source = PostgresReader::new(&config.source, POOL_SIZE).await?;
        let target = PostgresWriter::new(&config.target, POOL_SIZE).await?;
        Ok(Self::with_drivers(config, Arc::new(source), Arc::new(target)))
    }

    /// Build a replicator over existing drivers.
    pub fn with_drivers(
        config: Config,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        let anonymizer = Arc::new(Anonymizer::new(config.replication.password_hash_cost));
        Self {
            config,
            source,
            target,
            anonymizer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Effective table set: the allow-list, else discovery minus exclusions.
    pub async fn resolve_tables(&self) -> Result<Vec<String>> {
        resolve_tables(
            self.source.as_ref(),
            &self.config.source.schema,
            &self.config.replication,
        )
        .await
    }

    /// Replicate every table of the resolved set, sequentially.
    ///
    /// Returns `Err` only when the table set cannot be resolved.
    pub async fn replicate_all(&self, cancel: &CancellationToken) -> Result<ReplicationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting replication run: {}", run_id);

        let tables = self.resolve_tables().await?;
        let copier = TableCopier::new(
            self.source.clone(),
            self.target.clone(),
            self.anonymizer.clone(),
            self.config.source.schema.clone(),
            self.config.target.schema.clone(),
        );
        let opts = CopyOptions {
            truncate_first: self.config.replication.truncate_tables,
            anonymize: self.config.replication.anonymize,
            batch_size: self.config.replication.batch_size,
        };
        if opts.anonymize {
            info!("Anonymization enabled");
        }

        let mut outcomes = Vec::with_capacity(tables.len());
        let mut cancelled = false;

        for (idx, table) in tables.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    "Replication cancelled, {} tables not attempted",
                    tables.len() - idx
                );
                cancelled = true;
                break;
            }

            info!("[{}/{}] Replicating {}", idx + 1, tables.len(), table);
            let outcome = match self
                .source
                .list_columns(&self.config.source.schema, table)
                .await
            {
                Ok(columns) => copier.copy(table, &columns, &opts, cancel).await,
                Err(e) => {
                    error!("{}: column introspection failed: {}", table, e);
                    CopyOutcome::failed(table.as_str(), 0, &e)
                }
            };

            let stop = outcome.is_cancelled();
            outcomes.push(outcome);
            if stop {
                cancelled = true;
                break;
            }
        }

        let result =
            ReplicationResult::from_outcomes(run_id, started_at, tables.len(), outcomes, cancelled);
        info!(
            "Replication {}: {}/{} tables succeeded, {} rows copied in {:.2}s",
            result.status,
            result.tables_success,
            result.tables_total,
            result.rows_copied,
            result.duration_seconds
        );
        Ok(result)
    }

    /// Row-count verifier over the same connections.
    pub fn verifier(&self) -> Verifier<dyn SourceReader, dyn TargetWriter> {
        Verifier::new(
            self.source.clone(),
            self.target.clone(),
            self.config.source.schema.clone(),
            self.config.target.schema.clone(),
        )
    }

    /// Ping both sides over the existing pools.
    pub async fn health_check(&self) -> HealthCheckResult {
        ping_both(self.source.as_ref(), self.target.as_ref()).await
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

impl std::fmt::Debug for Replicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator")
            .field("config", &self.config)
            .field("source", &self.source.db_type())
            .field("target", &self.target.db_type())
            .finish()
    }
}
