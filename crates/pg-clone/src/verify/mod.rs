//! Row-count reconciliation between source and destination.
//!
//! - [`Verifier::verify_schema`] compares the table sets of both catalogs
//! - [`Verifier::verify_all`] compares row counts table by table
//!
//! Count failures are recorded per table and never stop the pass.

mod report;
mod types;

pub use report::VerifyReport;
pub use types::{VerificationOutcome, VerifySummary};

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::core::schema::qualified_name;
use crate::core::traits::Catalog;
use crate::error::{ReplicateError, Result};

/// Compares two catalogs by table presence and row counts.
pub struct Verifier<S: ?Sized, D: ?Sized> {
    source: Arc<S>,
    target: Arc<D>,
    source_schema: String,
    target_schema: String,
}

impl<S, D> Verifier<S, D>
where
    S: Catalog + ?Sized,
    D: Catalog + ?Sized,
{
    pub fn new(
        source: Arc<S>,
        target: Arc<D>,
        source_schema: impl Into<String>,
        target_schema: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            source_schema: source_schema.into(),
            target_schema: target_schema.into(),
        }
    }

    /// Fails with `SchemaMismatch` listing source tables absent from the
    /// destination, in source catalog order.
    pub async fn verify_schema(&self) -> Result<()> {
        let source_tables = self.source.list_tables(&self.source_schema).await?;
        let target_tables: HashSet<String> = self
            .target
            .list_tables(&self.target_schema)
            .await?
            .into_iter()
            .collect();

        let missing: Vec<String> = source_tables
            .into_iter()
            .filter(|t| !target_tables.contains(t))
            .collect();

        if missing.is_empty() {
            info!("Schema check passed: all source tables exist in destination");
            Ok(())
        } else {
            warn!(
                "{} tables missing in destination: {}",
                missing.len(),
                missing.join(", ")
            );
            Err(ReplicateError::SchemaMismatch { missing })
        }
    }

    /// One outcome per table, in input order.
    pub async fn verify_all(&self, tables: &[String]) -> Vec<VerificationOutcome> {
        let mut outcomes = Vec::with_capacity(tables.len());
        for table in tables {
            let span = info_span!("verify", table = %table);
            outcomes.push(self.verify_table(table).instrument(span).await);
        }
        outcomes
    }

    /// Compare row counts for one table.
    pub async fn verify_table(&self, table: &str) -> VerificationOutcome {
        let source_count = match self.source.row_count(&self.source_schema, table).await {
            Ok(n) => n,
            Err(e) => {
                warn!(
                    "Counting {} in source failed: {}",
                    qualified_name(&self.source_schema, table),
                    e
                );
                return VerificationOutcome::errored(table, 0, 0, &e);
            }
        };

        let target_count = match self.target.row_count(&self.target_schema, table).await {
            Ok(n) => n,
            Err(e) => {
                warn!(
                    "Counting {} in destination failed: {}",
                    qualified_name(&self.target_schema, table),
                    e
                );
                return VerificationOutcome::errored(table, source_count, 0, &e);
            }
        };

        let outcome = VerificationOutcome::counted(table, source_count, target_count);
        if outcome.matched {
            info!("{}: {} rows (match)", table, source_count);
        } else {
            warn!(
                "{}: source={} destination={} (MISMATCH)",
                table, source_count, target_count
            );
        }
        outcome
    }
}
