//! Row-count verification results.

use serde::{Deserialize, Serialize};

use crate::error::{FailureCause, ReplicateError};

/// Row-count comparison for one table.
///
/// `difference` is always `source_count - target_count`. A count that could
/// not be obtained is left at zero and `error` carries the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub table: String,
    pub source_count: i64,
    pub target_count: i64,
    pub difference: i64,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureCause>,
}

impl VerificationOutcome {
    pub fn counted(table: impl Into<String>, source_count: i64, target_count: i64) -> Self {
        let difference = source_count - target_count;
        Self {
            table: table.into(),
            source_count,
            target_count,
            difference,
            matched: difference == 0,
            error: None,
        }
    }

    pub fn errored(
        table: impl Into<String>,
        source_count: i64,
        target_count: i64,
        error: &ReplicateError,
    ) -> Self {
        Self {
            table: table.into(),
            source_count,
            target_count,
            difference: source_count - target_count,
            matched: false,
            error: Some(FailureCause::from(error)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate over a set of verification outcomes. Errored tables are not
/// included in the row totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySummary {
    pub total_tables: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub errors: usize,
    pub source_rows: i64,
    pub target_rows: i64,
}

impl VerifySummary {
    pub fn from_outcomes(outcomes: &[VerificationOutcome]) -> Self {
        outcomes.iter().fold(
            Self {
                total_tables: outcomes.len(),
                ..Self::default()
            },
            |mut acc, o| {
                if o.is_error() {
                    acc.errors += 1;
                } else {
                    if o.matched {
                        acc.matched += 1;
                    } else {
                        acc.mismatched += 1;
                    }
                    acc.source_rows += o.source_count;
                    acc.target_rows += o.target_count;
                }
                acc
            },
        )
    }

    /// True when every table matched.
    pub fn all_matched(&self) -> bool {
        self.matched == self.total_tables
    }
}
