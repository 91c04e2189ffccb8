//! Human-readable verification report.

use std::fmt;

use super::types::{VerificationOutcome, VerifySummary};

const RULE_WIDTH: usize = 60;

/// Per-table lines plus the aggregate summary.
#[derive(Debug, Clone)]
pub struct VerifyReport<'a> {
    outcomes: &'a [VerificationOutcome],
    summary: VerifySummary,
    missing_tables: &'a [String],
}

impl<'a> VerifyReport<'a> {
    pub fn new(outcomes: &'a [VerificationOutcome]) -> Self {
        Self {
            outcomes,
            summary: VerifySummary::from_outcomes(outcomes),
            missing_tables: &[],
        }
    }

    /// Include tables missing from the destination catalog.
    pub fn with_missing_tables(mut self, missing: &'a [String]) -> Self {
        self.missing_tables = missing;
        self
    }

    pub fn summary(&self) -> &VerifySummary {
        &self.summary
    }
}

impl fmt::Display for VerifyReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);

        writeln!(f, "{}", heavy)?;
        writeln!(f, "REPLICATION VERIFICATION REPORT")?;
        writeln!(f, "{}", heavy)?;
        writeln!(f)?;

        if !self.missing_tables.is_empty() {
            writeln!(
                f,
                "Tables missing in destination ({}): {}",
                self.missing_tables.len(),
                self.missing_tables.join(", ")
            )?;
            writeln!(f)?;
        }

        for o in self.outcomes {
            match &o.error {
                Some(cause) => writeln!(f, "\u{2717} {}: ERROR {}", o.table, cause)?,
                None if o.matched => writeln!(
                    f,
                    "\u{2713} {}: {} rows (source: {}, destination: {})",
                    o.table, o.source_count, o.source_count, o.target_count
                )?,
                None => writeln!(
                    f,
                    "\u{2717} {}: MISMATCH (source: {}, destination: {}, difference: {})",
                    o.table, o.source_count, o.target_count, o.difference
                )?,
            }
        }

        let s = &self.summary;
        writeln!(f)?;
        writeln!(f, "{}", light)?;
        writeln!(f, "Total Tables: {}", s.total_tables)?;
        writeln!(f, "Matched: {}", s.matched)?;
        writeln!(f, "Mismatched: {}", s.mismatched)?;
        writeln!(f, "Errors: {}", s.errors)?;
        writeln!(f, "Total Rows (Source): {}", s.source_rows)?;
        writeln!(f, "Total Rows (Destination): {}", s.target_rows)?;
        write!(f, "{}", heavy)
    }
}
