//! # pg-clone
//!
//! PostgreSQL table replication with optional in-flight anonymization and
//! row-count reconciliation.
//!
//! - **Streaming copies** over a forward-only cursor, one destination
//!   transaction per batch
//! - **Partial-failure isolation**: a failing table is recorded and the run
//!   continues
//! - **Anonymization** of e-mail, phone, password, name, SSN, card and
//!   address columns, selected by column name
//! - **Verification** of table presence and row counts on both sides
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_clone::{Config, Replicator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> pg_clone::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let replicator = Replicator::connect(config).await?;
//!     let result = replicator.replicate_all(&CancellationToken::new()).await?;
//!     println!("Copied {} rows", result.rows_copied);
//!
//!     let verifier = replicator.verifier();
//!     let outcomes = verifier.verify_all(&result.succeeded_tables()).await;
//!     println!("{}", pg_clone::VerifyReport::new(&outcomes));
//!     Ok(())
//! }
//! ```

pub mod anonymize;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod transfer;
pub mod verify;

pub use anonymize::{Anonymizer, FieldCategory};
pub use config::{Config, DatabaseConfig, ReplicationConfig};
pub use error::{ErrorKind, FailureCause, ReplicateError, Result};
pub use orchestrator::{HealthCheckResult, ReplicationResult, Replicator, RunStatus};
pub use transfer::{CopyOptions, CopyOutcome, TableCopier};
pub use verify::{VerificationOutcome, Verifier, VerifyReport, VerifySummary};
