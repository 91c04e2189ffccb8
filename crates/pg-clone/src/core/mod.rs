//! Core abstractions for schema-agnostic replication.
//!
//! - [`schema`]: column metadata
//! - [`value`]: dynamically typed cell values and row batches
//! - [`traits`]: catalog, reader and writer seams implemented by drivers

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{column_names, qualified_name, Column};
pub use traits::{Catalog, ReadOptions, SourceReader, TargetWriter};
pub use value::{Batch, Row, SqlValue};
