//! Table and column metadata as reported by the source catalog.

use serde::{Deserialize, Serialize};

/// Catalog types whose values are character strings.
const TEXT_TYPES: &[&str] = &["text", "varchar", "bpchar", "name"];

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Catalog type name (e.g. "int4", "varchar", "jsonb").
    pub data_type: String,
    /// Declared type as rendered by the catalog (e.g. "character varying(64)").
    pub sql_type: String,
    /// Native ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl Column {
    /// Create a column whose declared type equals its catalog type name.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal_pos: i32) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            sql_type: data_type.clone(),
            data_type,
            ordinal_pos,
        }
    }

    /// Whether the column holds character data. Types read back as text for
    /// transport (numeric, json, arrays, enums) are not.
    pub fn is_text(&self) -> bool {
        TEXT_TYPES.contains(&self.data_type.to_lowercase().as_str())
    }
}

/// Names of `columns`, in order.
pub fn column_names(columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| c.name.clone()).collect()
}

/// Schema-qualified display name.
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}
