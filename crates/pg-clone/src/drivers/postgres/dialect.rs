//! PostgreSQL SQL generation.

use crate::core::schema::Column;

/// Types the driver binds and decodes natively. Everything else crosses the
/// wire as text and is cast back to its declared type on insert.
const NATIVE_TYPES: &[&str] = &[
    "bool",
    "int2",
    "int4",
    "int8",
    "float4",
    "float8",
    "text",
    "varchar",
    "bpchar",
    "name",
    "bytea",
    "uuid",
    "timestamp",
    "timestamptz",
    "date",
    "time",
];

/// SQL builder for PostgreSQL statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Quote an identifier with double quotes, doubling embedded quotes.
    pub fn quote_ident(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// `"schema"."table"`.
    pub fn qualify_table(schema: &str, table: &str) -> String {
        format!(
            "{}.{}",
            Self::quote_ident(schema),
            Self::quote_ident(table)
        )
    }

    /// Whether values of `data_type` (a `pg_type.typname`) are bound natively.
    pub fn is_native_type(data_type: &str) -> bool {
        NATIVE_TYPES.contains(&data_type.to_lowercase().as_str())
    }

    fn select_expr(column: &Column) -> String {
        let ident = Self::quote_ident(&column.name);
        if Self::is_native_type(&column.data_type) {
            ident
        } else {
            format!("{}::text", ident)
        }
    }

    fn insert_placeholder(column: &Column, position: usize) -> String {
        if Self::is_native_type(&column.data_type) {
            format!("${}", position)
        } else {
            format!("CAST(${}::text AS {})", position, column.sql_type)
        }
    }

    /// Full-table scan listing every column explicitly, in the given order.
    pub fn build_select_query(schema: &str, table: &str, columns: &[Column]) -> String {
        let col_list = columns
            .iter()
            .map(Self::select_expr)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT {} FROM {}",
            col_list,
            Self::qualify_table(schema, table)
        )
    }

    /// Single-row parameterized insert with an explicit column list.
    pub fn build_insert_query(schema: &str, table: &str, columns: &[Column]) -> String {
        let col_list = columns
            .iter()
            .map(|c| Self::quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = columns
            .iter()
            .enumerate()
            .map(|(i, c)| Self::insert_placeholder(c, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            Self::qualify_table(schema, table),
            col_list,
            placeholders
        )
    }

    pub fn build_truncate_query(schema: &str, table: &str) -> String {
        format!("TRUNCATE TABLE {} CASCADE", Self::qualify_table(schema, table))
    }

    pub fn build_count_query(schema: &str, table: &str) -> String {
        format!(
            "SELECT COUNT(*)::int8 FROM {}",
            Self::qualify_table(schema, table)
        )
    }
}
