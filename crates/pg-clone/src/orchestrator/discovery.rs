//! Resolution of the table set for a run.

use tracing::{debug, info};

use crate::config::ReplicationConfig;
use crate::core::traits::Catalog;
use crate::error::Result;

/// List every table of `schema` in catalog order, minus exact-name exclusions.
pub async fn discover<C>(catalog: &C, schema: &str, exclude: &[String]) -> Result<Vec<String>>
where
    C: Catalog + ?Sized,
{
    let tables = catalog.list_tables(schema).await?;
    let total = tables.len();
    let kept: Vec<String> = tables
        .into_iter()
        .filter(|t| !exclude.iter().any(|e| e == t))
        .collect();

    debug!(
        "Discovered {} tables in {} ({} excluded)",
        total,
        schema,
        total - kept.len()
    );
    Ok(kept)
}

/// The configured allow-list verbatim if non-empty, otherwise discovery.
///
/// A catalog failure here is fatal to the run.
pub async fn resolve_tables<C>(
    catalog: &C,
    schema: &str,
    config: &ReplicationConfig,
) -> Result<Vec<String>>
where
    C: Catalog + ?Sized,
{
    if !config.tables.is_empty() {
        info!("Using {} explicitly configured tables", config.tables.len());
        return Ok(config.tables.clone());
    }
    let tables = discover(catalog, schema, &config.exclude_tables).await?;
    info!("Found {} tables to replicate", tables.len());
    Ok(tables)
}
