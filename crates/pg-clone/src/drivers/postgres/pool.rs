//! Connection pool setup and catalog queries shared by reader and writer.

use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use super::dialect::PostgresDialect;
use crate::config::DatabaseConfig;
use crate::core::schema::{qualified_name, Column};
use crate::drivers::common::TlsBuilder;
use crate::error::{ReplicateError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const KEEPALIVE_IDLE: Duration = Duration::from_secs(60);

const LIST_TABLES_SQL: &str = r#"
    SELECT tablename::text
    FROM pg_catalog.pg_tables
    WHERE schemaname = $1
    ORDER BY tablename
"#;

const LIST_COLUMNS_SQL: &str = r#"
    SELECT
        a.attname::text,
        t.typname::text,
        pg_catalog.format_type(a.atttypid, a.atttypmod),
        a.attnum::int4
    FROM pg_catalog.pg_attribute a
    JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
    JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_catalog.pg_type t ON t.oid = a.atttypid
    WHERE n.nspname = $1
      AND c.relname = $2
      AND a.attnum > 0
      AND NOT a.attisdropped
"#;

const SERVER_VERSION_SQL: &str = "SELECT current_setting('server_version_num')::int4";

/// First release with generated columns (`pg_attribute.attgenerated`).
const GENERATED_COLUMNS_VERSION: i32 = 120_000;

/// Column listing for a server version. Generated columns are skipped since
/// they cannot be inserted into; before 12 the catalog has no such column.
fn list_columns_sql(server_version_num: i32) -> String {
    let generated_filter = if server_version_num >= GENERATED_COLUMNS_VERSION {
        "      AND a.attgenerated = ''\n"
    } else {
        ""
    };
    format!("{}{}    ORDER BY a.attnum\n", LIST_COLUMNS_SQL, generated_filter)
}

/// Build a pool for one side and verify it with `SELECT 1`.
///
/// `role` names the side ("source" or "destination") in logs and errors.
pub(crate) async fn connect(config: &DatabaseConfig, max_conns: usize, role: &str) -> Result<Pool> {
    let mut pg_config = PgConfig::new();
    pg_config
        .host(&config.host)
        .port(config.port)
        .dbname(&config.database)
        .user(&config.user)
        .password(&config.password)
        .application_name("pg-clone")
        .connect_timeout(CONNECT_TIMEOUT)
        .keepalives(true)
        .keepalives_idle(KEEPALIVE_IDLE);

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
        Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        None => {
            warn!(
                "TLS is disabled for the {} database. Credentials will be transmitted in plaintext.",
                role
            );
            Manager::from_config(pg_config, NoTls, mgr_config)
        }
    };

    let pool = Pool::builder(mgr)
        .max_size(max_conns.max(1))
        .build()
        .map_err(|e| ReplicateError::connection(e, format!("creating {} pool", role)))?;

    let client = pool.get().await.map_err(|e| {
        ReplicateError::connection(e, format!("connecting to {} {}", role, config.endpoint()))
    })?;
    client.simple_query("SELECT 1").await.map_err(|e| {
        ReplicateError::connection(e, format!("testing {} connection", role))
    })?;

    info!("Connected to {} database: {}", role, config.endpoint());
    Ok(pool)
}

pub(crate) async fn list_tables(pool: &Pool, schema: &str) -> Result<Vec<String>> {
    let context = format!("listing tables in schema {}", schema);
    let client = pool
        .get()
        .await
        .map_err(|e| ReplicateError::catalog(&context, e))?;
    let rows = client
        .query(LIST_TABLES_SQL, &[&schema])
        .await
        .map_err(|e| ReplicateError::catalog(&context, e))?;

    let tables: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
    debug!("Found {} tables in schema {}", tables.len(), schema);
    Ok(tables)
}

pub(crate) async fn list_columns(pool: &Pool, schema: &str, table: &str) -> Result<Vec<Column>> {
    let qualified = qualified_name(schema, table);
    let context = format!("listing columns of {}", qualified);
    let client = pool
        .get()
        .await
        .map_err(|e| ReplicateError::catalog(&context, e))?;
    let version: i32 = client
        .query_one(SERVER_VERSION_SQL, &[])
        .await
        .map_err(|e| ReplicateError::catalog(&context, e))?
        .get(0);
    let rows = client
        .query(&list_columns_sql(version), &[&schema, &table])
        .await
        .map_err(|e| ReplicateError::catalog(&context, e))?;

    if rows.is_empty() {
        return Err(ReplicateError::catalog(context, "table not found"));
    }

    let columns: Vec<Column> = rows
        .iter()
        .map(|row| Column {
            name: row.get(0),
            data_type: row.get(1),
            sql_type: row.get(2),
            ordinal_pos: row.get(3),
        })
        .collect();

    debug!("Loaded {} columns for {}", columns.len(), qualified);
    Ok(columns)
}

pub(crate) async fn row_count(pool: &Pool, schema: &str, table: &str) -> Result<i64> {
    let context = format!("counting rows in {}", qualified_name(schema, table));
    let client = pool
        .get()
        .await
        .map_err(|e| ReplicateError::catalog(&context, e))?;
    let row = client
        .query_one(&PostgresDialect::build_count_query(schema, table), &[])
        .await
        .map_err(|e| ReplicateError::catalog(&context, e))?;
    Ok(row.get(0))
}

pub(crate) async fn ping(pool: &Pool) -> Result<()> {
    let client = pool
        .get()
        .await
        .map_err(|e| ReplicateError::connection(e, "getting connection for ping"))?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| ReplicateError::connection(e, "ping"))?;
    Ok(())
}
