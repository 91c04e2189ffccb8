//! Configuration validation.

use super::{Config, DatabaseConfig};
use crate::drivers::SslMode;
use crate::error::{ReplicateError, Result};

/// Lowest bcrypt cost accepted by the hashing primitive.
const MIN_HASH_COST: u32 = 4;

/// Upper bound keeping placeholder hashing fast enough for bulk copies.
const MAX_HASH_COST: u32 = 16;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("source", &config.source)?;
    validate_database("target", &config.target)?;

    // Cannot replicate onto the source itself
    if config.source.host == config.target.host
        && config.source.port == config.target.port
        && config.source.database == config.target.database
    {
        return Err(ReplicateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    let replication = &config.replication;
    if replication.batch_size == 0 {
        return Err(ReplicateError::Config(
            "replication.batch_size must be greater than 0".into(),
        ));
    }
    if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&replication.password_hash_cost) {
        return Err(ReplicateError::Config(format!(
            "replication.password_hash_cost must be between {} and {}, got {}",
            MIN_HASH_COST, MAX_HASH_COST, replication.password_hash_cost
        )));
    }

    Ok(())
}

fn validate_database(side: &str, db: &DatabaseConfig) -> Result<()> {
    if db.host.is_empty() {
        return Err(ReplicateError::Config(format!("{}.host is required", side)));
    }
    if db.database.is_empty() {
        return Err(ReplicateError::Config(format!(
            "{}.database is required",
            side
        )));
    }
    if db.user.is_empty() {
        return Err(ReplicateError::Config(format!("{}.user is required", side)));
    }
    if db.schema.is_empty() {
        return Err(ReplicateError::Config(format!("{}.schema is required", side)));
    }
    SslMode::parse(&db.ssl_mode)?;
    Ok(())
}
