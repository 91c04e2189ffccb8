//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

/// Environment variable overriding `source.password`.
pub const SOURCE_PASSWORD_ENV: &str = "PGCLONE_SOURCE_PASSWORD";

/// Environment variable overriding `target.password`.
pub const TARGET_PASSWORD_ENV: &str = "PGCLONE_TARGET_PASSWORD";

impl Config {
    /// Load configuration from a YAML file, applying environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace passwords with values from the environment when present.
    ///
    /// The lookup is injected so callers (and tests) control the source.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(password) = lookup(SOURCE_PASSWORD_ENV) {
            self.source.password = password;
        }
        if let Some(password) = lookup(TARGET_PASSWORD_ENV) {
            self.target.password = password;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}
