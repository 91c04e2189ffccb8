//! Connectivity checks for both databases.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::core::traits::Catalog;
use crate::drivers::{PostgresReader, PostgresWriter};
use crate::error::Result;

/// Result of probing source and destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl HealthCheckResult {
    fn from_probes(source: Probe, target: Probe) -> Self {
        let healthy = source.error.is_none() && target.error.is_none();
        Self {
            source_connected: source.error.is_none(),
            source_latency_ms: source.latency_ms,
            source_error: source.error,
            target_connected: target.error.is_none(),
            target_latency_ms: target.latency_ms,
            target_error: target.error,
            healthy,
        }
    }
}

struct Probe {
    latency_ms: u64,
    error: Option<String>,
}

impl Probe {
    fn from_result(start: Instant, result: Result<()>) -> Self {
        Self {
            latency_ms: start.elapsed().as_millis() as u64,
            error: result.err().map(|e| e.to_string()),
        }
    }
}

async fn probe<C: Catalog + ?Sized>(catalog: &C) -> Probe {
    let start = Instant::now();
    let result = catalog.ping().await;
    Probe::from_result(start, result)
}

/// Ping two already connected catalogs.
pub async fn ping_both<S, T>(source: &S, target: &T) -> HealthCheckResult
where
    S: Catalog + ?Sized,
    T: Catalog + ?Sized,
{
    HealthCheckResult::from_probes(probe(source).await, probe(target).await)
}

/// Connect to each side independently and ping it. Never fails: connection
/// errors are reported per side.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let start = Instant::now();
    let source = match PostgresReader::new(&config.source, 1).await {
        Ok(reader) => {
            let result = reader.ping().await;
            reader.close().await;
            Probe::from_result(start, result)
        }
        Err(e) => Probe::from_result(start, Err(e)),
    };

    let start = Instant::now();
    let target = match PostgresWriter::new(&config.target, 1).await {
        Ok(writer) => {
            let result = writer.ping().await;
            writer.close().await;
            Probe::from_result(start, result)
        }
        Err(e) => Probe::from_result(start, Err(e)),
    };

    HealthCheckResult::from_probes(source, target)
}
