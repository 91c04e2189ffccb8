//! pg-clone CLI - replicate PostgreSQL tables with optional anonymization.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use pg_clone::orchestrator::health_check;
use pg_clone::{
    Config, HealthCheckResult, ReplicateError, ReplicationResult, Replicator, VerificationOutcome,
    VerifyReport,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-clone")]
#[command(about = "Replicate PostgreSQL tables with optional anonymization and row-count verification")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy table data from source to destination
    Data(CopyArgs),

    /// Compare table sets and row counts between source and destination
    Verify,

    /// Copy table data, then verify the tables that were copied
    Pull(CopyArgs),

    /// Test database connections
    HealthCheck,
}

/// Overrides for the `replication` section of the config file.
#[derive(Args, Debug, Default)]
struct CopyArgs {
    /// Anonymize sensitive columns
    #[arg(long)]
    anonymize: bool,

    /// Keep existing destination rows instead of truncating first
    #[arg(long)]
    no_truncate: bool,

    /// Rows per destination transaction
    #[arg(long)]
    batch_size: Option<usize>,

    /// Only replicate these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Skip these tables during discovery (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,
}

impl CopyArgs {
    fn apply(self, config: &mut Config) -> Result<(), ReplicateError> {
        let replication = &mut config.replication;
        if self.anonymize {
            replication.anonymize = true;
        }
        if self.no_truncate {
            replication.truncate_tables = false;
        }
        if let Some(batch_size) = self.batch_size {
            replication.batch_size = batch_size;
        }
        if !self.tables.is_empty() {
            replication.tables = self.tables;
        }
        if !self.exclude.is_empty() {
            replication.exclude_tables = self.exclude;
        }
        config.validate()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), ReplicateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let cancel = setup_signal_handler();

    match cli.command {
        Commands::Data(args) => {
            args.apply(&mut config)?;
            let replicator = Replicator::connect(config).await?;
            let result = replicator.replicate_all(&cancel).await;
            replicator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_replication(&result);
            }
            cancelled_to_error(&result)?;
        }

        Commands::Verify => {
            let replicator = Replicator::connect(config).await?;
            let outcome = verify(&replicator, None).await;
            replicator.close().await;
            let (missing, outcomes) = outcome?;

            if cli.output_json {
                let doc = json!({
                    "missing_tables": missing,
                    "summary": VerifyReport::new(&outcomes).summary(),
                    "tables": outcomes,
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!("{}", VerifyReport::new(&outcomes).with_missing_tables(&missing));
            }
        }

        Commands::Pull(args) => {
            args.apply(&mut config)?;
            let replicator = Replicator::connect(config).await?;
            let outcome = pull(&replicator, &cancel).await;
            replicator.close().await;
            let (result, missing, outcomes) = outcome?;

            if cli.output_json {
                let doc = json!({
                    "replication": result,
                    "verification": {
                        "missing_tables": missing,
                        "summary": VerifyReport::new(&outcomes).summary(),
                        "tables": outcomes,
                    },
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                print_replication(&result);
                println!();
                println!("{}", VerifyReport::new(&outcomes).with_missing_tables(&missing));
            }
            cancelled_to_error(&result)?;
        }

        Commands::HealthCheck => {
            let result = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_health(&result);
            }

            if !result.healthy {
                return Err(ReplicateError::connection(
                    "one or both databases are unreachable",
                    "health check",
                ));
            }
        }
    }

    Ok(())
}

/// Schema check then row counts. A schema mismatch is reported, not fatal.
async fn verify(
    replicator: &Replicator,
    tables: Option<Vec<String>>,
) -> Result<(Vec<String>, Vec<VerificationOutcome>), ReplicateError> {
    let verifier = replicator.verifier();
    let missing = match verifier.verify_schema().await {
        Ok(()) => Vec::new(),
        Err(ReplicateError::SchemaMismatch { missing }) => missing,
        Err(e) => return Err(e),
    };

    let tables = match tables {
        Some(tables) => tables,
        None => replicator.resolve_tables().await?,
    };
    let outcomes = verifier.verify_all(&tables).await;
    Ok((missing, outcomes))
}

async fn pull(
    replicator: &Replicator,
    cancel: &CancellationToken,
) -> Result<(ReplicationResult, Vec<String>, Vec<VerificationOutcome>), ReplicateError> {
    let result = replicator.replicate_all(cancel).await?;
    if cancel.is_cancelled() {
        return Ok((result, Vec::new(), Vec::new()));
    }
    let (missing, outcomes) = verify(replicator, Some(result.succeeded_tables())).await?;
    Ok((result, missing, outcomes))
}

/// Partial success is a normal outcome; only cancellation changes the exit code.
fn cancelled_to_error(result: &ReplicationResult) -> Result<(), ReplicateError> {
    if result.status == pg_clone::RunStatus::Cancelled {
        Err(ReplicateError::Cancelled)
    } else {
        Ok(())
    }
}

fn print_replication(result: &ReplicationResult) {
    println!();
    for outcome in &result.outcomes {
        match &outcome.error {
            None => println!("  \u{2713} {}: {} rows", outcome.table, outcome.rows_copied),
            Some(cause) => println!(
                "  \u{2717} {}: {} rows committed, {}",
                outcome.table, outcome.rows_copied, cause
            ),
        }
    }
    println!("\nReplication {}!", result.status);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Tables: {}/{}", result.tables_success, result.tables_total);
    println!("  Rows: {}", result.rows_copied);
    if !result.failed_tables.is_empty() {
        println!("  Failed tables: {:?}", result.failed_tables);
    }
}

fn print_health(result: &HealthCheckResult) {
    println!("Health Check Results:");
    println!(
        "  Source: {} ({}ms)",
        if result.source_connected { "OK" } else { "FAILED" },
        result.source_latency_ms
    );
    if let Some(ref err) = result.source_error {
        println!("    Error: {}", err);
    }
    println!(
        "  Destination: {} ({}ms)",
        if result.target_connected { "OK" } else { "FAILED" },
        result.target_latency_ms
    );
    if let Some(ref err) = result.target_error {
        println!("    Error: {}", err);
    }
    println!(
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to install {} handler: {}", name, e);
                    return;
                }
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Stopping after the current batch...", name);
            token.cancel();
        });
    }

    cancel
}

/// Cancel the returned token on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
            return;
        }
        eprintln!("\nReceived Ctrl-C. Stopping after the current batch...");
        token.cancel();
    });

    cancel
}
