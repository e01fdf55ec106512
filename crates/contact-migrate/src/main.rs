//! Contact Migrate - one-shot CSV to PostgreSQL account contact migration

use anyhow::{Context, Result};
use clap::Parser;
use contact_migrate::config::{DatabaseOverrides, MigrateConfig, DEFAULT_INPUT_PATH};
use contact_migrate::pipeline::{self, RunOptions, Variant};
use contact_migrate::{db, reader, LoadMode};
use contact_migrate_common::logging::{init_logging, LogConfig, LogLevel};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};

/// Exit status after Ctrl+C / SIGTERM
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "contact-migrate")]
#[command(author, version, about = "Migrate account contacts from a CSV export into PostgreSQL")]
struct Cli {
    /// CSV export to load
    #[arg(short, long, default_value = DEFAULT_INPUT_PATH)]
    input: PathBuf,

    /// Write strategy
    #[arg(short, long, value_enum, default_value_t = LoadMode::Auto)]
    mode: LoadMode,

    /// Apply the transform in Rust or inside PostgreSQL
    #[arg(long, value_enum, default_value_t = Variant::Procedural)]
    variant: Variant,

    /// Do not apply the embedded schema migrations
    #[arg(long)]
    skip_migrations: bool,

    /// Database host (overrides MIGRATE_DB_HOST)
    #[arg(long)]
    db_host: Option<String>,

    /// Database port (overrides MIGRATE_DB_PORT)
    #[arg(long)]
    db_port: Option<u16>,

    /// Database name (overrides MIGRATE_DB_NAME)
    #[arg(long)]
    db_name: Option<String>,

    /// Database user (overrides MIGRATE_DB_USER)
    #[arg(long)]
    db_user: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("contact-migrate")
        .filter_directives("sqlx=warn")
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env_with(log_config.clone()).unwrap_or(log_config);

    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        },
    };

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Migration failed");
            ExitCode::FAILURE
        },
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let overrides = DatabaseOverrides {
        host: cli.db_host,
        port: cli.db_port,
        name: cli.db_name,
        user: cli.db_user,
    };
    let mut config = MigrateConfig::load(cli.input, overrides).context("Invalid configuration")?;
    config.run_migrations = !cli.skip_migrations;
    info!(input = %config.input.display(), database = ?config.database, "Starting contact migration");

    // Read before connecting so a bad input never touches the database
    let records = reader::read_source_records(&config.input)?;

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to the database")?;

    let options = RunOptions {
        mode: cli.mode,
        variant: cli.variant,
        run_migrations: config.run_migrations,
    };

    let outcome = tokio::select! {
        result = pipeline::run(&pool, &records, &options) => Some(result),
        _ = shutdown_signal() => None,
    };

    pool.close().await;
    info!("Database connection pool closed");

    match outcome {
        Some(result) => {
            result?;
            Ok(ExitCode::SUCCESS)
        },
        None => {
            warn!("Migration interrupted, open transaction rolled back");
            Ok(ExitCode::from(INTERRUPTED_EXIT_CODE))
        },
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
