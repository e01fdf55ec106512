//! Error types for the contact migration
//!
//! Each variant maps to one failure class of a run. Only the per-record
//! variants are ever swallowed (and counted) by the per-row loader; every
//! other variant ends the run with a non-zero exit.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Error, Debug)]
pub enum MigrateError {
    /// Input CSV does not exist; raised before any storage interaction
    #[error("Input file not found: '{}'. Check the --input path.", .0.display())]
    InputNotFound(PathBuf),

    /// Input CSV exists but could not be read as CSV
    #[error("Failed to read CSV input: {0}")]
    Csv(#[from] csv::Error),

    /// Account identifier column is not an integer
    #[error("Invalid account identifier '{value}' on row {row}")]
    InvalidAccountId { row: usize, value: String },

    /// A batch-mode or SQL-variant write failed and the transaction was rolled back
    #[error("Batch of {records} records aborted, nothing was written: {source}")]
    BatchAborted {
        records: usize,
        #[source]
        source: Box<MigrateError>,
    },

    /// SQL query or connection error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}. Check the MIGRATE_DB_* environment variables.")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] contact_migrate_common::CommonError),
}

impl MigrateError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap a failure that aborted an all-or-nothing write
    pub fn batch_aborted(records: usize, source: MigrateError) -> Self {
        Self::BatchAborted {
            records,
            source: Box::new(source),
        }
    }
}
