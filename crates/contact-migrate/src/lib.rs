//! Contact Migrate Library
//!
//! Moves account contact records from a CSV export into the
//! `account_contacts` PostgreSQL table.
//!
//! # Overview
//!
//! - **Extraction**: [`extractor`] decodes the hex-encoded feature value into
//!   extension identifiers
//! - **Loading**: [`loader`] upserts records per row or as one batch;
//!   [`sql_variant`] runs the same transform inside PostgreSQL
//! - **Verification**: [`verify`] reads back a count and a sample
//!
//! # Example
//!
//! ```no_run
//! use contact_migrate::config::DatabaseConfig;
//! use contact_migrate::pipeline::{run, RunOptions};
//! use contact_migrate::{db, reader};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> contact_migrate::Result<()> {
//!     let records = reader::read_source_records(Path::new("contacts.csv"))?;
//!     let pool = db::create_pool(&DatabaseConfig::from_env()?).await?;
//!     let options = RunOptions { run_migrations: true, ..RunOptions::default() };
//!     let result = run(&pool, &records, &options).await;
//!     pool.close().await;
//!     result.map(|_| ())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod sql_variant;
pub mod verify;

// Re-export commonly used types
pub use error::{MigrateError, Result};
pub use extractor::extract_extension_ids;
pub use loader::{LoadMode, LoadReport, Loader};
