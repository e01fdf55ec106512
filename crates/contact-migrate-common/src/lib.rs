//! Contact Migrate Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error and logging plumbing for the contact migration workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`], a thin
//!   layer over `tracing-subscriber` and `tracing-appender`
//!
//! # Example
//!
//! ```no_run
//! use contact_migrate_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> contact_migrate_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     tracing::info!("logging ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
