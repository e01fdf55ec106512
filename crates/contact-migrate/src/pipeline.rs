//! One migration run: migrate schema, load, verify

use sqlx::PgPool;
use tracing::info;

use crate::db;
use crate::error::Result;
use crate::loader::{LoadMode, LoadReport, Loader};
use crate::models::SourceRecord;
use crate::sql_variant;
use crate::verify::{verify, VerificationSummary};

/// Which implementation applies the transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Variant {
    /// Decode in Rust, upsert per row or in one batch
    #[default]
    Procedural,
    /// Stage raw rows and decode/upsert inside PostgreSQL
    Sql,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: LoadMode,
    pub variant: Variant,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub load: LoadReport,
    pub verification: VerificationSummary,
}

/// Apply already-read `records` to the database behind `db`
pub async fn run(db: &PgPool, records: &[SourceRecord], options: &RunOptions) -> Result<RunSummary> {
    db::health_check(db).await?;

    if options.run_migrations {
        db::run_migrations(db).await?;
    }

    let load = match options.variant {
        Variant::Procedural => Loader::new(db.clone()).load(records, options.mode).await?,
        Variant::Sql => sql_variant::load_with_sql(db, records).await?,
    };

    let verification = verify(db).await?;

    info!(
        variant = ?options.variant,
        strategy = %load.strategy,
        succeeded = load.succeeded,
        failed = load.failed,
        total_rows = verification.total_rows,
        "Migration run complete"
    );

    Ok(RunSummary { load, verification })
}
