//! Upsert of account contacts
//!
//! Two write strategies share one upsert contract (insert, or rewrite every
//! non-key column and `last_updated` when the account already exists):
//!
//! - **Per-row**: one transaction, one statement per record, each guarded by a
//!   savepoint. A failing record is rolled back to its savepoint, logged and
//!   counted; the transaction still commits everything else.
//! - **Batch**: one multi-row statement in one transaction. Any failure rolls
//!   back the whole load.
//!
//! [`LoadMode::Auto`] picks batch above [`BATCH_THRESHOLD`] records.

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{BATCH_CHUNK_ROWS, BATCH_THRESHOLD, MAX_ERROR_SAMPLES};
use crate::error::{MigrateError, Result};
use crate::models::{SourceRecord, TargetRecord};

const UPSERT_CONFLICT_SQL: &str = r#"
    ON CONFLICT (account_id) DO UPDATE SET
        emails = EXCLUDED.emails,
        phone_numbers = EXCLUDED.phone_numbers,
        extensions = EXCLUDED.extensions,
        created_by = EXCLUDED.created_by,
        last_updated = NOW()
"#;

/// Requested write strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LoadMode {
    /// Batch above the threshold, per-row otherwise
    #[default]
    Auto,
    PerRow,
    Batch,
}

/// Strategy actually used for a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    PerRow,
    Batch,
}

impl std::fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStrategy::PerRow => write!(f, "per-row"),
            WriteStrategy::Batch => write!(f, "batch"),
        }
    }
}

/// A record skipped by per-row loading
#[derive(Debug, Clone)]
pub struct RecordFailure {
    /// 1-based data row in the input
    pub row: usize,
    pub account_id: Option<i64>,
    pub error: String,
}

/// Outcome of a load
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub strategy: WriteStrategy,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// First few failures, for the run summary
    pub failures: Vec<RecordFailure>,
}

impl LoadReport {
    fn new(strategy: WriteStrategy, total: usize) -> Self {
        Self {
            strategy,
            total,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    fn record_failure(&mut self, failure: RecordFailure) {
        self.failed += 1;
        if self.failures.len() < MAX_ERROR_SAMPLES {
            self.failures.push(failure);
        }
    }
}

/// Writes account contacts through an explicitly owned pool
pub struct Loader {
    db: PgPool,
    batch_threshold: usize,
}

impl Loader {
    pub fn new(db: PgPool) -> Self {
        Self {
            db,
            batch_threshold: BATCH_THRESHOLD,
        }
    }

    /// Override the auto-mode threshold
    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold;
        self
    }

    pub fn strategy_for(&self, mode: LoadMode, records: usize) -> WriteStrategy {
        select_strategy(mode, records, self.batch_threshold)
    }

    /// Map and upsert `records`
    #[instrument(skip_all, fields(records = records.len(), mode = ?mode))]
    pub async fn load(&self, records: &[SourceRecord], mode: LoadMode) -> Result<LoadReport> {
        let strategy = self.strategy_for(mode, records.len());
        info!(%strategy, records = records.len(), "Loading account contacts");

        let report = match strategy {
            WriteStrategy::PerRow => self.load_per_row(records).await?,
            WriteStrategy::Batch => self.load_batch(records).await?,
        };

        if report.failed > 0 {
            error!(
                succeeded = report.succeeded,
                failed = report.failed,
                total = report.total,
                "Load completed with errors"
            );
            for failure in &report.failures {
                error!(
                    row = failure.row,
                    account_id = ?failure.account_id,
                    error = %failure.error,
                    "Sample error"
                );
            }
            if report.failed > report.failures.len() {
                error!(
                    additional_errors = report.failed - report.failures.len(),
                    "Additional errors not shown"
                );
            }
        }

        info!(
            %strategy,
            succeeded = report.succeeded,
            failed = report.failed,
            "Load finished"
        );

        Ok(report)
    }

    async fn load_per_row(&self, records: &[SourceRecord]) -> Result<LoadReport> {
        let mut report = LoadReport::new(WriteStrategy::PerRow, records.len());
        let mut tx = self.db.begin().await?;

        for (index, source) in records.iter().enumerate() {
            let row = index + 1;

            let target = match TargetRecord::try_from_source(row, source) {
                Ok(target) => target,
                Err(e) => {
                    warn!(row, error = %e, "Skipping unmappable record");
                    report.record_failure(RecordFailure {
                        row,
                        account_id: None,
                        error: e.to_string(),
                    });
                    continue;
                },
            };

            sqlx::query("SAVEPOINT record_savepoint")
                .execute(&mut *tx)
                .await?;

            match upsert_record(&mut tx, &target).await {
                Ok(()) => {
                    sqlx::query("RELEASE SAVEPOINT record_savepoint")
                        .execute(&mut *tx)
                        .await?;
                    report.succeeded += 1;
                    debug!(row, account_id = target.account_id, "Upserted record");
                },
                Err(e) => {
                    sqlx::query("ROLLBACK TO SAVEPOINT record_savepoint")
                        .execute(&mut *tx)
                        .await?;
                    error!(
                        row,
                        account_id = target.account_id,
                        error = %e,
                        "Failed to upsert record (isolated with savepoint)"
                    );
                    report.record_failure(RecordFailure {
                        row,
                        account_id: Some(target.account_id),
                        error: e.to_string(),
                    });
                },
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn load_batch(&self, records: &[SourceRecord]) -> Result<LoadReport> {
        let mut report = LoadReport::new(WriteStrategy::Batch, records.len());

        let targets = records
            .iter()
            .enumerate()
            .map(|(index, source)| TargetRecord::try_from_source(index + 1, source))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| MigrateError::batch_aborted(records.len(), e))?;

        let targets = collapse_duplicate_accounts(targets);

        if let Err(e) = self.write_batch(&targets).await {
            error!(records = records.len(), error = %e, "Batch load aborted, transaction rolled back");
            return Err(MigrateError::batch_aborted(records.len(), e));
        }

        report.succeeded = records.len();
        Ok(report)
    }

    async fn write_batch(&self, targets: &[TargetRecord]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let total_chunks = targets.len().div_ceil(BATCH_CHUNK_ROWS);

        for (chunk_idx, chunk) in targets.chunks(BATCH_CHUNK_ROWS).enumerate() {
            debug!(
                chunk = chunk_idx + 1,
                total_chunks,
                rows = chunk.len(),
                "Writing batch chunk"
            );
            batch_upsert(&mut tx, chunk).await?;
        }

        // Dropping `tx` on an earlier error rolls the whole batch back.
        tx.commit().await?;
        Ok(())
    }
}

/// Resolve `mode` against a record count; `Auto` batches strictly above `threshold`
pub fn select_strategy(mode: LoadMode, records: usize, threshold: usize) -> WriteStrategy {
    match mode {
        LoadMode::PerRow => WriteStrategy::PerRow,
        LoadMode::Batch => WriteStrategy::Batch,
        LoadMode::Auto if records > threshold => WriteStrategy::Batch,
        LoadMode::Auto => WriteStrategy::PerRow,
    }
}

/// Upsert one record inside `tx`
pub async fn upsert_record(
    tx: &mut Transaction<'_, Postgres>,
    record: &TargetRecord,
) -> Result<()> {
    batch_upsert(tx, std::slice::from_ref(record)).await
}

/// Upsert many records with one multi-row statement
///
/// Both write strategies end up here.
async fn batch_upsert(tx: &mut Transaction<'_, Postgres>, records: &[TargetRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO account_contacts (account_id, emails, phone_numbers, extensions, created_by) ",
    );

    query_builder.push_values(records, |mut b, record| {
        b.push_bind(record.account_id)
            .push_bind(&record.emails)
            .push_bind(&record.phone_numbers)
            .push_bind(record.extension_id)
            .push_bind(&record.created_by);
    });

    query_builder.push(UPSERT_CONFLICT_SQL);
    query_builder.build().execute(&mut **tx).await?;

    Ok(())
}

/// Keep the last record per account, at the position of its first occurrence.
///
/// PostgreSQL refuses to update the same row twice in one `ON CONFLICT`
/// statement, and a later row must win just as it does in per-row mode.
fn collapse_duplicate_accounts(records: Vec<TargetRecord>) -> Vec<TargetRecord> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(records.len());
    let mut collapsed: Vec<TargetRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.account_id) {
            Some(&pos) => collapsed[pos] = record,
            None => {
                positions.insert(record.account_id, collapsed.len());
                collapsed.push(record);
            },
        }
    }

    collapsed
}
