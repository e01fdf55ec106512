//! Database-side variant of the load
//!
//! Raw CSV values are staged in a temporary table and a single
//! `INSERT ... SELECT` maps, decodes (via the `extract_extension_ids` SQL
//! function) and upserts them. Like batch mode it is all-or-nothing.

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, error, info, instrument};

use crate::config::{BATCH_CHUNK_ROWS, CREATED_BY_MARKER};
use crate::error::{MigrateError, Result};
use crate::loader::{LoadReport, WriteStrategy};
use crate::models::SourceRecord;

const CREATE_STAGING_SQL: &str = r#"
    CREATE TEMPORARY TABLE staging_account_contacts (
        row_number BIGINT NOT NULL,
        account_id TEXT NOT NULL,
        emails TEXT,
        phone_numbers TEXT,
        feature_value TEXT
    ) ON COMMIT DROP
"#;

// Later rows win for a repeated account, matching the per-row loader.
const APPLY_STAGING_SQL: &str = r#"
    INSERT INTO account_contacts (account_id, emails, phone_numbers, extensions, created_by)
    SELECT DISTINCT ON (parsed.account_id)
        parsed.account_id,
        COALESCE(parsed.emails, ''),
        COALESCE(parsed.phone_numbers, ''),
        (extract_extension_ids(parsed.feature_value))[1],
        $1
    FROM (
        SELECT btrim(account_id, E' \t\n\r\f')::BIGINT AS account_id, emails, phone_numbers, feature_value, row_number
        FROM staging_account_contacts
    ) AS parsed
    ORDER BY parsed.account_id, parsed.row_number DESC
    ON CONFLICT (account_id) DO UPDATE SET
        emails = EXCLUDED.emails,
        phone_numbers = EXCLUDED.phone_numbers,
        extensions = EXCLUDED.extensions,
        created_by = EXCLUDED.created_by,
        last_updated = NOW()
"#;

/// Load `records` with the decode and upsert running inside PostgreSQL
#[instrument(skip_all, fields(records = records.len()))]
pub async fn load_with_sql(db: &PgPool, records: &[SourceRecord]) -> Result<LoadReport> {
    info!(records = records.len(), "Loading account contacts through the SQL variant");

    if let Err(e) = apply(db, records).await {
        error!(records = records.len(), error = %e, "SQL variant load aborted, transaction rolled back");
        return Err(MigrateError::batch_aborted(records.len(), e));
    }

    info!(records = records.len(), "SQL variant load finished");

    Ok(LoadReport {
        strategy: WriteStrategy::Batch,
        total: records.len(),
        succeeded: records.len(),
        failed: 0,
        failures: Vec::new(),
    })
}

async fn apply(db: &PgPool, records: &[SourceRecord]) -> Result<()> {
    let mut tx = db.begin().await?;

    sqlx::query(CREATE_STAGING_SQL).execute(&mut *tx).await?;

    for (chunk_idx, chunk) in records.chunks(BATCH_CHUNK_ROWS).enumerate() {
        let offset = chunk_idx * BATCH_CHUNK_ROWS;
        stage_chunk(&mut tx, offset, chunk).await?;
    }

    let applied = sqlx::query(APPLY_STAGING_SQL)
        .bind(CREATED_BY_MARKER)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    debug!(applied, "Applied staged rows");

    tx.commit().await?;
    Ok(())
}

async fn stage_chunk(
    tx: &mut Transaction<'_, Postgres>,
    offset: usize,
    records: &[SourceRecord],
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO staging_account_contacts (row_number, account_id, emails, phone_numbers, feature_value) ",
    );

    query_builder.push_values(records.iter().enumerate(), |mut b, (index, record)| {
        b.push_bind((offset + index + 1) as i64)
            .push_bind(&record.account_id)
            .push_bind(&record.emails)
            .push_bind(&record.phone_numbers)
            .push_bind(&record.extensions);
    });

    query_builder.build().execute(&mut **tx).await?;
    Ok(())
}
