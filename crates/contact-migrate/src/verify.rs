//! Post-load read-back for the operator

use sqlx::PgPool;
use tracing::info;

use crate::config::VERIFY_SAMPLE_SIZE;
use crate::error::Result;
use crate::models::AccountContact;

/// Row count plus the most recently written rows
#[derive(Debug, Clone)]
pub struct VerificationSummary {
    pub total_rows: i64,
    pub sample: Vec<AccountContact>,
}

pub async fn verify(db: &PgPool) -> Result<VerificationSummary> {
    let total_rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM account_contacts")
        .fetch_one(db)
        .await?;

    let sample = sqlx::query_as::<_, AccountContact>(
        r#"
        SELECT account_id, emails, phone_numbers, extensions, created_by, last_updated
        FROM account_contacts
        ORDER BY last_updated DESC, account_id
        LIMIT $1
        "#,
    )
    .bind(VERIFY_SAMPLE_SIZE)
    .fetch_all(db)
    .await?;

    info!(total_rows, "Verification: rows in account_contacts");
    for row in &sample {
        info!(
            account_id = row.account_id,
            emails = %row.emails,
            phone_numbers = %row.phone_numbers,
            extensions = ?row.extensions,
            created_by = %row.created_by,
            last_updated = %row.last_updated,
            "Verification sample"
        );
    }

    Ok(VerificationSummary { total_rows, sample })
}
