//! Source rows, target records and stored rows

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::FromRow;

use crate::config::CREATED_BY_MARKER;
use crate::error::{MigrateError, Result};
use crate::extractor::extract_extension_ids;

/// One row of the input CSV, as read.
///
/// Column names differ between exports, hence the aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceRecord {
    #[serde(default, alias = "accountId", alias = "id")]
    pub account_id: String,

    #[serde(default, alias = "email")]
    pub emails: Option<String>,

    #[serde(default, alias = "phones", alias = "phone")]
    pub phone_numbers: Option<String>,

    #[serde(default, alias = "feature_value", alias = "featureValue", alias = "extension")]
    pub extensions: Option<String>,
}

/// A record ready to be upserted into `account_contacts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    pub account_id: i64,
    pub emails: String,
    pub phone_numbers: String,
    /// First identifier decoded from the feature value
    pub extension_id: Option<i64>,
    pub created_by: String,
}

impl TargetRecord {
    /// Map a source row; `row` is the 1-based data row number used in errors.
    pub fn try_from_source(row: usize, source: &SourceRecord) -> Result<Self> {
        let account_id =
            source
                .account_id
                .trim_matches(|c: char| c.is_ascii_whitespace())
                .parse::<i64>()
                .map_err(|_| MigrateError::InvalidAccountId {
                    row,
                    value: source.account_id.clone(),
                })?;

        let ids = extract_extension_ids(source.extensions.as_deref());
        if ids.len() > 1 {
            tracing::debug!(
                account_id,
                ids = ?ids,
                "Feature value holds several identifiers, keeping the first"
            );
        }

        Ok(Self {
            account_id,
            emails: source.emails.clone().unwrap_or_default(),
            phone_numbers: source.phone_numbers.clone().unwrap_or_default(),
            extension_id: ids.first().copied(),
            created_by: CREATED_BY_MARKER.to_string(),
        })
    }
}

/// A row read back from `account_contacts`
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AccountContact {
    pub account_id: i64,
    pub emails: String,
    pub phone_numbers: String,
    pub extensions: Option<i64>,
    pub created_by: String,
    pub last_updated: DateTime<Utc>,
}
