//! CSV input

use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::models::SourceRecord;

/// Read every record from the CSV file at `path`.
///
/// A missing file is reported as [`MigrateError::InputNotFound`] so callers
/// can fail before touching the database.
pub fn read_source_records(path: &Path) -> Result<Vec<SourceRecord>> {
    if !path.is_file() {
        return Err(MigrateError::InputNotFound(path.to_path_buf()));
    }

    let file = std::fs::File::open(path)?;
    let records = read_from(file)?;

    info!(path = %path.display(), records = records.len(), "Read input file");
    Ok(records)
}

/// Read records from any CSV source with a header row
pub fn read_from<R: Read>(input: R) -> Result<Vec<SourceRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);

    debug!(headers = ?reader.headers()?, "CSV headers");

    let mut records = Vec::new();
    for result in reader.deserialize::<SourceRecord>() {
        records.push(result?);
    }

    Ok(records)
}
