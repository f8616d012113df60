use crate::constants::CSV_COLUMNS;
use crate::error::Result;
use crate::types::ReviewRecord;
use std::fs;
use std::path::Path;
use tracing::info;

/// Write records as CSV with a header row, creating parent directories as needed.
/// The header is written explicitly so it is present even when no rows survive.
pub fn write_reviews(path: &Path, records: &[ReviewRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

/// Read a review CSV back into memory. Unreadable or malformed input is fatal.
pub fn read_reviews(path: &Path) -> Result<Vec<ReviewRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: ReviewRecord = row?;
        records.push(record);
    }
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
