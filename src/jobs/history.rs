// Extraction history persisted as JSON

use crate::file_manager::{read_json_file_or_default, update_json_file, write_json_file};
use crate::models::ExtractionRecord;
use std::path::Path;

/// Append a record, keeping only the newest `limit` entries
pub fn append_record(path: &Path, record: ExtractionRecord, limit: usize) -> Result<(), String> {
    update_json_file(path, |records: &mut Vec<ExtractionRecord>| {
        records.push(record);
        if records.len() > limit {
            let excess = records.len() - limit;
            records.drain(..excess);
        }
    })?;
    Ok(())
}

pub fn list_records(path: &Path) -> Result<Vec<ExtractionRecord>, String> {
    read_json_file_or_default(path)
}

pub fn clear_records(path: &Path) -> Result<(), String> {
    write_json_file(path, &Vec::<ExtractionRecord>::new())
}
