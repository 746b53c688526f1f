// Request validation before anything is spawned

use super::JobError;
use std::fs::{self, File};
use std::path::Path;

/// Whitespace runs become `_`; anything outside `[A-Za-z0-9_]` is dropped.
pub fn sanitize_subject_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len());
    let mut in_whitespace = false;

    for c in raw.trim().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                label.push('_');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || c == '_' {
            label.push(c);
        }
    }

    label
}

pub fn validate_subject_label(raw: &str) -> Result<String, JobError> {
    let label = sanitize_subject_label(raw);
    if label.is_empty() {
        return Err(JobError::InvalidRequest(format!(
            "Subject label {:?} is empty after sanitization",
            raw
        )));
    }
    Ok(label)
}

/// Input must be an absolute path to a readable regular file
pub fn validate_input_path(path: &Path) -> Result<(), JobError> {
    if path.as_os_str().is_empty() {
        return Err(JobError::InvalidRequest("Input path is empty".to_string()));
    }
    if !path.is_absolute() {
        return Err(JobError::InvalidRequest(format!(
            "Input path is not absolute: {:?}",
            path
        )));
    }

    let metadata = fs::metadata(path)
        .map_err(|e| JobError::InvalidRequest(format!("Input file not found: {:?} ({})", path, e)))?;
    if !metadata.is_file() {
        return Err(JobError::InvalidRequest(format!(
            "Input path is not a file: {:?}",
            path
        )));
    }

    File::open(path)
        .map_err(|e| JobError::InvalidRequest(format!("Input file unreadable: {:?} ({})", path, e)))?;
    Ok(())
}
