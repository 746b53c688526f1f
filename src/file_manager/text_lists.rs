// Flat newline-delimited selection lists (camera profiles, subjects)

use crate::models::CameraProfile;
use std::fs;
use std::path::Path;

/// Entries of a list file, trimmed, blank lines skipped. A missing or
/// unreadable file is an empty list; the UI simply shows no choices.
pub fn read_list_file(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => parse_list(&text),
        Err(e) => {
            log::warn!("No content found for {:?}: {}", path, e);
            Vec::new()
        }
    }
}

pub fn parse_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Camera profile lines that parse; malformed lines are skipped with a warning
pub fn read_camera_profiles(path: &Path) -> Vec<CameraProfile> {
    read_list_file(path)
        .into_iter()
        .filter_map(|line| match CameraProfile::parse(&line) {
            Ok(profile) => Some(profile),
            Err(e) => {
                log::warn!("Skipping camera profile {:?}: {}", line, e);
                None
            }
        })
        .collect()
}
