// Atomic JSON file operations for settings and history

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

lazy_static::lazy_static! {
    static ref FILE_LOCK: Mutex<()> = Mutex::new(());
}

fn read_unlocked<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let contents =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {:?}: {}", path, e))?;

    serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse JSON from {:?}: {}", path, e))
}

/// Writes JSON atomically using write-to-temp-then-rename
fn write_unlocked<T: Serialize>(path: &Path, data: &T) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory {:?}: {}", parent, e))?;
    }

    let json_string = serde_json::to_string_pretty(data)
        .map_err(|e| format!("Failed to serialize data: {}", e))?;

    let temp_path = path.with_extension("tmp");
    let mut temp_file = File::create(&temp_path)
        .map_err(|e| format!("Failed to create temp file {:?}: {}", temp_path, e))?;

    temp_file
        .write_all(json_string.as_bytes())
        .map_err(|e| format!("Failed to write to temp file: {}", e))?;
    temp_file
        .sync_all()
        .map_err(|e| format!("Failed to sync temp file: {}", e))?;

    fs::rename(&temp_path, path)
        .map_err(|e| format!("Failed to rename temp file to {:?}: {}", path, e))
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let _lock = FILE_LOCK.lock();

    if !path.exists() {
        return Err(format!("File not found: {:?}", path));
    }
    read_unlocked(path)
}

pub fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<(), String> {
    let _lock = FILE_LOCK.lock();
    write_unlocked(path, data)
}

pub fn initialize_json_file<T: Serialize>(path: &Path, default: &T) -> Result<(), String> {
    if !path.exists() {
        log::debug!("Initializing JSON file: {:?}", path);
        write_json_file(path, default)?;
    }
    Ok(())
}

pub fn read_json_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, String> {
    let _lock = FILE_LOCK.lock();

    if path.exists() {
        read_unlocked(path)
    } else {
        Ok(T::default())
    }
}

/// Read-modify-write under a single lock so concurrent writers never
/// interleave. A missing file starts from `T::default()`.
pub fn update_json_file<T, F>(path: &Path, update_fn: F) -> Result<T, String>
where
    T: DeserializeOwned + Serialize + Default,
    F: FnOnce(&mut T),
{
    let _lock = FILE_LOCK.lock();

    let mut data: T = if path.exists() {
        read_unlocked(path)?
    } else {
        T::default()
    };
    update_fn(&mut data);
    write_unlocked(path, &data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Settings;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            python_path: Some("python3".to_string()),
            ..Settings::default()
        };
        write_json_file(&path, &settings).unwrap();

        let loaded: Settings = read_json_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("missing.json");

        let result: Result<Settings, String> = read_json_file(&path);
        assert!(result.unwrap_err().contains("File not found"));

        let fallback: Settings = read_json_file_or_default(&path).unwrap();
        assert_eq!(fallback, Settings::default());
    }

    #[test]
    fn test_update_creates_and_appends() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("list.json");

        update_json_file(&path, |items: &mut Vec<u32>| items.push(1)).unwrap();
        let items = update_json_file(&path, |items: &mut Vec<u32>| items.push(2)).unwrap();
        assert_eq!(items, vec![1, 2]);

        let stored: Vec<u32> = read_json_file(&path).unwrap();
        assert_eq!(stored, vec![1, 2]);
    }

    #[test]
    fn test_initialize_keeps_existing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("list.json");

        write_json_file(&path, &vec![7u32]).unwrap();
        initialize_json_file(&path, &Vec::<u32>::new()).unwrap();

        let stored: Vec<u32> = read_json_file(&path).unwrap();
        assert_eq!(stored, vec![7]);
    }
}
