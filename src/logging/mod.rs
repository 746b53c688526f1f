//! Logging setup for Frame Extractor
//! Installs the log plugin in desktop builds and keeps 7 days of log files

use crate::utils::get_logs_dir;
use log::info;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

const LOG_RETENTION_DAYS: u64 = 7;

#[cfg(feature = "desktop")]
pub const LOG_FILE_NAME: &str = "frame-extractor";

pub fn cleanup_old_logs() {
    remove_logs_older_than(
        &get_logs_dir(),
        Duration::from_secs(LOG_RETENTION_DAYS * 24 * 60 * 60),
    );
}

fn remove_logs_older_than(logs_dir: &Path, retention: Duration) -> usize {
    let Ok(entries) = fs::read_dir(logs_dir) else {
        return 0;
    };

    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "log") {
            continue;
        }

        let age = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if age.is_some_and(|age| age > retention) && fs::remove_file(&path).is_ok() {
            info!("Cleaned up old log: {:?}", path.file_name());
            removed += 1;
        }
    }

    removed
}

/// Stdout plus a rolling file in the app log dir; our own crate logs at debug
#[cfg(feature = "desktop")]
pub fn build_log_plugin<R: tauri::Runtime>() -> tauri::plugin::TauriPlugin<R> {
    use tauri_plugin_log::{Target, TargetKind};

    tauri_plugin_log::Builder::new()
        .clear_targets()
        .target(Target::new(TargetKind::Stdout))
        .target(Target::new(TargetKind::Folder {
            path: get_logs_dir(),
            file_name: Some(LOG_FILE_NAME.to_string()),
        }))
        .level(log::LevelFilter::Info)
        .level_for("frame_extractor_lib", log::LevelFilter::Debug)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_old_log_files_removed() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let log_file = dir.path().join("frame-extractor.log");
        let other_file = dir.path().join("notes.txt");
        fs::write(&log_file, "old").unwrap();
        fs::write(&other_file, "keep").unwrap();

        assert_eq!(remove_logs_older_than(dir.path(), Duration::from_secs(3600)), 0);
        assert!(log_file.exists());

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(remove_logs_older_than(dir.path(), Duration::from_millis(1)), 1);
        assert!(!log_file.exists());
        assert!(other_file.exists());
    }

    #[test]
    fn test_missing_dir_is_ignored() {
        let dir = tempfile::tempdir().expect("create temp dir");
        assert_eq!(remove_logs_older_than(&dir.path().join("nope"), Duration::ZERO), 0);
    }
}
