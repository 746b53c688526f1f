// Settings command handlers - JSON file storage
use crate::bridge::Bridge;
use crate::file_manager::{read_json_file_or_default, write_json_file};
use crate::jobs::OrchestratorConfig;
use crate::models::Settings;
use crate::utils::get_settings_json_path;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use tauri::State;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsParams {
    pub output_base_dir: Option<String>,
    pub python_path: Option<String>,
    pub worker_script: Option<String>,
    pub camera_profiles_file: Option<String>,
    pub subjects_file: Option<String>,
    pub worker_timeout_secs: Option<u64>,
    pub history_limit: Option<usize>,
}

/// Empty strings clear an optional path back to its default
fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Settings from disk, falling back to defaults when missing or unreadable
pub fn load_settings() -> Settings {
    read_json_file_or_default(&get_settings_json_path()).unwrap_or_else(|e| {
        log::warn!("Using default settings: {}", e);
        Settings::default()
    })
}

#[tauri::command]
pub fn get_settings() -> Result<Settings, String> {
    read_json_file_or_default(&get_settings_json_path())
}

/// Update settings with partial update support. The new worker configuration
/// applies from the next extraction onwards.
#[tauri::command]
pub fn update_settings(
    bridge: State<'_, Arc<Bridge>>,
    settings: UpdateSettingsParams,
) -> Result<Settings, String> {
    let path = get_settings_json_path();
    let mut current: Settings = read_json_file_or_default(&path)?;

    if let Some(output_base_dir) = settings.output_base_dir {
        current.output_base_dir = non_empty(output_base_dir);
    }
    if let Some(python_path) = settings.python_path {
        current.python_path = non_empty(python_path);
    }
    if let Some(worker_script) = settings.worker_script {
        current.worker_script = non_empty(worker_script);
    }
    if let Some(camera_profiles_file) = settings.camera_profiles_file {
        current.camera_profiles_file = non_empty(camera_profiles_file);
    }
    if let Some(subjects_file) = settings.subjects_file {
        current.subjects_file = non_empty(subjects_file);
    }
    if let Some(worker_timeout_secs) = settings.worker_timeout_secs {
        current.worker_timeout_secs = Some(worker_timeout_secs).filter(|secs| *secs > 0);
    }
    if let Some(history_limit) = settings.history_limit {
        current.history_limit = history_limit.max(1);
    }

    write_json_file(&path, &current)?;
    bridge
        .orchestrator()
        .update_config(OrchestratorConfig::from_settings(&current));

    debug!("Updated settings: {:?}", current);
    Ok(current)
}
