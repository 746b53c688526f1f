// Selection list commands (camera profiles, subjects)
use super::settings::load_settings;
use crate::file_manager::{read_camera_profiles, read_list_file};
use crate::models::CameraProfile;
use crate::utils::{get_camera_profiles_list_path, get_subjects_list_path};
use std::path::PathBuf;

fn configured_or(path: Option<String>, fallback: fn() -> PathBuf) -> PathBuf {
    path.map(PathBuf::from).unwrap_or_else(fallback)
}

/// Camera profiles as `make,model,focalLength` lines the UI passes back verbatim
#[tauri::command]
pub fn get_camera_profiles() -> Vec<String> {
    let settings = load_settings();
    let path = configured_or(settings.camera_profiles_file, get_camera_profiles_list_path);
    read_camera_profiles(&path)
        .iter()
        .map(CameraProfile::display_line)
        .collect()
}

#[tauri::command]
pub fn get_subjects() -> Vec<String> {
    let settings = load_settings();
    let path = configured_or(settings.subjects_file, get_subjects_list_path);
    read_list_file(&path)
}
