use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

static APP_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

pub fn get_app_data_dir() -> PathBuf {
    APP_DATA_DIR
        .get_or_init(|| {
            let base_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."));
            base_dir.join("FrameExtractor")
        })
        .clone()
}

pub fn get_data_dir() -> PathBuf {
    get_app_data_dir().join("data")
}

pub fn get_logs_dir() -> PathBuf {
    get_app_data_dir().join("logs")
}

/// Default base directory handed to the worker as its output dir
pub fn get_default_output_dir() -> PathBuf {
    get_app_data_dir().join("extracted_frames")
}

pub fn get_settings_json_path() -> PathBuf {
    get_data_dir().join("settings.json")
}

pub fn get_extraction_history_json_path() -> PathBuf {
    get_data_dir().join("extraction_history.json")
}

pub fn get_camera_profiles_list_path() -> PathBuf {
    get_data_dir().join("camera_metadata.txt")
}

pub fn get_subjects_list_path() -> PathBuf {
    get_data_dir().join("patient_info.txt")
}

pub fn initialize_data_directories() -> Result<(), String> {
    let directories = [get_data_dir(), get_logs_dir(), get_default_output_dir()];

    for dir in &directories {
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| {
                format!("Failed to create directory {:?}: {}", dir, e)
            })?;
            log::info!("Created directory: {:?}", dir);
        }
    }

    log::info!("Data directories initialized at: {:?}", get_app_data_dir());
    Ok(())
}
