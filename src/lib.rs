pub mod bridge;
#[cfg(feature = "desktop")]
mod commands;
pub mod file_manager;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod process_manager;
pub mod utils;

use file_manager::initialize_json_file;
use models::{ExtractionRecord, Settings};
use utils::{get_extraction_history_json_path, get_settings_json_path, initialize_data_directories};

pub fn initialize_app_data() -> Result<(), String> {
    // Create directory structure
    initialize_data_directories()?;

    // Initialize JSON files with defaults
    initialize_json_file(&get_settings_json_path(), &Settings::default())?;
    initialize_json_file(&get_extraction_history_json_path(), &Vec::<ExtractionRecord>::new())?;

    log::info!("App data initialized successfully");
    Ok(())
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use bridge::Bridge;
    use commands::{
        extraction::{
            bridge_request, cancel_extraction, clear_extraction_history, get_extraction_status,
            list_extraction_history, open_output_dir, pick_video_file, request_extraction,
        },
        selection::{get_camera_profiles, get_subjects},
        settings::{get_settings, load_settings, update_settings},
    };
    use jobs::OrchestratorConfig;
    use std::sync::Arc;
    use tauri::{Emitter, Manager, WindowEvent};

    let init_result = initialize_app_data();
    logging::cleanup_old_logs();

    let settings = load_settings();
    let bridge = Arc::new(Bridge::new(OrchestratorConfig::from_settings(&settings)));
    let event_bridge = bridge.clone();

    tauri::Builder::default()
        .plugin(logging::build_log_plugin())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_single_instance::init(|app, _argv, _cwd| {
            // Another instance tried to launch - show and focus the existing window
            if let Some(window) = app.get_webview_window("main") {
                let _ = window.show();
                let _ = window.unminimize();
                let _ = window.set_focus();
            }
        }))
        .on_window_event(|window, event| {
            // Drop webview subscribers once the main window is gone
            if let WindowEvent::Destroyed = event {
                if window.label() == "main" {
                    window.state::<Arc<Bridge>>().unsubscribe_all();
                }
            }
        })
        .manage(bridge)
        .setup(move |app| {
            if let Err(e) = init_result {
                log::error!("Failed to initialize app data: {}", e);
            }

            // Every job event is pushed to the webview under its own event name
            let handle = app.handle().clone();
            event_bridge.forward_all(move |event| {
                if let Err(e) = handle.emit(event.event_name(), &event) {
                    log::warn!("Failed to emit {}: {}", event.event_name(), e);
                }
            });

            log::info!("Frame Extractor {} started", app.package_info().version);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Extraction commands
            pick_video_file,
            request_extraction,
            cancel_extraction,
            get_extraction_status,
            bridge_request,
            list_extraction_history,
            clear_extraction_history,
            open_output_dir,
            // Selection lists
            get_camera_profiles,
            get_subjects,
            // Settings
            get_settings,
            update_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
