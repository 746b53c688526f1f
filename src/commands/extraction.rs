// Extraction command handlers - thin wrappers over the bridge
use crate::bridge::{Bridge, BridgeRequest, BridgeResponse, FileHandle, PickedFile};
use crate::jobs::history;
use crate::models::{ExtractionRecord, JobSnapshot};
use crate::utils::get_extraction_history_json_path;
use log::debug;
use std::sync::Arc;
use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;
use tauri_plugin_opener::OpenerExt;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "m4v", "webm"];

/// Open the native picker. The chosen path stays on this side; the UI only
/// receives a handle and the file name.
#[tauri::command]
pub async fn pick_video_file(
    app: AppHandle,
    bridge: State<'_, Arc<Bridge>>,
) -> Result<Option<PickedFile>, String> {
    let Some(file) = app
        .dialog()
        .file()
        .add_filter("Video", VIDEO_EXTENSIONS)
        .blocking_pick_file()
    else {
        return Ok(None);
    };

    let path = file.into_path().map_err(|e| e.to_string())?;
    let picked = bridge.register_file(path).map_err(|e| e.to_string())?;
    debug!("Registered video file {}", picked.file_name);
    Ok(Some(picked))
}

/// Fire-and-forget from the UI's perspective: progress and completion arrive
/// as `extraction-progress` / `extraction-finished` events.
#[tauri::command]
pub async fn request_extraction(
    bridge: State<'_, Arc<Bridge>>,
    file_handle: String,
    subject_label: String,
    camera_profile: String,
) -> Result<String, String> {
    bridge
        .request_extraction(&FileHandle::from(file_handle), &subject_label, &camera_profile)
        .map_err(|e| e.to_string())
}

/// Enumerated entry point: one message in, one response out. Rejections come
/// back as `BridgeResponse::Rejected` rather than an error.
#[tauri::command]
pub async fn bridge_request(
    bridge: State<'_, Arc<Bridge>>,
    request: BridgeRequest,
) -> Result<BridgeResponse, String> {
    debug!("Bridge request: {:?}", request);
    Ok(bridge.dispatch(request))
}

#[tauri::command]
pub fn cancel_extraction(bridge: State<'_, Arc<Bridge>>) -> Result<String, String> {
    bridge.cancel_extraction().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_extraction_status(bridge: State<'_, Arc<Bridge>>) -> JobSnapshot {
    bridge.status()
}

#[tauri::command]
pub fn list_extraction_history() -> Result<Vec<ExtractionRecord>, String> {
    history::list_records(&get_extraction_history_json_path())
}

#[tauri::command]
pub fn clear_extraction_history() -> Result<(), String> {
    history::clear_records(&get_extraction_history_json_path())
}

/// Reveal the configured output base directory in the file manager
#[tauri::command]
pub fn open_output_dir(app: AppHandle, bridge: State<'_, Arc<Bridge>>) -> Result<(), String> {
    let dir = bridge.orchestrator().config().output_base_dir;
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create directory {:?}: {}", dir, e))?;
    app.opener()
        .open_path(dir.to_string_lossy(), None::<&str>)
        .map_err(|e| e.to_string())
}
