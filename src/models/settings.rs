// Settings data models
use serde::{Deserialize, Serialize};

const DEFAULT_HISTORY_LIMIT: usize = 200;

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Base directory handed to the worker; falls back to the app data dir.
    #[serde(default)]
    pub output_base_dir: Option<String>,
    /// Interpreter override; probed from PATH when unset.
    #[serde(default)]
    pub python_path: Option<String>,
    /// Worker script override; defaults to `python_workers/frame_extraction.py`.
    #[serde(default)]
    pub worker_script: Option<String>,
    #[serde(default)]
    pub camera_profiles_file: Option<String>,
    #[serde(default)]
    pub subjects_file: Option<String>,
    #[serde(default)]
    pub worker_timeout_secs: Option<u64>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_base_dir: None,
            python_path: None,
            worker_script: None,
            camera_profiles_file: None,
            subjects_file: None,
            worker_timeout_secs: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}
