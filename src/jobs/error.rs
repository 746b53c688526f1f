use crate::process_manager::SupervisorError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid extraction request: {0}")]
    InvalidRequest(String),

    #[error("An extraction job is already running")]
    AlreadyRunning,

    #[error("No extraction job is running")]
    NotRunning,

    #[error("Failed to prepare output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Spawn(#[from] SupervisorError),

    #[error("Worker exited with code {exit_code:?}")]
    WorkerFailure { exit_code: Option<i32> },

    #[error("Malformed progress token: {0:?}")]
    MalformedProgress(String),
}

impl JobError {
    /// Stable identifier for the UI side of the bridge
    pub fn code(&self) -> &'static str {
        match self {
            JobError::InvalidRequest(_) => "invalid_request",
            JobError::AlreadyRunning => "already_running",
            JobError::NotRunning => "not_running",
            JobError::OutputDir { .. } => "output_dir",
            JobError::Spawn(_) => "spawn_error",
            JobError::WorkerFailure { .. } => "worker_failure",
            JobError::MalformedProgress(_) => "malformed_progress",
        }
    }
}
