// Extraction job data models
use super::CameraProfile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One extraction attempt as submitted from the UI side.
///
/// `subject_label` is carried raw; the orchestrator sanitizes it before it
/// reaches the worker.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub input_path: PathBuf,
    pub subject_label: String,
    pub camera: CameraProfile,
}

impl JobRequest {
    pub fn new(input_path: impl Into<PathBuf>, subject_label: &str, camera: CameraProfile) -> Self {
        Self {
            input_path: input_path.into(),
            subject_label: subject_label.to_string(),
            camera,
        }
    }
}

/// Read-only view of the orchestrator's job slot
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub subject_label: Option<String>,
    pub output_dir: Option<String>,
    pub last_progress: u8, // 0-100
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub job_id: String,
    pub percent: u8,
}

/// Opaque failure marker handed to the UI. Details stay in logs and history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    SpawnError,
    WorkerFailure,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionEvent {
    Succeeded { job_id: String, output_dir: String },
    Failed { job_id: String, reason: FailureReason },
}

impl CompletionEvent {
    pub fn job_id(&self) -> &str {
        match self {
            CompletionEvent::Succeeded { job_id, .. } | CompletionEvent::Failed { job_id, .. } => {
                job_id
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LogEvent {
    pub job_id: String,
    pub stream: LogStream,
    pub line: String,
}

/// Persisted outcome of a finished extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub job_id: String,
    pub input_file: String,
    pub subject_label: String,
    pub camera: CameraProfile,
    pub output_dir: String,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    pub created_at: String,
    pub completed_at: String,
}
