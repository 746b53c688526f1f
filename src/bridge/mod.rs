//! Narrow surface between the sandboxed UI and the privileged side.
//!
//! The UI can only submit an extraction for a file it was handed a
//! [`FileHandle`] for, cancel it, read status, and subscribe to events. It
//! never supplies a raw path and never reaches the process or filesystem
//! layer directly.

pub mod file_handles;
pub mod subscriptions;

pub use file_handles::{FileHandle, FileHandleRegistry, PickedFile};
pub use subscriptions::Subscriptions;

use crate::jobs::{JobError, JobOrchestrator, OrchestratorConfig};
use crate::models::{
    CameraProfile, CompletionEvent, JobRequest, JobSnapshot, LogEvent, ProgressEvent,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub const PROGRESS_EVENT: &str = "extraction-progress";
pub const COMPLETION_EVENT: &str = "extraction-finished";
pub const LOG_EVENT: &str = "extraction-log";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeRequest {
    RequestExtraction {
        file: FileHandle,
        subject_label: String,
        camera_profile: String,
    },
    CancelExtraction,
    GetStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeResponse {
    Accepted { job_id: String },
    CancelRequested { job_id: String },
    Status { snapshot: JobSnapshot },
    Rejected { code: String, message: String },
}

impl From<JobError> for BridgeResponse {
    fn from(err: JobError) -> Self {
        BridgeResponse::Rejected {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BridgeEvent {
    Progress(ProgressEvent),
    Completion(CompletionEvent),
    Log(LogEvent),
}

impl BridgeEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            BridgeEvent::Progress(_) => PROGRESS_EVENT,
            BridgeEvent::Completion(_) => COMPLETION_EVENT,
            BridgeEvent::Log(_) => LOG_EVENT,
        }
    }
}

pub struct Bridge {
    orchestrator: Arc<JobOrchestrator>,
    files: FileHandleRegistry,
    subscriptions: Arc<Subscriptions>,
}

impl Bridge {
    pub fn new(config: OrchestratorConfig) -> Self {
        let subscriptions = Arc::new(Subscriptions::new());
        let orchestrator = Arc::new(JobOrchestrator::new(config, subscriptions.clone()));
        Self {
            orchestrator,
            files: FileHandleRegistry::new(),
            subscriptions,
        }
    }

    pub fn orchestrator(&self) -> &Arc<JobOrchestrator> {
        &self.orchestrator
    }

    /// Privileged side only: called with the path the native picker returned
    pub fn register_file(&self, path: PathBuf) -> Result<PickedFile, JobError> {
        self.files.register(path)
    }

    /// Submit an extraction. Rejections come back here; everything after the
    /// worker starts arrives through the subscriptions.
    pub fn request_extraction(
        &self,
        file: &FileHandle,
        subject_label: &str,
        camera_profile: &str,
    ) -> Result<String, JobError> {
        let input_path = self
            .files
            .resolve(file)
            .ok_or_else(|| JobError::InvalidRequest("Unknown file handle".to_string()))?;
        let camera = CameraProfile::parse(camera_profile).map_err(JobError::InvalidRequest)?;

        self.orchestrator
            .submit(JobRequest::new(input_path, subject_label, camera))
    }

    pub fn cancel_extraction(&self) -> Result<String, JobError> {
        self.orchestrator.cancel()
    }

    pub fn status(&self) -> JobSnapshot {
        self.orchestrator.status()
    }

    pub fn subscribe_progress(&self, handler: impl Fn(ProgressEvent) + Send + Sync + 'static) {
        self.subscriptions.subscribe_progress(handler);
    }

    pub fn subscribe_completion(&self, handler: impl Fn(CompletionEvent) + Send + Sync + 'static) {
        self.subscriptions.subscribe_completion(handler);
    }

    pub fn subscribe_logs(&self, handler: impl Fn(LogEvent) + Send + Sync + 'static) {
        self.subscriptions.subscribe_logs(handler);
    }

    /// Route every event kind to one forwarder, e.g. a webview emitter
    pub fn forward_all(&self, forward: impl Fn(BridgeEvent) + Send + Sync + 'static) {
        let forward = Arc::new(forward);

        let f = forward.clone();
        self.subscribe_progress(move |e| f(BridgeEvent::Progress(e)));
        let f = forward.clone();
        self.subscribe_completion(move |e| f(BridgeEvent::Completion(e)));
        self.subscribe_logs(move |e| forward(BridgeEvent::Log(e)));
    }

    pub fn unsubscribe_all(&self) {
        self.subscriptions.unsubscribe_progress();
        self.subscriptions.unsubscribe_completion();
        self.subscriptions.unsubscribe_logs();
    }

    pub fn dispatch(&self, request: BridgeRequest) -> BridgeResponse {
        match request {
            BridgeRequest::RequestExtraction {
                file,
                subject_label,
                camera_profile,
            } => match self.request_extraction(&file, &subject_label, &camera_profile) {
                Ok(job_id) => BridgeResponse::Accepted { job_id },
                Err(e) => e.into(),
            },
            BridgeRequest::CancelExtraction => match self.cancel_extraction() {
                Ok(job_id) => BridgeResponse::CancelRequested { job_id },
                Err(e) => e.into(),
            },
            BridgeRequest::GetStatus => BridgeResponse::Status {
                snapshot: self.status(),
            },
        }
    }
}
