// Extraction job orchestration
// Single authority over the job slot: validates, spawns, re-emits worker output

use super::history;
use super::validation::{validate_input_path, validate_subject_label};
use super::JobError;
use crate::models::{
    CompletionEvent, ExtractionRecord, FailureReason, JobRequest, JobSnapshot, JobStatus,
    LogEvent, LogStream, ProgressEvent, Settings,
};
use crate::process_manager::{
    spawn_worker, SupervisedWorker, WorkerArgs, WorkerCommand, WorkerExit, WorkerInvocation,
    WorkerOutput,
};
use crate::utils::{get_default_output_dir, get_extraction_history_json_path};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const OUTPUT_CHANNEL_CAPACITY: usize = 100;
const DIAGNOSTIC_TAIL_LINES: usize = 50;

/// Receiver of job events. Called from the job's monitor task, never while
/// the orchestrator holds its own lock, so implementations may call back into
/// the orchestrator.
pub trait JobEventSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
    fn on_completion(&self, event: CompletionEvent);
    fn on_log(&self, _event: LogEvent) {}
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub output_base_dir: PathBuf,
    pub worker: WorkerCommand,
    pub timeout: Option<Duration>,
    pub history_path: Option<PathBuf>,
    pub history_limit: usize,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let output_base_dir = settings
            .output_base_dir
            .as_ref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(get_default_output_dir);

        Self {
            output_base_dir,
            worker: WorkerCommand::from_settings(settings),
            timeout: settings
                .worker_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            history_path: Some(get_extraction_history_json_path()),
            history_limit: settings.history_limit,
        }
    }
}

struct ActiveJob {
    job_id: String,
    request: JobRequest,
    subject_label: String,
    output_dir: PathBuf,
    status: JobStatus,
    last_progress: u8,
    created_at: String,
    cancel: Option<oneshot::Sender<()>>,
    diagnostics: VecDeque<String>,
}

impl ActiveJob {
    fn push_diagnostic(&mut self, line: String) {
        if self.diagnostics.len() == DIAGNOSTIC_TAIL_LINES {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(line);
    }

    fn to_record(&self, exit_code: Option<i32>, failure: Option<FailureReason>) -> ExtractionRecord {
        ExtractionRecord {
            job_id: self.job_id.clone(),
            input_file: self.request.input_path.to_string_lossy().to_string(),
            subject_label: self.subject_label.clone(),
            camera: self.request.camera.clone(),
            output_dir: self.output_dir.to_string_lossy().to_string(),
            status: self.status,
            exit_code,
            failure,
            diagnostics: self.diagnostics.iter().cloned().collect(),
            created_at: self.created_at.clone(),
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub struct JobOrchestrator {
    config: Mutex<OrchestratorConfig>,
    slot: Mutex<Option<ActiveJob>>,
    sink: Arc<dyn JobEventSink>,
}

impl JobOrchestrator {
    pub fn new(config: OrchestratorConfig, sink: Arc<dyn JobEventSink>) -> Self {
        Self {
            config: Mutex::new(config),
            slot: Mutex::new(None),
            sink,
        }
    }

    pub fn config(&self) -> OrchestratorConfig {
        self.config.lock().clone()
    }

    /// Applies to the next submission; a running job keeps its settings
    pub fn update_config(&self, config: OrchestratorConfig) {
        *self.config.lock() = config;
    }

    /// Validate and start a job. A spawn failure still returns the job id;
    /// the failure follows as that job's completion event. Must be called
    /// from within a tokio runtime.
    pub fn submit(self: &Arc<Self>, request: JobRequest) -> Result<String, JobError> {
        let config = self.config();
        let mut slot = self.slot.lock();

        if slot.is_some() {
            return Err(JobError::AlreadyRunning);
        }

        let subject_label = validate_subject_label(&request.subject_label)?;
        validate_input_path(&request.input_path)?;

        let output_dir = config.output_base_dir.clone();
        fs::create_dir_all(&output_dir).map_err(|source| JobError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let job_id = uuid::Uuid::new_v4().to_string();
        let invocation = WorkerInvocation::new(
            config.worker.clone(),
            WorkerArgs {
                input_path: request.input_path.clone(),
                output_dir: output_dir.clone(),
                subject_label: subject_label.clone(),
                camera: request.camera.clone(),
            },
        );

        let mut job = ActiveJob {
            job_id: job_id.clone(),
            request,
            subject_label,
            output_dir,
            status: JobStatus::Idle,
            last_progress: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
            cancel: None,
            diagnostics: VecDeque::new(),
        };

        match spawn_worker(&invocation) {
            Ok(worker) => {
                let (cancel_tx, cancel_rx) = oneshot::channel();
                job.status = JobStatus::Running;
                job.cancel = Some(cancel_tx);
                info!(
                    "Started extraction job {} for {:?} (subject {})",
                    job_id, job.request.input_path, job.subject_label
                );
                *slot = Some(job);
                drop(slot);

                let orchestrator = Arc::clone(self);
                let monitor_id = job_id.clone();
                tokio::spawn(async move {
                    orchestrator
                        .monitor(monitor_id, worker, cancel_rx, config.timeout)
                        .await;
                });
            }
            Err(e) => {
                let err = JobError::from(e);
                error!("Failed to start extraction job {}: {}", job_id, err);
                job.push_diagnostic(err.to_string());
                *slot = Some(job);
                drop(slot);

                // Concluded on a task so the caller holds the id before the event
                let orchestrator = Arc::clone(self);
                let failed_id = job_id.clone();
                tokio::spawn(async move {
                    orchestrator.conclude(&failed_id, Some(FailureReason::SpawnError), None);
                });
            }
        }

        Ok(job_id)
    }

    /// Ask the running worker to stop. The job still ends through its normal
    /// completion event, marked as cancelled.
    pub fn cancel(&self) -> Result<String, JobError> {
        let mut slot = self.slot.lock();
        let job = slot
            .as_mut()
            .filter(|job| job.status == JobStatus::Running)
            .ok_or(JobError::NotRunning)?;

        if let Some(sender) = job.cancel.take() {
            let _ = sender.send(());
            info!("Cancellation requested for extraction job {}", job.job_id);
        }
        Ok(job.job_id.clone())
    }

    pub fn status(&self) -> JobSnapshot {
        let slot = self.slot.lock();
        match slot.as_ref() {
            Some(job) => JobSnapshot {
                job_id: Some(job.job_id.clone()),
                status: job.status,
                subject_label: Some(job.subject_label.clone()),
                output_dir: Some(job.output_dir.to_string_lossy().to_string()),
                last_progress: job.last_progress,
                started_at: Some(job.created_at.clone()),
            },
            None => JobSnapshot {
                job_id: None,
                status: JobStatus::Idle,
                subject_label: None,
                output_dir: None,
                last_progress: 0,
                started_at: None,
            },
        }
    }

    async fn monitor(
        self: Arc<Self>,
        job_id: String,
        worker: SupervisedWorker,
        cancel: oneshot::Receiver<()>,
        timeout: Option<Duration>,
    ) {
        let (tx, mut rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let supervision = tokio::spawn(worker.run(tx, cancel, timeout));

        while let Some(output) = rx.recv().await {
            self.handle_output(&job_id, output);
        }

        let exit = supervision.await.unwrap_or_else(|e| {
            error!("Supervision of job {} aborted: {}", job_id, e);
            WorkerExit::WaitFailed
        });

        let failure = match exit {
            _ if exit.is_success() => None,
            WorkerExit::Cancelled => Some(FailureReason::Cancelled),
            WorkerExit::TimedOut => Some(FailureReason::TimedOut),
            WorkerExit::Exited(_) | WorkerExit::WaitFailed => Some(FailureReason::WorkerFailure),
        };
        self.conclude(&job_id, failure, exit.exit_code());
    }

    fn handle_output(&self, job_id: &str, output: WorkerOutput) {
        match output {
            WorkerOutput::Progress(percent) => {
                let accepted = {
                    let mut slot = self.slot.lock();
                    match slot
                        .as_mut()
                        .filter(|job| job.job_id == job_id && job.status == JobStatus::Running)
                    {
                        Some(job) if percent >= job.last_progress => {
                            job.last_progress = percent;
                            true
                        }
                        _ => false,
                    }
                };

                if accepted {
                    self.sink.on_progress(ProgressEvent {
                        job_id: job_id.to_string(),
                        percent,
                    });
                }
            }
            WorkerOutput::MalformedProgress(token) => {
                let err = JobError::MalformedProgress(token);
                warn!("Extraction job {}: {}", job_id, err);
                self.push_diagnostic(job_id, err.to_string());
            }
            WorkerOutput::Log(line) => {
                debug!("[worker {}] {}", job_id, line);
                self.push_diagnostic(job_id, line.clone());
                self.sink.on_log(LogEvent {
                    job_id: job_id.to_string(),
                    stream: LogStream::Stdout,
                    line,
                });
            }
            WorkerOutput::Diagnostic(line) => {
                warn!("[worker {} stderr] {}", job_id, line);
                self.push_diagnostic(job_id, line.clone());
                self.sink.on_log(LogEvent {
                    job_id: job_id.to_string(),
                    stream: LogStream::Stderr,
                    line,
                });
            }
        }
    }

    fn push_diagnostic(&self, job_id: &str, line: String) {
        let mut slot = self.slot.lock();
        if let Some(job) = slot.as_mut().filter(|job| job.job_id == job_id) {
            job.push_diagnostic(line);
        }
    }

    /// Move the job to its terminal state, report it exactly once, then free
    /// the slot for the next submission.
    fn conclude(&self, job_id: &str, failure: Option<FailureReason>, exit_code: Option<i32>) {
        let (event, record) = {
            let mut slot = self.slot.lock();
            let Some(job) = slot.as_mut().filter(|job| job.job_id == job_id) else {
                warn!("Extraction job {} finished but no longer owns the slot", job_id);
                return;
            };
            if job.status.is_terminal() {
                warn!("Extraction job {} already concluded", job_id);
                return;
            }

            job.status = match failure {
                None => JobStatus::Completed,
                Some(_) => JobStatus::Failed,
            };
            job.cancel = None;

            let event = match failure {
                None => CompletionEvent::Succeeded {
                    job_id: job_id.to_string(),
                    output_dir: job.output_dir.to_string_lossy().to_string(),
                },
                Some(reason) => CompletionEvent::Failed {
                    job_id: job_id.to_string(),
                    reason,
                },
            };
            (event, job.to_record(exit_code, failure))
        };

        match failure {
            None => info!(
                "Extraction job {} completed, frames in {}",
                job_id, record.output_dir
            ),
            Some(FailureReason::WorkerFailure) => error!(
                "Extraction job {} failed: {}",
                job_id,
                JobError::WorkerFailure { exit_code }
            ),
            Some(reason) => error!("Extraction job {} failed: {:?}", job_id, reason),
        }

        self.sink.on_completion(event);
        self.record_history(record);
        self.release(job_id);
    }

    fn record_history(&self, record: ExtractionRecord) {
        let (path, limit) = {
            let config = self.config.lock();
            (config.history_path.clone(), config.history_limit)
        };
        if let Some(path) = path {
            if let Err(e) = history::append_record(&path, record, limit) {
                warn!("Failed to record extraction history: {}", e);
            }
        }
    }

    fn release(&self, job_id: &str) {
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|job| job.job_id == job_id && job.status.is_terminal())
        {
            *slot = None;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::CameraProfile;
    use std::path::Path;
    use std::sync::{OnceLock, Weak};
    use tempfile::TempDir;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

    #[derive(Debug, Clone, PartialEq)]
    enum Recorded {
        Progress { percent: u8, while_running: bool },
        Completion(CompletionEvent),
        Log(LogEvent),
    }

    struct RecordingSink {
        tx: UnboundedSender<Recorded>,
        orchestrator: OnceLock<Weak<JobOrchestrator>>,
    }

    impl JobEventSink for RecordingSink {
        fn on_progress(&self, event: ProgressEvent) {
            let while_running = self
                .orchestrator
                .get()
                .and_then(Weak::upgrade)
                .map(|o| o.status().status == JobStatus::Running)
                .unwrap_or(false);
            let _ = self.tx.send(Recorded::Progress {
                percent: event.percent,
                while_running,
            });
        }

        fn on_completion(&self, event: CompletionEvent) {
            let _ = self.tx.send(Recorded::Completion(event));
        }

        fn on_log(&self, event: LogEvent) {
            let _ = self.tx.send(Recorded::Log(event));
        }
    }

    struct Fixture {
        dir: TempDir,
        video: PathBuf,
        orchestrator: Arc<JobOrchestrator>,
        events: UnboundedReceiver<Recorded>,
    }

    impl Fixture {
        fn new(script: &str) -> Self {
            Self::with_command(
                WorkerCommand::executable("sh").with_leading_args(["-c", script, "worker"]),
                None,
            )
        }

        fn with_command(worker: WorkerCommand, timeout: Option<Duration>) -> Self {
            let dir = tempfile::tempdir().expect("create temp dir");
            let video = dir.path().join("a.mp4");
            fs::write(&video, b"fake video").unwrap();

            let config = OrchestratorConfig {
                output_base_dir: dir.path().join("extracted_frames"),
                worker,
                timeout,
                history_path: Some(dir.path().join("history.json")),
                history_limit: 10,
            };

            let (tx, events) = unbounded_channel();
            let sink = Arc::new(RecordingSink {
                tx,
                orchestrator: OnceLock::new(),
            });
            let orchestrator = Arc::new(JobOrchestrator::new(config, sink.clone()));
            let _ = sink.orchestrator.set(Arc::downgrade(&orchestrator));

            Self {
                dir,
                video,
                orchestrator,
                events,
            }
        }

        fn request(&self, label: &str) -> JobRequest {
            JobRequest::new(
                &self.video,
                label,
                CameraProfile::parse("Amazon,Pipe Endoscope,4.145").unwrap(),
            )
        }

        fn base_dir(&self) -> PathBuf {
            self.dir.path().join("extracted_frames")
        }

        /// Collect events up to and including the completion
        async fn until_completion(&mut self) -> Vec<Recorded> {
            let mut seen = Vec::new();
            loop {
                let event = tokio::time::timeout(Duration::from_secs(10), self.events.recv())
                    .await
                    .expect("timed out waiting for completion")
                    .expect("sink dropped");
                let done = matches!(event, Recorded::Completion(_));
                seen.push(event);
                if done {
                    return seen;
                }
            }
        }

        async fn until_idle(&self) {
            for _ in 0..200 {
                if self.orchestrator.status().status == JobStatus::Idle {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("orchestrator never returned to idle");
        }
    }

    fn progress_values(events: &[Recorded]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                Recorded::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    fn completions(events: &[Recorded]) -> Vec<&CompletionEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                Recorded::Completion(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn read_args(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_worker_receives_sanitized_args_in_order() {
        let mut fx = Fixture::new(r#"printf '%s\n' "$@" > "$2/args.txt""#);
        let job_id = fx
            .orchestrator
            .submit(JobRequest::new(
                &fx.video,
                "John Doe",
                CameraProfile::parse("Amazon,Pipe Endoscope,4.145").unwrap(),
            ))
            .unwrap();

        let events = fx.until_completion().await;
        let base = fx.base_dir();
        assert_eq!(
            completions(&events),
            vec![&CompletionEvent::Succeeded {
                job_id,
                output_dir: base.to_string_lossy().to_string(),
            }]
        );

        assert_eq!(
            read_args(&base.join("args.txt")),
            vec![
                fx.video.to_string_lossy().to_string(),
                base.to_string_lossy().to_string(),
                "John_Doe".to_string(),
                "Amazon".to_string(),
                "Pipe Endoscope".to_string(),
                "4.145".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_progress_scenario() {
        let mut fx = Fixture::new(r#"printf 'PROGRESS: 10\nPROGRESS:55\nsome log\nPROGRESS:101\n'"#);
        fx.orchestrator.submit(fx.request("John Doe")).unwrap();

        let events = fx.until_completion().await;
        assert_eq!(progress_values(&events), vec![10, 55]);
        assert!(events
            .iter()
            .all(|e| !matches!(e, Recorded::Progress { while_running: false, .. })));
        assert!(matches!(
            events.last(),
            Some(Recorded::Completion(CompletionEvent::Succeeded { .. }))
        ));
        assert!(events.iter().any(|e| matches!(
            e,
            Recorded::Log(LogEvent { line, stream: LogStream::Stdout, .. }) if line == "some log"
        )));
    }

    #[tokio::test]
    async fn test_decreasing_progress_is_not_forwarded() {
        let mut fx = Fixture::new(r#"printf 'PROGRESS:30\nPROGRESS:20\nPROGRESS:40\nPROGRESS:abc\n'"#);
        fx.orchestrator.submit(fx.request("subject")).unwrap();

        let events = fx.until_completion().await;
        assert_eq!(progress_values(&events), vec![30, 40]);
    }

    #[tokio::test]
    async fn test_missing_worker_reports_single_failure() {
        let mut fx = Fixture::with_command(
            WorkerCommand::executable("/nonexistent/frame-extraction-worker"),
            None,
        );
        let job_id = fx.orchestrator.submit(fx.request("John Doe")).unwrap();
        assert!(fx.events.try_recv().is_err(), "completion arrived before submit returned");

        let events = fx.until_completion().await;
        assert_eq!(
            events,
            vec![Recorded::Completion(CompletionEvent::Failed {
                job_id,
                reason: FailureReason::SpawnError,
            })]
        );
        fx.until_idle().await;

        let records = history::list_records(&fx.dir.path().join("history.json")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].failure, Some(FailureReason::SpawnError));
        assert!(records[0].exit_code.is_none());
    }

    #[tokio::test]
    async fn test_second_request_rejected_while_running() {
        let mut fx = Fixture::new("sleep 0.5; echo PROGRESS:50; echo PROGRESS:100");
        let first = fx.orchestrator.submit(fx.request("first")).unwrap();
        assert_eq!(fx.orchestrator.status().status, JobStatus::Running);

        let second = fx.orchestrator.submit(fx.request("second"));
        assert!(matches!(second, Err(JobError::AlreadyRunning)));
        assert_eq!(fx.orchestrator.status().job_id.as_deref(), Some(first.as_str()));

        let events = fx.until_completion().await;
        assert_eq!(progress_values(&events), vec![50, 100]);
        assert_eq!(completions(&events).len(), 1);
        assert_eq!(completions(&events)[0].job_id(), first);
    }

    #[tokio::test]
    async fn test_background_child_does_not_block_completion() {
        let mut fx = Fixture::new("sleep 8 & echo PROGRESS:10");
        let job_id = fx.orchestrator.submit(fx.request("subject")).unwrap();

        let events = fx.until_completion().await;
        assert_eq!(progress_values(&events), vec![10]);
        assert_eq!(
            completions(&events),
            vec![&CompletionEvent::Succeeded {
                job_id,
                output_dir: fx.base_dir().to_string_lossy().to_string(),
            }]
        );

        fx.until_idle().await;
        assert!(fx.orchestrator.submit(fx.request("subject")).is_ok());
    }

    #[tokio::test]
    async fn test_new_job_accepted_after_completion() {
        let mut fx = Fixture::new("echo PROGRESS:100");
        let first = fx.orchestrator.submit(fx.request("subject")).unwrap();
        fx.until_completion().await;
        fx.until_idle().await;

        let second = fx.orchestrator.submit(fx.request("subject")).unwrap();
        assert_ne!(first, second);
        let events = fx.until_completion().await;
        assert!(events
            .iter()
            .all(|e| !matches!(e, Recorded::Completion(c) if c.job_id() == first)));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_worker_failure() {
        let mut fx = Fixture::new("echo 'ERROR: Could not open video file.' >&2; exit 2");
        let job_id = fx.orchestrator.submit(fx.request("subject")).unwrap();

        let events = fx.until_completion().await;
        assert_eq!(
            completions(&events),
            vec![&CompletionEvent::Failed {
                job_id,
                reason: FailureReason::WorkerFailure,
            }]
        );

        fx.until_idle().await;
        let records = history::list_records(&fx.dir.path().join("history.json")).unwrap();
        assert_eq!(records[0].status, JobStatus::Failed);
        assert_eq!(records[0].exit_code, Some(2));
        assert!(records[0]
            .diagnostics
            .iter()
            .any(|line| line.contains("Could not open video file")));
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let mut fx = Fixture::new("echo PROGRESS:5; exec sleep 30");
        assert!(matches!(fx.orchestrator.cancel(), Err(JobError::NotRunning)));

        let job_id = fx.orchestrator.submit(fx.request("subject")).unwrap();
        assert_eq!(fx.orchestrator.cancel().unwrap(), job_id);

        let events = fx.until_completion().await;
        assert_eq!(
            completions(&events),
            vec![&CompletionEvent::Failed {
                job_id,
                reason: FailureReason::Cancelled,
            }]
        );
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let mut fx = Fixture::with_command(
            WorkerCommand::executable("sh").with_leading_args(["-c", "exec sleep 30", "worker"]),
            Some(Duration::from_millis(200)),
        );
        fx.orchestrator.submit(fx.request("subject")).unwrap();

        let events = fx.until_completion().await;
        assert!(matches!(
            completions(&events)[0],
            CompletionEvent::Failed {
                reason: FailureReason::TimedOut,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_requests_are_rejected_synchronously() {
        let mut fx = Fixture::new("echo PROGRESS:100");
        let camera = CameraProfile::default();

        let relative = JobRequest::new("videos/a.mp4", "John", camera.clone());
        assert!(matches!(
            fx.orchestrator.submit(relative),
            Err(JobError::InvalidRequest(_))
        ));

        let missing = JobRequest::new(fx.dir.path().join("nope.mp4"), "John", camera.clone());
        assert!(matches!(
            fx.orchestrator.submit(missing),
            Err(JobError::InvalidRequest(_))
        ));

        let bad_label = JobRequest::new(&fx.video, "!!!", camera);
        assert!(matches!(
            fx.orchestrator.submit(bad_label),
            Err(JobError::InvalidRequest(_))
        ));

        assert_eq!(fx.orchestrator.status().status, JobStatus::Idle);
        assert!(fx.events.try_recv().is_err());
        assert!(!fx.base_dir().exists());
    }

    #[tokio::test]
    async fn test_existing_output_dir_is_fine() {
        let mut fx = Fixture::new("echo PROGRESS:100");
        fs::create_dir_all(fx.base_dir()).unwrap();

        fx.orchestrator.submit(fx.request("subject")).unwrap();
        let events = fx.until_completion().await;
        assert!(matches!(completions(&events)[0], CompletionEvent::Succeeded { .. }));
    }
}
