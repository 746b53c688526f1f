// Worker process supervision
// Owns one spawned worker, pumps both output streams and reports its exit

use super::progress_parser::{LineBuffer, ParserEvent, ProgressParser};
use super::python_worker::WorkerInvocation;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// How long to keep draining pipes once the worker is gone. A worker's own
/// children can hold the pipes open past its exit or kill.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Worker script not found: {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Failed to spawn worker process {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to capture worker {0}")]
    MissingPipe(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutput {
    Progress(u8),
    MalformedProgress(String),
    Log(String),
    /// stderr line, never parsed for progress
    Diagnostic(String),
}

impl From<ParserEvent> for WorkerOutput {
    fn from(event: ParserEvent) -> Self {
        match event {
            ParserEvent::Progress(percent) => WorkerOutput::Progress(percent),
            ParserEvent::MalformedProgress(token) => WorkerOutput::MalformedProgress(token),
            ParserEvent::Log(line) => WorkerOutput::Log(line),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exit code, `None` when terminated by a signal
    Exited(Option<i32>),
    Cancelled,
    TimedOut,
    WaitFailed,
}

impl WorkerExit {
    pub fn is_success(self) -> bool {
        self == WorkerExit::Exited(Some(0))
    }

    pub fn exit_code(self) -> Option<i32> {
        match self {
            WorkerExit::Exited(code) => code,
            _ => None,
        }
    }

    fn was_forced(self) -> bool {
        matches!(self, WorkerExit::Cancelled | WorkerExit::TimedOut)
    }
}

#[derive(Debug)]
pub struct SupervisedWorker {
    child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

/// Spawn the worker described by `invocation`. Fails before anything runs if
/// the script is missing or the program cannot be started.
pub fn spawn_worker(invocation: &WorkerInvocation) -> Result<SupervisedWorker, SupervisorError> {
    if let Some(script) = invocation.command.missing_script() {
        return Err(SupervisorError::ScriptNotFound(script.to_path_buf()));
    }

    let mut child = invocation
        .to_command()
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            program: invocation.program_display(),
            source,
        })?;

    let stdout = child.stdout.take().ok_or(SupervisorError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(SupervisorError::MissingPipe("stderr"))?;

    log::info!(
        "Spawned worker {} (pid {:?})",
        invocation.program_display(),
        child.id()
    );

    Ok(SupervisedWorker {
        child,
        stdout,
        stderr,
    })
}

impl SupervisedWorker {
    /// Drive the worker to completion. Output is sent on `output` in stream
    /// order; the returned exit is produced only after both streams are
    /// drained (or abandoned after `DRAIN_GRACE`), and the sender is dropped
    /// by then so the receiver sees the channel close.
    pub async fn run(
        self,
        output: mpsc::Sender<WorkerOutput>,
        cancel: oneshot::Receiver<()>,
        timeout: Option<Duration>,
    ) -> WorkerExit {
        let SupervisedWorker {
            mut child,
            stdout,
            stderr,
        } = self;

        let mut stdout_task = tokio::spawn(pump_stdout(stdout, output.clone()));
        let mut stderr_task = tokio::spawn(pump_stderr(stderr, output));

        let exit = wait_for_exit(&mut child, cancel, timeout).await;

        tokio::join!(
            drain_with_grace(&mut stdout_task),
            drain_with_grace(&mut stderr_task)
        );

        exit
    }
}

async fn wait_for_exit(
    child: &mut Child,
    mut cancel: oneshot::Receiver<()>,
    timeout: Option<Duration>,
) -> WorkerExit {
    let deadline = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    let exit = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => WorkerExit::Exited(status.code()),
            Err(e) => {
                log::error!("Failed to wait for worker process: {}", e);
                WorkerExit::WaitFailed
            }
        },
        // A dropped sender disables this branch rather than cancelling
        Ok(()) = &mut cancel => WorkerExit::Cancelled,
        _ = deadline => WorkerExit::TimedOut,
    };

    if !exit.was_forced() {
        return exit;
    }

    log::warn!("Stopping worker (pid {:?}): {:?}", child.id(), exit);
    if let Err(e) = child.kill().await {
        log::error!("Failed to kill worker process: {}", e);
    }
    exit
}

async fn drain_with_grace(task: &mut JoinHandle<()>) {
    if tokio::time::timeout(DRAIN_GRACE, &mut *task).await.is_err() {
        log::warn!("Worker output still open after exit; abandoning it");
        task.abort();
    }
}

async fn pump_stdout(stdout: ChildStdout, tx: mpsc::Sender<WorkerOutput>) {
    let mut parser = ProgressParser::new();
    read_chunks(stdout, |chunk| parser.feed(chunk), &tx).await;
    for event in parser.finish() {
        let _ = tx.send(event.into()).await;
    }
}

async fn pump_stderr(stderr: ChildStderr, tx: mpsc::Sender<WorkerOutput>) {
    let mut lines = LineBuffer::new();
    let mut to_outputs = |chunk: &[u8]| -> Vec<WorkerOutput> {
        lines
            .push(chunk)
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .map(WorkerOutput::Diagnostic)
            .collect()
    };
    read_chunks(stderr, &mut to_outputs, &tx).await;
    if let Some(line) = lines.finish().filter(|line| !line.trim().is_empty()) {
        let _ = tx.send(WorkerOutput::Diagnostic(line)).await;
    }
}

/// Read until EOF, forwarding whatever `decode` makes of each chunk. A closed
/// receiver does not stop the read, so the worker never blocks on a full pipe.
async fn read_chunks<R, F, T>(mut reader: R, mut decode: F, tx: &mpsc::Sender<WorkerOutput>)
where
    R: AsyncRead + Unpin,
    F: FnMut(&[u8]) -> Vec<T>,
    T: Into<WorkerOutput>,
{
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for item in decode(&buf[..n]) {
                    let _ = tx.send(item.into()).await;
                }
            }
            Err(e) => {
                log::warn!("Failed to read worker output: {}", e);
                break;
            }
        }
    }
}
