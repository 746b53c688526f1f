// Extraction worker contract
// Resolves the worker program and builds its fixed argument vector

use crate::models::{CameraProfile, Settings};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

pub const DEFAULT_WORKER_SCRIPT: &str = "frame_extraction.py";

const WORKERS_DIR_NAME: &str = "python_workers";

#[cfg(target_os = "windows")]
const INTERPRETER_CANDIDATES: &[&str] = &["python", "python3", "py"];

#[cfg(not(target_os = "windows"))]
const INTERPRETER_CANDIDATES: &[&str] = &["python3", "python"];

/// First interpreter on PATH that answers `--version` successfully
pub fn find_python_interpreter() -> Option<&'static str> {
    INTERPRETER_CANDIDATES.iter().copied().find(|candidate| {
        let mut cmd = std::process::Command::new(candidate);
        cmd.arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        match cmd.status() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                log::debug!("Interpreter {} answered --version with {}", candidate, status);
                false
            }
            Err(e) => {
                log::debug!("Interpreter {} unavailable: {}", candidate, e);
                false
            }
        }
    })
}

/// Where the bundled worker may live: beside the executable, up to three
/// levels above it (dev builds), then the working directory.
fn worker_dir_candidates() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .map(|exe_dir| {
            exe_dir
                .ancestors()
                .take(4)
                .map(|dir| dir.join(WORKERS_DIR_NAME))
                .collect()
        })
        .unwrap_or_default();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(WORKERS_DIR_NAME));
    }
    dirs
}

fn find_worker_script(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|dir| dir.join(DEFAULT_WORKER_SCRIPT))
        .find(|script| script.is_file())
}

/// The default worker script. When none is installed, the last candidate is
/// returned so the spawn error names a concrete location.
pub fn default_worker_script() -> PathBuf {
    let candidates = worker_dir_candidates();
    if let Some(script) = find_worker_script(&candidates) {
        log::debug!("Using worker script {:?}", script);
        return script;
    }

    let fallback = candidates
        .last()
        .cloned()
        .unwrap_or_else(|| PathBuf::from(WORKERS_DIR_NAME))
        .join(DEFAULT_WORKER_SCRIPT);
    log::warn!(
        "{} not found in {:?}; expecting it at {:?}",
        DEFAULT_WORKER_SCRIPT,
        candidates,
        fallback
    );
    fallback
}

/// The program that performs the extraction, plus whatever it needs ahead of
/// the positional job arguments (typically the script path for an interpreter).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCommand {
    pub program: OsString,
    pub leading_args: Vec<OsString>,
    /// Script that must exist before spawning, checked up front so a missing
    /// script surfaces as a spawn error rather than an interpreter failure.
    pub script: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn python(interpreter: impl Into<OsString>, script: impl Into<PathBuf>) -> Self {
        let script = script.into();
        Self {
            program: interpreter.into(),
            leading_args: vec![script.clone().into_os_string()],
            script: Some(script),
        }
    }

    pub fn executable(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            script: None,
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let interpreter = settings
            .python_path
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| find_python_interpreter().map(str::to_string))
            .unwrap_or_else(|| {
                log::warn!("No Python interpreter answered --version; trying \"python\"");
                "python".to_string()
            });

        let script = settings
            .worker_script
            .as_ref()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_worker_script);

        Self::python(interpreter, script)
    }

    pub fn missing_script(&self) -> Option<&Path> {
        self.script.as_deref().filter(|script| !script.exists())
    }
}

/// Positional job arguments, always emitted in this order:
/// input, output dir, subject, make, model, focal length.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerArgs {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub subject_label: String,
    pub camera: CameraProfile,
}

impl WorkerArgs {
    pub fn to_argv(&self) -> Vec<OsString> {
        vec![
            self.input_path.clone().into_os_string(),
            self.output_dir.clone().into_os_string(),
            OsString::from(&self.subject_label),
            OsString::from(&self.camera.make),
            OsString::from(&self.camera.model),
            OsString::from(self.camera.focal_length_arg()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct WorkerInvocation {
    pub command: WorkerCommand,
    pub args: WorkerArgs,
}

impl WorkerInvocation {
    pub fn new(command: WorkerCommand, args: WorkerArgs) -> Self {
        Self { command, args }
    }

    /// Full argument vector after the program name
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv = self.command.leading_args.clone();
        argv.extend(self.args.to_argv());
        argv
    }

    /// Discrete argv, no shell. stdin is closed; the worker never prompts.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.argv())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        cmd
    }

    pub fn program_display(&self) -> String {
        self.command.program.to_string_lossy().to_string()
    }
}
