//! Process runner trait and the tokio-backed implementation

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::env::EnvOverlay;

/// Where a child's stdout and stderr go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Capture both streams into the [`ExecutionResult`]
    #[default]
    Capture,
    /// Discard both streams; only the exit status matters
    Null,
    /// Stream to the parent's stdout/stderr so the user sees progress
    Inherit,
}

/// A single external command to run
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Program name or path
    pub program: String,
    /// Arguments, not including the program
    pub args: Vec<OsString>,
    /// Working directory (inherits the parent's when unset)
    pub working_dir: Option<PathBuf>,
    /// Environment overlay
    pub env: EnvOverlay,
    /// Output handling
    pub output: OutputMode,
}

impl Invocation {
    /// Create an invocation of `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: EnvOverlay::new(),
            output: OutputMode::default(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the environment overlay
    pub fn env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    /// Set output handling
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Arguments as lossy UTF-8 strings
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Human-readable command line, e.g. `git lfs version`
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.argv())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of running an [`Invocation`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code, `None` if the process was killed by a signal or never started
    pub exit_code: Option<i32>,
    /// Captured stdout (empty unless [`OutputMode::Capture`])
    pub stdout: String,
    /// Captured stderr (empty unless [`OutputMode::Capture`])
    pub stderr: String,
    /// Set when the process could not be started at all
    pub spawn_error: Option<String>,
}

impl ExecutionResult {
    /// Result for a process that exited with `code`
    pub fn exited(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::default()
        }
    }

    /// Result for a process that could not be started
    pub fn spawn_failed(error: impl Into<String>) -> Self {
        Self {
            spawn_error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach captured stderr
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Attach captured stdout
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Whether the process ran and exited with status 0
    pub fn success(&self) -> bool {
        self.spawn_error.is_none() && self.exit_code == Some(0)
    }

    /// One-line description suitable for diagnostics
    pub fn summary(&self) -> String {
        if let Some(ref error) = self.spawn_error {
            return format!("could not start: {}", error);
        }

        let status = match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };

        match self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => format!("{} ({})", status, last.trim()),
            None => status,
        }
    }
}

/// Runs external commands
///
/// Implementations must not return early on a non-zero exit; the caller
/// decides whether that is fatal.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the invocation to completion
    async fn run(&self, invocation: &Invocation) -> ExecutionResult;
}

/// [`ProcessRunner`] that spawns real processes with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn build_command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(ref dir) = invocation.working_dir {
            cmd.current_dir(dir);
        }
        invocation.env.apply(&mut cmd);

        let (stdout, stderr) = match invocation.output {
            OutputMode::Capture => (Stdio::piped(), Stdio::piped()),
            OutputMode::Null => (Stdio::null(), Stdio::null()),
            OutputMode::Inherit => (Stdio::inherit(), Stdio::inherit()),
        };
        cmd.stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            // a timed-out state drops the future; take the child down with it
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> ExecutionResult {
        tracing::debug!(
            command = %invocation.command_line(),
            cwd = ?invocation.working_dir,
            output = ?invocation.output,
            "Running command"
        );

        let output = match Self::build_command(invocation).output().await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(program = %invocation.program, error = %e, "Failed to spawn");
                return ExecutionResult::spawn_failed(e.to_string());
            }
        };

        let result = ExecutionResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            spawn_error: None,
        };

        tracing::debug!(
            command = %invocation.command_line(),
            exit_code = ?result.exit_code,
            "Command finished"
        );

        result
    }
}
