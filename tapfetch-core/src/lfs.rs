//! Git LFS availability checks and content materialization

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::env::{find_on_path, EnvOverlay, PATH_VAR};
use crate::process::{ExecutionResult, Invocation, OutputMode, ProcessRunner};

/// Executable name of the LFS helper
pub const LFS_BINARY: &str = "git-lfs";

/// Drives the `git lfs` helper
pub struct LargeFileSync {
    runner: Arc<dyn ProcessRunner>,
    git: String,
    env: EnvOverlay,
    tool_dir: Option<PathBuf>,
    install_command: Vec<String>,
    install_attempted: AtomicBool,
}

impl std::fmt::Debug for LargeFileSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeFileSync")
            .field("git", &self.git)
            .field("tool_dir", &self.tool_dir)
            .field("install_command", &self.install_command)
            .finish_non_exhaustive()
    }
}

impl LargeFileSync {
    /// Create a helper driver that runs `git` with the given environment
    pub fn new(runner: Arc<dyn ProcessRunner>, git: impl Into<String>, env: EnvOverlay) -> Self {
        Self {
            runner,
            git: git.into(),
            env,
            tool_dir: None,
            install_command: Vec::new(),
            install_attempted: AtomicBool::new(false),
        }
    }

    /// Directory expected to contain `git-lfs`, used in diagnostics
    pub fn with_tool_dir(mut self, tool_dir: Option<PathBuf>) -> Self {
        self.tool_dir = tool_dir;
        self
    }

    /// Command run once to install the helper when the probe fails
    pub fn with_install_command(mut self, command: Vec<String>) -> Self {
        self.install_command = command;
        self
    }

    fn lfs(&self) -> Invocation {
        Invocation::new(&self.git).arg("lfs").env(self.env.clone())
    }

    /// Run the helper's own version command
    ///
    /// A binary on `PATH` is not enough: a broken install may exist on disk
    /// but fail to run.
    async fn probe(&self) -> bool {
        self.runner
            .run(&self.lfs().arg("version").output(OutputMode::Null))
            .await
            .success()
    }

    /// Check that the helper works, installing it once if it does not
    pub async fn ensure_available(&self) -> bool {
        if self.probe().await {
            return true;
        }

        let Some((program, args)) = self.install_command.split_first() else {
            return false;
        };
        if self.install_attempted.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!(command = %self.install_command.join(" "), "git-lfs missing, attempting install");
        let installed = self
            .runner
            .run(
                &Invocation::new(program)
                    .args(args)
                    .env(self.env.clone())
                    .output(OutputMode::Inherit),
            )
            .await;
        if !installed.success() {
            warn!(result = %installed.summary(), "git-lfs install failed");
            return false;
        }

        let hooks = self
            .runner
            .run(&self.lfs().args(["install", "--skip-repo"]).output(OutputMode::Capture))
            .await;
        if !hooks.success() {
            warn!(result = %hooks.summary(), "git lfs install --skip-repo failed");
        }

        self.probe().await
    }

    /// Version string reported by the helper, if it runs
    pub async fn version(&self) -> Option<String> {
        let result = self.runner.run(&self.lfs().arg("version")).await;
        result
            .success()
            .then(|| result.stdout.trim().to_string())
    }

    /// Download and check out LFS content in `repository`
    pub async fn pull(&self, repository: &Path) -> ExecutionResult {
        self.runner
            .run(
                &self
                    .lfs()
                    .arg("pull")
                    .current_dir(repository)
                    .output(OutputMode::Inherit),
            )
            .await
    }

    /// Lines describing where the helper was looked for
    pub fn diagnostics(&self) -> Vec<String> {
        let path = self.env.get(PATH_VAR).map(str::to_string).or_else(|| {
            (!self.env.is_sanitized())
                .then(|| std::env::var(PATH_VAR).ok())
                .flatten()
        });

        let tool_dir = self
            .tool_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string());

        let found = find_on_path(LFS_BINARY, path.as_deref())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not found)".to_string());

        vec![
            format!("PATH = {}", path.as_deref().unwrap_or("(unset)")),
            format!("tool directory = {}", tool_dir),
            format!("which {} = {}", LFS_BINARY, found),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;

    fn sync_with(runner: Arc<ScriptedRunner>) -> LargeFileSync {
        LargeFileSync::new(runner, "git", EnvOverlay::new().with("PATH", "/nonexistent"))
    }

    #[tokio::test]
    async fn test_available_when_probe_succeeds() {
        let runner = Arc::new(ScriptedRunner::new());
        assert!(sync_with(runner.clone()).ensure_available().await);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].argv(), vec!["lfs", "version"]);
        assert_eq!(calls[0].output, OutputMode::Null);
    }

    #[tokio::test]
    async fn test_unavailable_without_install_command() {
        let runner = Arc::new(ScriptedRunner::new().on("lfs version", ExecutionResult::exited(1)));
        assert!(!sync_with(runner.clone()).ensure_available().await);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_self_install_runs_once() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on_sequence(
                    "lfs version",
                    vec![ExecutionResult::exited(1), ExecutionResult::exited(0)],
                ),
        );
        let sync = sync_with(runner.clone())
            .with_install_command(vec!["brew".into(), "install".into(), "git-lfs".into()]);

        assert!(sync.ensure_available().await);
        let programs: Vec<String> = runner.calls().iter().map(|c| c.program.clone()).collect();
        assert_eq!(programs, vec!["git", "brew", "git", "git"]);
        assert!(runner.called("lfs install --skip-repo"));
    }

    #[tokio::test]
    async fn test_failed_install_not_retried() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("lfs version", ExecutionResult::exited(127))
                .on("install", ExecutionResult::exited(1)),
        );
        let sync = sync_with(runner.clone())
            .with_install_command(vec!["brew".into(), "install".into(), "git-lfs".into()]);

        assert!(!sync.ensure_available().await);
        assert!(!sync.ensure_available().await);
        let installs = runner.calls().iter().filter(|c| c.program == "brew").count();
        assert_eq!(installs, 1);
    }

    #[tokio::test]
    async fn test_pull_runs_in_repository() {
        let runner = Arc::new(ScriptedRunner::new().on("lfs pull", ExecutionResult::exited(2)));
        let result = sync_with(runner.clone()).pull(Path::new("/tmp/work")).await;

        assert_eq!(result.exit_code, Some(2));
        let call = &runner.calls()[0];
        assert_eq!(call.working_dir.as_deref(), Some(Path::new("/tmp/work")));
        assert_eq!(call.output, OutputMode::Inherit);
    }

    #[tokio::test]
    async fn test_version() {
        let runner = Arc::new(ScriptedRunner::new().on(
            "lfs version",
            ExecutionResult::exited(0).with_stdout("git-lfs/3.5.1 (GitHub; linux amd64; go 1.22.2)\n"),
        ));
        assert_eq!(
            sync_with(runner).version().await.as_deref(),
            Some("git-lfs/3.5.1 (GitHub; linux amd64; go 1.22.2)")
        );
    }

    #[test]
    fn test_diagnostics() {
        let sync = LargeFileSync::new(
            Arc::new(ScriptedRunner::new()),
            "git",
            EnvOverlay::new().with("PATH", "/nonexistent"),
        )
        .with_tool_dir(Some(PathBuf::from("/opt/homebrew/bin")));

        let lines = sync.diagnostics();
        assert_eq!(lines[0], "PATH = /nonexistent");
        assert_eq!(lines[1], "tool directory = /opt/homebrew/bin");
        assert_eq!(lines[2], "which git-lfs = (not found)");
    }
}
