//! Submodule sync and initialization

use std::path::Path;

use crate::env::EnvOverlay;
use crate::process::{ExecutionResult, Invocation, OutputMode, ProcessRunner};

/// How submodule initialization went
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct InitReport {
    /// `git submodule sync` failure, if any
    pub sync_failure: Option<String>,
    /// Shallow init failed and a full-depth init was used instead
    pub shallow_fallback: Option<String>,
}

pub(crate) struct SubmoduleInit<'a> {
    pub runner: &'a dyn ProcessRunner,
    pub git: &'a str,
    pub env: &'a EnvOverlay,
    pub repository: &'a Path,
    /// 0 disables shallow initialization
    pub depth: u32,
}

impl SubmoduleInit<'_> {
    fn git(&self) -> Invocation {
        Invocation::new(self.git)
            .env(self.env.clone())
            .current_dir(self.repository)
    }

    async fn update(&self, depth: Option<u32>) -> ExecutionResult {
        let mut invocation = self
            .git()
            .args(["submodule", "update", "--init", "--recursive"]);
        if let Some(depth) = depth {
            invocation = invocation.args(["--depth".to_string(), depth.to_string()]);
        }
        self.runner
            .run(&invocation.output(OutputMode::Inherit))
            .await
    }

    /// Sync URLs from `.gitmodules` into the repository config, then init
    /// everything recursively
    ///
    /// Returns the failure summary when initialization did not succeed.
    pub async fn run(&self) -> Result<InitReport, String> {
        let mut report = InitReport::default();

        let sync = self
            .runner
            .run(&self.git().args(["submodule", "sync", "--recursive"]))
            .await;
        if !sync.success() {
            report.sync_failure = Some(sync.summary());
        }

        if self.depth == 0 {
            let full = self.update(None).await;
            return if full.success() {
                Ok(report)
            } else {
                Err(full.summary())
            };
        }

        let shallow = self.update(Some(self.depth)).await;
        if shallow.success() {
            return Ok(report);
        }

        // some servers refuse shallow fetches of unadvertised commits
        report.shallow_fallback = Some(shallow.summary());
        let full = self.update(None).await;
        if full.success() {
            Ok(report)
        } else {
            Err(full.summary())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;

    fn init<'a>(runner: &'a ScriptedRunner, env: &'a EnvOverlay, depth: u32) -> SubmoduleInit<'a> {
        SubmoduleInit {
            runner,
            git: "git",
            env,
            repository: Path::new("/tmp/work"),
            depth,
        }
    }

    #[tokio::test]
    async fn test_shallow_init() {
        let runner = ScriptedRunner::new();
        let env = EnvOverlay::new();
        let report = init(&runner, &env, 1).run().await.unwrap();

        assert_eq!(report, InitReport::default());
        assert_eq!(
            runner.command_lines(),
            vec![
                "submodule sync --recursive",
                "submodule update --init --recursive --depth 1",
            ]
        );
    }

    #[tokio::test]
    async fn test_shallow_falls_back_to_full() {
        let runner = ScriptedRunner::new().on(
            "submodule update --init --recursive --depth",
            ExecutionResult::exited(128).with_stderr("error: Server does not allow request for unadvertised object"),
        );
        let env = EnvOverlay::new();
        let report = init(&runner, &env, 1).run().await.unwrap();

        assert!(report.shallow_fallback.is_some());
        assert_eq!(
            runner.command_lines().last().map(String::as_str),
            Some("submodule update --init --recursive")
        );
    }

    #[tokio::test]
    async fn test_full_depth_failure() {
        let runner = ScriptedRunner::new().on(
            "submodule update",
            ExecutionResult::exited(1).with_stderr("fatal: clone of 'git@github.com:o/r.git' failed"),
        );
        let env = EnvOverlay::new();
        let err = init(&runner, &env, 0).run().await.unwrap_err();

        assert!(err.contains("clone of"));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_sync_failure_is_reported_not_fatal() {
        let runner = ScriptedRunner::new().on("submodule sync", ExecutionResult::exited(1));
        let env = EnvOverlay::new();
        let report = init(&runner, &env, 1).run().await.unwrap();
        assert!(report.sync_failure.is_some());
    }
}
