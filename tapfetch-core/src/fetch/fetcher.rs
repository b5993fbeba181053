//! Orchestration of a single fetch

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use humantime_serde::re::humantime;
use tracing::{error, info};

use super::request::{FailureKind, FetchOutcome, FetchRequest};
use super::state::{FetchProgress, FetchState};
use super::submodules::SubmoduleInit;
use crate::checkout::{BaseCheckout, GitCheckout};
use crate::config::{Config, RemediationConfig};
use crate::env::{EnvOptions, EnvSnapshot, PreparedEnv};
use crate::gitmodules::{ConfigRewriter, GITMODULES_FILE};
use crate::lfs::LargeFileSync;
use crate::process::{ProcessRunner, SystemRunner};
use crate::report::{failure_detail, fatal_block, remediation, ConsoleSink, ProgressSink};

/// Settings that apply to every fetch run by a [`RepositoryFetcher`]
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub git: String,
    pub tool_dir: Option<PathBuf>,
    pub install_command: Vec<String>,
    pub require_large_files: bool,
    pub submodule_depth: u32,
    pub state_timeout: Option<Duration>,
    pub sanitize_env: bool,
    pub preserve_prefixes: Vec<String>,
    pub remediation: RemediationConfig,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl FetchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            git: config.tools.git.clone(),
            tool_dir: config.tools.tool_dir.clone(),
            install_command: config.tools.install_command.clone(),
            require_large_files: config.fetch.require_large_files,
            submodule_depth: config.fetch.submodule_depth,
            state_timeout: config.fetch.state_timeout,
            sanitize_env: config.fetch.sanitize_env,
            preserve_prefixes: config.fetch.preserve_prefixes.clone(),
            remediation: config.remediation.clone(),
        }
    }
}

/// A fatal classification raised by one state
struct StateFailure {
    kind: FailureKind,
    reason: String,
}

impl StateFailure {
    fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }
}

type StateResult<T> = std::result::Result<T, StateFailure>;

/// Produces a complete source tree from a repository reference
///
/// Holds no per-fetch state, so one fetcher can serve concurrent fetches into
/// different destinations.
pub struct RepositoryFetcher {
    runner: Arc<dyn ProcessRunner>,
    checkout: Arc<dyn BaseCheckout>,
    sink: Arc<dyn ProgressSink>,
    snapshot: Option<EnvSnapshot>,
    options: FetchOptions,
}

impl std::fmt::Debug for RepositoryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryFetcher")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RepositoryFetcher {
    /// Assemble a fetcher from its collaborators
    pub fn new(
        options: FetchOptions,
        runner: Arc<dyn ProcessRunner>,
        checkout: Arc<dyn BaseCheckout>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            runner,
            checkout,
            sink,
            snapshot: None,
            options,
        }
    }

    /// Fetcher that runs real `git` processes and prints to the console
    pub fn from_config(config: &Config) -> Self {
        let options = FetchOptions::from_config(config);
        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());
        let checkout = Arc::new(GitCheckout::new(runner.clone(), options.git.clone()));
        let sink = Arc::new(ConsoleSink::new(config.fetch.label.as_deref()));
        Self::new(options, runner, checkout, sink)
    }

    /// Replace the progress sink
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Use a fixed parent environment instead of capturing the real one
    pub fn with_snapshot(mut self, snapshot: EnvSnapshot) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Run a fetch to completion
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        info!(
            reference = %request.reference,
            revision = %request.revision,
            destination = %request.destination.display(),
            "Starting fetch"
        );

        let mut progress = FetchProgress::new();
        match self.run_states(request, &mut progress).await {
            Ok(()) => {
                progress.finish();
                self.sink.milestone(&format!(
                    "Source tree ready at {}",
                    request.destination.display()
                ));
                FetchOutcome::Success {
                    path: request.destination.clone(),
                }
            }
            Err(failure) => self.fail(request, progress.current(), failure),
        }
    }

    async fn run_states(
        &self,
        request: &FetchRequest,
        progress: &mut FetchProgress,
    ) -> StateResult<()> {
        let env = self
            .within(progress, FetchState::PrepareEnvironment, async {
                Ok(self.prepare_environment(request))
            })
            .await?;

        let lfs = self
            .within(progress, FetchState::VerifyTool, self.verify_tool(&env))
            .await?;

        self.within(progress, FetchState::BaseCheckout, self.base_checkout(request, &env))
            .await?;

        self.within(
            progress,
            FetchState::MaterializeLargeFiles,
            self.materialize(request, &lfs),
        )
        .await?;

        self.within(progress, FetchState::NormalizeNestedReferences, async {
            self.normalize(request);
            Ok(())
        })
        .await?;

        self.within(
            progress,
            FetchState::InitializeNestedRepositories,
            self.initialize_nested(request, &env),
        )
        .await
    }

    /// Enter `state` and run `work` under the per-state timeout
    async fn within<T>(
        &self,
        progress: &mut FetchProgress,
        state: FetchState,
        work: impl Future<Output = StateResult<T>>,
    ) -> StateResult<T> {
        progress.enter(state);

        let Some(limit) = self.options.state_timeout else {
            return work.await;
        };

        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => Err(StateFailure::new(
                FailureKind::Timeout,
                format!(
                    "The '{}' step did not finish within {}",
                    state,
                    humantime::format_duration(limit)
                ),
            )),
        }
    }

    fn prepare_environment(&self, request: &FetchRequest) -> PreparedEnv {
        let snapshot = self.snapshot.clone().unwrap_or_else(EnvSnapshot::capture);
        let options = EnvOptions {
            tool_dir: self.options.tool_dir.clone(),
            preserve_prefixes: self.options.preserve_prefixes.clone(),
            sanitize: self.options.sanitize_env,
        };
        PreparedEnv::prepare(&snapshot, &request.env, &options)
    }

    async fn verify_tool(&self, env: &PreparedEnv) -> StateResult<LargeFileSync> {
        self.sink.milestone("Checking git-lfs availability...");

        let lfs = LargeFileSync::new(self.runner.clone(), self.options.git.clone(), env.base().clone())
            .with_tool_dir(self.options.tool_dir.clone())
            .with_install_command(self.options.install_command.clone());

        if lfs.ensure_available().await {
            self.sink.milestone("git-lfs found and working");
            return Ok(lfs);
        }

        self.sink.warning("git-lfs not found! Diagnostic info:");
        for line in lfs.diagnostics() {
            self.sink.warning(&line);
        }

        Err(StateFailure::new(
            FailureKind::ToolMissing,
            "Git LFS is required but was not found, or it is installed but does not run.",
        ))
    }

    async fn base_checkout(&self, request: &FetchRequest, env: &PreparedEnv) -> StateResult<()> {
        self.sink.milestone(&format!(
            "Checking out {} from {}",
            request.revision, request.reference
        ));

        self.checkout
            .checkout(request, &env.for_checkout())
            .await
            .map_err(|e| {
                StateFailure::new(
                    FailureKind::CheckoutFailed,
                    format!(
                        "Could not check out {} of {}: {}",
                        request.revision, request.reference, e
                    ),
                )
            })?;

        self.sink.milestone(&format!(
            "Base checkout completed in {}",
            request.destination.display()
        ));
        Ok(())
    }

    async fn materialize(&self, request: &FetchRequest, lfs: &LargeFileSync) -> StateResult<()> {
        self.sink.milestone("Pulling LFS files...");

        let result = lfs.pull(&request.destination).await;
        if result.success() {
            self.sink.milestone("LFS files downloaded");
            return Ok(());
        }

        if request.require_large_files || self.options.require_large_files {
            return Err(StateFailure::new(
                FailureKind::LargeFilePullFailed,
                format!("git lfs pull failed: {}", result.summary()),
            ));
        }

        self.sink.warning(&format!(
            "git lfs pull failed ({}); large files may be left as pointer stubs",
            result.summary()
        ));
        Ok(())
    }

    /// Rewrite SSH submodule URLs; problems here are only warnings
    fn normalize(&self, request: &FetchRequest) {
        let path = request.destination.join(GITMODULES_FILE);
        if !path.exists() {
            self.sink
                .milestone("No .gitmodules file found - no submodules to convert");
            return;
        }

        self.sink.milestone("Converting SSH submodule URLs to HTTPS...");
        match ConfigRewriter::new().rewrite(&path) {
            Ok(report) => {
                for entry in &report.entries {
                    self.sink.milestone(&format!("Found: url = {}", entry.url));
                }
                if report.changed {
                    self.sink.milestone("Converted SSH URLs to HTTPS:");
                    for change in &report.changes {
                        self.sink.milestone(&format!("  {}", change.original.trim()));
                        self.sink.milestone(&format!("  => {}", change.rewritten.trim()));
                    }
                } else {
                    self.sink.milestone(
                        "No SSH URLs found in .gitmodules (already HTTPS or no submodules)",
                    );
                }
            }
            Err(e) => {
                self.sink.warning(&format!("[{}] {}", FailureKind::ConfigRewriteFailed, e));
                self.sink
                    .warning("Submodule cloning may fail if SSH keys aren't configured");
            }
        }
    }

    async fn initialize_nested(&self, request: &FetchRequest, env: &PreparedEnv) -> StateResult<()> {
        if !request.destination.join(GITMODULES_FILE).exists() {
            return Ok(());
        }

        self.sink.milestone("Initializing submodules...");
        let init = SubmoduleInit {
            runner: self.runner.as_ref(),
            git: &self.options.git,
            env: env.base(),
            repository: &request.destination,
            depth: self.options.submodule_depth,
        };

        match init.run().await {
            Ok(report) => {
                if let Some(sync) = report.sync_failure {
                    self.sink
                        .warning(&format!("git submodule sync failed: {}", sync));
                }
                if let Some(shallow) = report.shallow_fallback {
                    self.sink.warning(&format!(
                        "Shallow submodule initialization failed ({}); fetched full history instead",
                        shallow
                    ));
                }
                self.sink.milestone("Submodules initialized");
                Ok(())
            }
            Err(summary) => Err(StateFailure::new(
                FailureKind::SubmoduleInitFailed,
                format!("git submodule update failed: {}", summary),
            )),
        }
    }

    fn fail(
        &self,
        request: &FetchRequest,
        state: Option<FetchState>,
        failure: StateFailure,
    ) -> FetchOutcome {
        let steps = remediation(failure.kind, request, &self.options.remediation);
        let detail = failure_detail(&failure.reason, &steps);

        error!(
            kind = %failure.kind,
            state = ?state,
            reason = %failure.reason,
            "Fetch failed"
        );
        self.sink.fatal(&fatal_block(failure.kind, &detail));

        FetchOutcome::Failure {
            kind: failure.kind,
            detail,
        }
    }
}
