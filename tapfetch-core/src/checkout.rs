//! Base clone/checkout of the requested revision

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use git2::Repository;
use thiserror::Error;
use tracing::debug;

use crate::env::EnvOverlay;
use crate::fetch::FetchRequest;
use crate::process::{ExecutionResult, Invocation, OutputMode, ProcessRunner};

/// Why the base checkout did not complete
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CheckoutError(pub String);

/// Produces a working tree at the requested revision
///
/// The fetcher only depends on this trait, so any version-control binding
/// can be plugged in.
#[async_trait]
pub trait BaseCheckout: Send + Sync {
    /// Populate `request.destination` with a checkout of `request.revision`
    async fn checkout(
        &self,
        request: &FetchRequest,
        env: &EnvOverlay,
    ) -> std::result::Result<(), CheckoutError>;
}

/// What is currently at the destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    /// Nothing exists yet
    Missing,
    /// An empty directory
    Empty,
    /// An existing git working tree, reused in place
    Repository,
    /// Something else that must not be overwritten
    Occupied,
}

impl DestinationState {
    /// Inspect `path`
    pub fn inspect(path: &Path) -> Self {
        if !path.exists() {
            return Self::Missing;
        }
        if path.is_dir() {
            let empty = std::fs::read_dir(path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty {
                return Self::Empty;
            }
            if Repository::open(path).is_ok() {
                return Self::Repository;
            }
        }
        Self::Occupied
    }
}

/// Commit id of HEAD in the repository at `path`
pub fn head_commit(path: &Path) -> std::result::Result<String, git2::Error> {
    let repo = Repository::open(path)?;
    let commit = repo.head()?.peel_to_commit()?;
    Ok(commit.id().to_string())
}

/// Check that HEAD matches `expected` (full or abbreviated id)
pub fn verify_commit(path: &Path, expected: &str) -> std::result::Result<(), CheckoutError> {
    let actual = head_commit(path)
        .map_err(|e| CheckoutError(format!("cannot read HEAD of {}: {}", path.display(), e.message())))?;

    let expected = expected.trim().to_ascii_lowercase();
    if expected.is_empty() || !actual.starts_with(&expected) {
        return Err(CheckoutError(format!(
            "checked out commit {} but {} was expected",
            actual, expected
        )));
    }
    Ok(())
}

/// [`BaseCheckout`] that drives the `git` command line
pub struct GitCheckout {
    runner: Arc<dyn ProcessRunner>,
    git: String,
}

impl std::fmt::Debug for GitCheckout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCheckout")
            .field("git", &self.git)
            .finish_non_exhaustive()
    }
}

impl GitCheckout {
    pub fn new(runner: Arc<dyn ProcessRunner>, git: impl Into<String>) -> Self {
        Self {
            runner,
            git: git.into(),
        }
    }

    fn git(&self, env: &EnvOverlay) -> Invocation {
        Invocation::new(&self.git).env(env.clone())
    }

    async fn run_step(&self, what: &str, invocation: Invocation) -> std::result::Result<(), CheckoutError> {
        let result = self.runner.run(&invocation).await;
        check(what, &result)
    }

    /// Turn a branch name into its remote-tracking ref when one exists
    async fn resolve_target(&self, dest: &Path, revision: &str, env: &EnvOverlay) -> String {
        let remote_ref = format!("refs/remotes/origin/{}", revision);
        let probe = self
            .git(env)
            .args(["rev-parse", "--verify", "--quiet", remote_ref.as_str()])
            .current_dir(dest)
            .output(OutputMode::Null);

        if self.runner.run(&probe).await.success() {
            format!("origin/{}", revision)
        } else {
            revision.to_string()
        }
    }
}

fn check(what: &str, result: &ExecutionResult) -> std::result::Result<(), CheckoutError> {
    if result.success() {
        Ok(())
    } else {
        Err(CheckoutError(format!("{} failed: {}", what, result.summary())))
    }
}

#[async_trait]
impl BaseCheckout for GitCheckout {
    async fn checkout(
        &self,
        request: &FetchRequest,
        env: &EnvOverlay,
    ) -> std::result::Result<(), CheckoutError> {
        let dest = request.destination.as_path();
        let state = DestinationState::inspect(dest);
        debug!(dest = %dest.display(), ?state, "Destination state");

        match state {
            DestinationState::Missing | DestinationState::Empty => {
                self.run_step(
                    "git clone",
                    self.git(env)
                        .args(["clone", "--no-checkout"])
                        .arg(&request.reference)
                        .arg(dest)
                        .output(OutputMode::Inherit),
                )
                .await?;
            }
            DestinationState::Repository => {
                self.run_step(
                    "git remote set-url",
                    self.git(env)
                        .args(["remote", "set-url", "origin"])
                        .arg(&request.reference)
                        .current_dir(dest),
                )
                .await?;
                self.run_step(
                    "git fetch",
                    self.git(env)
                        .args(["fetch", "--tags", "--force", "--prune", "origin"])
                        .current_dir(dest)
                        .output(OutputMode::Inherit),
                )
                .await?;
            }
            DestinationState::Occupied => {
                return Err(CheckoutError(format!(
                    "destination {} exists and is not a git checkout; remove it or choose an empty directory",
                    dest.display()
                )));
            }
        }

        let target = self.resolve_target(dest, &request.revision, env).await;
        self.run_step(
            &format!("git checkout {}", target),
            self.git(env)
                .args(["checkout", "--force", "--detach"])
                .arg(&target)
                .current_dir(dest)
                .output(OutputMode::Inherit),
        )
        .await?;

        if let Some(ref expected) = request.expected_commit {
            verify_commit(dest, expected)?;
        }

        Ok(())
    }
}
