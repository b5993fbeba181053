//! Fetch inputs and outcomes

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// What to fetch and where to put it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    /// Repository URL or local path
    pub reference: String,
    /// Branch, tag or commit to check out
    pub revision: String,
    /// Directory that receives the working tree
    pub destination: PathBuf,
    /// Variables set for every subprocess; these always win
    pub env: BTreeMap<String, String>,
    /// Treat a failed LFS pull as fatal
    pub require_large_files: bool,
    /// Commit id HEAD must match after checkout (full or abbreviated)
    pub expected_commit: Option<String>,
}

impl FetchRequest {
    pub fn new(
        reference: impl Into<String>,
        revision: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reference: reference.into(),
            revision: revision.into(),
            destination: destination.into(),
            env: BTreeMap::new(),
            require_large_files: false,
            expected_commit: None,
        }
    }

    /// Add a subprocess environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Make LFS materialization mandatory
    pub fn require_large_files(mut self, required: bool) -> Self {
        self.require_large_files = required;
        self
    }

    /// Pin the commit the revision must resolve to
    pub fn expect_commit(mut self, commit: impl Into<String>) -> Self {
        self.expected_commit = Some(commit.into());
        self
    }
}

/// Classification of a failed or degraded fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// git-lfs is absent or does not run
    ToolMissing,
    /// Base clone/checkout did not complete
    CheckoutFailed,
    /// `git lfs pull` failed while LFS content was mandatory
    LargeFilePullFailed,
    /// `.gitmodules` could not be processed; only ever a warning
    ConfigRewriteFailed,
    /// Submodules could not be initialized
    SubmoduleInitFailed,
    /// A state ran longer than the configured limit
    Timeout,
}

impl FailureKind {
    /// Upper-case heading for the fatal block
    pub fn heading(&self) -> &'static str {
        match self {
            Self::ToolMissing => "FETCH REQUIRES GIT LFS",
            Self::CheckoutFailed => "REPOSITORY CHECKOUT FAILED",
            Self::LargeFilePullFailed => "GIT LFS CONTENT COULD NOT BE DOWNLOADED",
            Self::ConfigRewriteFailed => "SUBMODULE CONFIGURATION COULD NOT BE REWRITTEN",
            Self::SubmoduleInitFailed => "SUBMODULE INITIALIZATION FAILED",
            Self::Timeout => "FETCH TIMED OUT",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ToolMissing => "ToolMissing",
            Self::CheckoutFailed => "CheckoutFailed",
            Self::LargeFilePullFailed => "LargeFilePullFailed",
            Self::ConfigRewriteFailed => "ConfigRewriteFailed",
            Self::SubmoduleInitFailed => "SubmoduleInitFailed",
            Self::Timeout => "Timeout",
        };
        f.write_str(name)
    }
}

/// Terminal result of a fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The destination holds a complete source tree
    Success {
        /// Materialized directory
        path: PathBuf,
    },
    /// The fetch stopped at a fatal classification
    Failure {
        /// What went wrong
        kind: FailureKind,
        /// Reason and remediation, meant to be shown verbatim
        detail: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure kind, if the fetch failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Process exit code an installer should use
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = FetchRequest::new("https://example.com/org/repo.git", "v1.0.0", "/tmp/work")
            .with_env("HOME", "/home/builder")
            .require_large_files(true)
            .expect_commit("37b11b1e");

        assert_eq!(request.destination, PathBuf::from("/tmp/work"));
        assert_eq!(request.env.get("HOME").map(String::as_str), Some("/home/builder"));
        assert!(request.require_large_files);
        assert_eq!(request.expected_commit.as_deref(), Some("37b11b1e"));
    }

    #[test]
    fn test_outcome_json() {
        let success = FetchOutcome::Success {
            path: PathBuf::from("/tmp/work"),
        };
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            serde_json::json!({"status": "success", "path": "/tmp/work"})
        );

        let failure = FetchOutcome::Failure {
            kind: FailureKind::ToolMissing,
            detail: "install git-lfs".to_string(),
        };
        assert_eq!(failure.exit_code(), 1);
        assert_eq!(failure.failure_kind(), Some(FailureKind::ToolMissing));
        assert_eq!(
            serde_json::to_value(&failure).unwrap(),
            serde_json::json!({"status": "failure", "kind": "tool_missing", "detail": "install git-lfs"})
        );
    }
}
