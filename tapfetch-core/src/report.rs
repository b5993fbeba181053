//! User-facing progress output and failure rendering

use crate::config::RemediationConfig;
use crate::fetch::{FailureKind, FetchRequest};
use crate::gitmodules::GITMODULES_FILE;

const RULE: &str = "================================================================";

/// Receives progress from a running fetch
pub trait ProgressSink: Send + Sync {
    /// A normal milestone
    fn milestone(&self, message: &str);

    /// A recoverable problem
    fn warning(&self, message: &str);

    /// A terminal failure, already rendered as a delimited block
    fn fatal(&self, block: &str);
}

/// Writes milestones to stdout and warnings and failures to stderr
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink {
    prefix: String,
    stderr_only: bool,
}

impl ConsoleSink {
    /// Create a sink; `label` is shown in brackets before each line
    pub fn new(label: Option<&str>) -> Self {
        Self {
            prefix: label.map(|l| format!("[{}] ", l)).unwrap_or_default(),
            stderr_only: false,
        }
    }

    /// Send milestones to stderr too, leaving stdout for machine output
    pub fn stderr_only(mut self, stderr_only: bool) -> Self {
        self.stderr_only = stderr_only;
        self
    }
}

impl ProgressSink for ConsoleSink {
    fn milestone(&self, message: &str) {
        tracing::debug!(message, "milestone");
        if self.stderr_only {
            eprintln!("==> {}{}", self.prefix, message);
        } else {
            println!("==> {}{}", self.prefix, message);
        }
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
        eprintln!("Warning: {}{}", self.prefix, message);
    }

    fn fatal(&self, block: &str) {
        eprintln!("{}", block);
    }
}

/// Steps the user can take to recover from `kind`
pub fn remediation(
    kind: FailureKind,
    request: &FetchRequest,
    hints: &RemediationConfig,
) -> Vec<String> {
    let dest = request.destination.display();
    let mut steps = match kind {
        FailureKind::ToolMissing => {
            let mut steps = vec!["Git LFS is required. Install it first:".to_string()];
            steps.extend(hints.install_steps.iter().map(|s| format!("  {}", s)));
            steps
        }
        FailureKind::CheckoutFailed => vec![
            "Verify the repository reference, the revision and network connectivity:".to_string(),
            format!("  git ls-remote {} {}", request.reference, request.revision),
        ],
        FailureKind::LargeFilePullFailed => vec![
            "Retry the large-file download by hand:".to_string(),
            format!("  cd {} && git lfs pull", dest),
        ],
        FailureKind::ConfigRewriteFailed => vec![format!(
            "Check that {}/{} is readable and well-formed",
            dest, GITMODULES_FILE
        )],
        FailureKind::SubmoduleInitFailed => vec![
            format!(
                "Check that every url in {}/{} is reachable over HTTPS, then run:",
                dest, GITMODULES_FILE
            ),
            format!("  cd {} && git submodule update --init --recursive", dest),
        ],
        FailureKind::Timeout => vec![
            "Check network connectivity, or raise fetch.state_timeout in the config file".to_string(),
        ],
    };

    steps.push(String::new());
    steps.push("Then retry:".to_string());
    steps.push(format!(
        "  {}",
        hints.retry_command.as_deref().unwrap_or("re-run the same fetch")
    ));
    steps
}

/// Failure detail handed back to the caller: the reason plus remediation
pub fn failure_detail(reason: &str, steps: &[String]) -> String {
    let mut detail = reason.trim_end().to_string();
    if !steps.is_empty() {
        detail.push_str("\n\n");
        detail.push_str(&steps.join("\n"));
    }
    detail
}

/// Border a failure detail with rule lines and a heading
pub fn fatal_block(kind: FailureKind, detail: &str) -> String {
    format!(
        "\n{rule}\n{heading}\n{rule}\n\n{detail}\n\n{rule}\n",
        rule = RULE,
        heading = kind.heading(),
        detail = detail
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FetchRequest {
        FetchRequest::new("https://example.com/org/repo.git", "v1.0.0", "/tmp/work")
    }

    #[test]
    fn test_tool_missing_remediation() {
        let hints = RemediationConfig {
            install_steps: vec!["brew install git-lfs".into(), "git lfs install".into()],
            retry_command: Some("brew install knoodle".into()),
        };
        let steps = remediation(FailureKind::ToolMissing, &request(), &hints);

        assert!(steps.contains(&"  brew install git-lfs".to_string()));
        assert!(steps.contains(&"  git lfs install".to_string()));
        assert_eq!(steps.last().map(String::as_str), Some("  brew install knoodle"));
    }

    #[test]
    fn test_checkout_remediation_names_reference() {
        let steps = remediation(FailureKind::CheckoutFailed, &request(), &RemediationConfig::default());
        assert!(steps.contains(&"  git ls-remote https://example.com/org/repo.git v1.0.0".to_string()));
        assert_eq!(steps.last().map(String::as_str), Some("  re-run the same fetch"));
    }

    #[test]
    fn test_fatal_block_is_delimited() {
        let detail = failure_detail("git-lfs was not found", &["  brew install git-lfs".to_string()]);
        let block = fatal_block(FailureKind::ToolMissing, &detail);

        assert_eq!(block.matches(RULE).count(), 3);
        assert!(block.contains(FailureKind::ToolMissing.heading()));
        assert!(block.contains("git-lfs was not found\n\n  brew install git-lfs"));
    }
}
