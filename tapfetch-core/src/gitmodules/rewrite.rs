//! Rewriting SSH submodule URLs to HTTPS

use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::parse::{classify_url, https_equivalent, section_name, url_assignment, SubmoduleUrlEntry};
use crate::{Error, Result};

/// A single rewritten line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlChange {
    /// 1-based line number
    pub line: usize,
    /// Line before the rewrite, without line ending
    pub original: String,
    /// Line after the rewrite, without line ending
    pub rewritten: String,
}

/// Result of rewriting one `.gitmodules` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    /// Whether the content differs from the input
    pub changed: bool,
    /// Every `url` assignment, in file order
    pub entries: Vec<SubmoduleUrlEntry>,
    /// Lines that were rewritten
    pub changes: Vec<UrlChange>,
}

/// Rewrite `.gitmodules` text, returning the new text and what changed
///
/// Only `url` values are touched; every other byte, including line endings,
/// is passed through unchanged.
pub fn rewrite_content(content: &str) -> (String, RewriteReport) {
    let mut output = String::with_capacity(content.len());
    let mut report = RewriteReport::default();
    let mut current_section: Option<String> = None;

    for (index, raw) in content.split_inclusive('\n').enumerate() {
        let line_number = index + 1;
        let (line, ending) = split_line_ending(raw);

        if let Some(name) = section_name(line) {
            current_section = name;
            output.push_str(raw);
            continue;
        }

        let Some(assignment) = url_assignment(line) else {
            output.push_str(raw);
            continue;
        };

        let rewritten = https_equivalent(assignment.value);
        report.entries.push(SubmoduleUrlEntry {
            name: current_section.clone(),
            url: assignment.value.to_string(),
            scheme: classify_url(assignment.value),
            rewritten: rewritten.clone(),
            line: line_number,
        });

        match rewritten {
            Some(https) => {
                let new_line = format!("{}{}{}", assignment.head, https, assignment.tail);
                output.push_str(&new_line);
                output.push_str(ending);
                report.changes.push(UrlChange {
                    line: line_number,
                    original: line.to_string(),
                    rewritten: new_line,
                });
            }
            None => output.push_str(raw),
        }
    }

    report.changed = output != content;
    (output, report)
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}

/// Rewrites `.gitmodules` files on disk
#[derive(Debug, Clone, Default)]
pub struct ConfigRewriter {
    dry_run: bool,
}

impl ConfigRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report what would change without writing
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Rewrite the file at `path`
    ///
    /// A missing file is not an error: it means there are no submodules, and
    /// an unchanged empty report is returned. The file is only written when
    /// its content actually changes.
    pub fn rewrite(&self, path: &Path) -> Result<RewriteReport> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "No submodule file found, nothing to rewrite");
                return Ok(RewriteReport::default());
            }
            Err(e) => {
                return Err(Error::GitModules {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        let (rewritten, report) = rewrite_content(&content);

        for entry in &report.entries {
            debug!(name = ?entry.name, url = %entry.url, scheme = ?entry.scheme, "Submodule URL");
        }

        if report.changed && !self.dry_run {
            std::fs::write(path, rewritten).map_err(|e| Error::GitModules {
                path: path.to_path_buf(),
                reason: format!("write failed: {}", e),
            })?;
            debug!(path = %path.display(), changes = report.changes.len(), "Rewrote submodule URLs");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gitmodules::UrlScheme;

    const MIXED: &str = "[submodule \"Tensors\"]\n\
        \tpath = submodules/Tensors\n\
        \turl = git@github.com:HenrikSchumacher/Tensors.git\n\
        [submodule \"Min-Cut\"]\n\
        \tpath = submodules/Min-Cut\n\
        \turl = https://github.com/HenrikSchumacher/Min-Cut.git\n";

    #[test]
    fn test_no_url_assignments_unchanged() {
        for input in ["", "\n", "[core]\n\tbare = false\n", "# comment only"] {
            let (output, report) = rewrite_content(input);
            assert!(!report.changed);
            assert!(report.entries.is_empty());
            assert_eq!(output, input);
        }
    }

    #[test]
    fn test_mixed_only_ssh_line_changes() {
        let (output, report) = rewrite_content(MIXED);

        assert!(report.changed);
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].name.as_deref(), Some("Tensors"));
        assert_eq!(report.entries[0].scheme, UrlScheme::SshShorthand);
        assert_eq!(report.entries[1].name.as_deref(), Some("Min-Cut"));
        assert_eq!(report.entries[1].scheme, UrlScheme::Https);

        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].line, 3);
        assert_eq!(
            report.changes[0].rewritten,
            "\turl = https://github.com/HenrikSchumacher/Tensors"
        );

        let before: Vec<&str> = MIXED.lines().collect();
        let after: Vec<&str> = output.lines().collect();
        assert_eq!(before.len(), after.len());
        for (i, (b, a)) in before.iter().zip(&after).enumerate() {
            if i == 2 {
                assert_ne!(b, a);
            } else {
                assert_eq!(b, a);
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let (once, _) = rewrite_content(MIXED);
        let (twice, report) = rewrite_content(&once);
        assert_eq!(once, twice);
        assert!(!report.changed);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_crlf_and_comments_preserved() {
        let input = "[submodule \"a\"]\r\n  url = ssh://git@host.org/o/a.git # primary\r\n";
        let (output, report) = rewrite_content(input);
        assert_eq!(
            output,
            "[submodule \"a\"]\r\n  url = https://host.org/o/a # primary\r\n"
        );
        assert_eq!(report.changes.len(), 1);
    }

    #[test]
    fn test_missing_trailing_newline() {
        let (output, _) = rewrite_content("url = git@host:o/r");
        assert_eq!(output, "url = https://host/o/r");
    }

    #[test]
    fn test_rewrite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gitmodules");
        std::fs::write(&path, MIXED).unwrap();

        let report = ConfigRewriter::new().rewrite(&path).unwrap();
        assert!(report.changed);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\turl = https://github.com/HenrikSchumacher/Tensors\n"));
        assert!(written.contains("\turl = https://github.com/HenrikSchumacher/Min-Cut.git\n"));

        let again = ConfigRewriter::new().rewrite(&path).unwrap();
        assert!(!again.changed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn test_dry_run_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gitmodules");
        std::fs::write(&path, MIXED).unwrap();

        let report = ConfigRewriter::new().dry_run(true).rewrite(&path).unwrap();
        assert!(report.changed);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), MIXED);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let report = ConfigRewriter::new()
            .rewrite(&dir.path().join(".gitmodules"))
            .unwrap();
        assert!(!report.changed);
        assert!(report.entries.is_empty());
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gitmodules");
        std::fs::write(&path, [0xff, 0xfe, b'u', b'r', b'l']).unwrap();

        let result = ConfigRewriter::new().rewrite(&path);
        assert!(matches!(result, Err(Error::GitModules { .. })));
    }
}
