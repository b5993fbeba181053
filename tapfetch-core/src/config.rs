//! Configuration management for tapfetch
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (TAPFETCH_*)
//! 3. Config file (~/.config/tapfetch/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use humantime_serde::re::humantime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// External tool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path to the git executable
    pub git: String,

    /// Directory searched first for git and git-lfs
    pub tool_dir: Option<PathBuf>,

    /// Command used to install git-lfs when it is missing (empty disables)
    pub install_command: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            tool_dir: None,
            install_command: Vec::new(),
        }
    }
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Treat a failed `git lfs pull` as fatal
    pub require_large_files: bool,

    /// History depth for submodule initialization (0 = full history)
    pub submodule_depth: u32,

    /// Wall-clock limit applied to each fetch state
    #[serde(with = "humantime_serde")]
    pub state_timeout: Option<Duration>,

    /// Start subprocesses from an empty environment plus the overlay
    pub sanitize_env: bool,

    /// Variable name prefixes carried over from the parent environment
    pub preserve_prefixes: Vec<String>,

    /// Prefix shown on progress lines, e.g. the package being installed
    pub label: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            require_large_files: false,
            submodule_depth: 1,
            state_timeout: None,
            sanitize_env: false,
            preserve_prefixes: vec!["GIT_".to_string()],
            label: None,
        }
    }
}

/// Text shown to the user when a fetch fails
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Steps for installing the large-file helper
    pub install_steps: Vec<String>,

    /// Command the user should run to retry
    pub retry_command: Option<String>,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            install_steps: vec![
                "brew install git-lfs".to_string(),
                "git lfs install".to_string(),
            ],
            retry_command: None,
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Tool configuration
    pub tools: ToolsConfig,

    /// Fetch configuration
    pub fetch: FetchSettings,

    /// Remediation hints
    pub remediation: RemediationConfig,
}

/// Overrides supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub git: Option<String>,
    pub tool_dir: Option<PathBuf>,
    pub require_large_files: bool,
    pub label: Option<String>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/tapfetch/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tapfetch").join("config.toml"))
    }

    /// Apply environment variable overrides from the process environment
    ///
    /// Supported variables:
    /// - TAPFETCH_GIT: Path to git executable
    /// - TAPFETCH_TOOL_DIR: Directory searched first for tools
    /// - TAPFETCH_REQUIRE_LFS: `1` or `true` makes `git lfs pull` failures fatal
    /// - TAPFETCH_STATE_TIMEOUT: Per-state timeout, e.g. `10m`
    /// - HOMEBREW_PREFIX: `$HOMEBREW_PREFIX/bin` is used when no tool dir is set
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides using a custom variable lookup
    pub fn with_env_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(git) = lookup("TAPFETCH_GIT") {
            self.tools.git = git;
        }

        if let Some(dir) = lookup("TAPFETCH_TOOL_DIR") {
            self.tools.tool_dir = Some(PathBuf::from(dir));
        }

        if let Some(flag) = lookup("TAPFETCH_REQUIRE_LFS") {
            self.fetch.require_large_files = matches!(flag.trim(), "1" | "true" | "yes");
        }

        if let Some(timeout) = lookup("TAPFETCH_STATE_TIMEOUT") {
            let duration = humantime::parse_duration(timeout.trim()).map_err(|e| {
                Error::Config(format!("Invalid TAPFETCH_STATE_TIMEOUT '{}': {}", timeout, e))
            })?;
            self.fetch.state_timeout = Some(duration);
        }

        if self.tools.tool_dir.is_none() {
            if let Some(prefix) = lookup("HOMEBREW_PREFIX").filter(|p| !p.is_empty()) {
                self.tools.tool_dir = Some(PathBuf::from(prefix).join("bin"));
            }
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(git) = overrides.git {
            self.tools.git = git;
        }

        if let Some(dir) = overrides.tool_dir {
            self.tools.tool_dir = Some(dir);
        }

        if overrides.require_large_files {
            self.fetch.require_large_files = true;
        }

        if let Some(label) = overrides.label {
            self.fetch.label = Some(label);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(overrides: CliOverrides) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()?
            .with_cli_overrides(overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tools.git, "git");
        assert!(config.tools.tool_dir.is_none());
        assert!(config.tools.install_command.is_empty());
        assert!(!config.fetch.require_large_files);
        assert_eq!(config.fetch.submodule_depth, 1);
        assert_eq!(config.fetch.preserve_prefixes, vec!["GIT_".to_string()]);
    }

    #[test]
    fn test_cli_overrides() {
        let config = Config::default().with_cli_overrides(CliOverrides {
            git: Some("/opt/git/bin/git".to_string()),
            tool_dir: Some(PathBuf::from("/opt/tools")),
            require_large_files: true,
            label: Some("knoodle".to_string()),
        });

        assert_eq!(config.tools.git, "/opt/git/bin/git");
        assert_eq!(config.tools.tool_dir, Some(PathBuf::from("/opt/tools")));
        assert!(config.fetch.require_large_files);
        assert_eq!(config.fetch.label.as_deref(), Some("knoodle"));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default()
            .with_env_lookup(lookup_from(&[
                ("TAPFETCH_GIT", "/usr/local/bin/git"),
                ("TAPFETCH_REQUIRE_LFS", "true"),
                ("TAPFETCH_STATE_TIMEOUT", "90s"),
            ]))
            .unwrap();

        assert_eq!(config.tools.git, "/usr/local/bin/git");
        assert!(config.fetch.require_large_files);
        assert_eq!(config.fetch.state_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_homebrew_prefix_supplies_tool_dir() {
        let config = Config::default()
            .with_env_lookup(lookup_from(&[("HOMEBREW_PREFIX", "/opt/homebrew")]))
            .unwrap();
        assert_eq!(config.tools.tool_dir, Some(PathBuf::from("/opt/homebrew/bin")));

        let explicit = Config::default()
            .with_env_lookup(lookup_from(&[
                ("HOMEBREW_PREFIX", "/opt/homebrew"),
                ("TAPFETCH_TOOL_DIR", "/custom/bin"),
            ]))
            .unwrap();
        assert_eq!(explicit.tools.tool_dir, Some(PathBuf::from("/custom/bin")));
    }

    #[test]
    fn test_invalid_timeout_env() {
        let result = Config::default()
            .with_env_lookup(lookup_from(&[("TAPFETCH_STATE_TIMEOUT", "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[tools]
git = "/usr/bin/git"
tool_dir = "/opt/homebrew/bin"
install_command = ["brew", "install", "git-lfs"]

[fetch]
require_large_files = true
submodule_depth = 0
state_timeout = "10m"
label = "knoodle"

[remediation]
retry_command = "brew install knoodle"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.tools.git, "/usr/bin/git");
        assert_eq!(config.tools.install_command, vec!["brew", "install", "git-lfs"]);
        assert!(config.fetch.require_large_files);
        assert_eq!(config.fetch.submodule_depth, 0);
        assert_eq!(config.fetch.state_timeout, Some(Duration::from_secs(600)));
        assert_eq!(
            config.remediation.retry_command.as_deref(),
            Some("brew install knoodle")
        );
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[fetch]
sanitize_env = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        // everything else falls back to defaults
        assert!(config.fetch.sanitize_env);
        assert_eq!(config.tools.git, "git");
        assert_eq!(config.fetch.submodule_depth, 1);
        assert!(config.fetch.state_timeout.is_none());
        assert_eq!(config.remediation.install_steps.len(), 2);
    }
}
