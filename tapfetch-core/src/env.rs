//! Scoped subprocess environments
//!
//! The fetcher never edits the global process environment. Instead a snapshot
//! of the parent environment is taken once and an [`EnvOverlay`] is built from
//! it and handed to every subprocess.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Home directory variable, always carried over
pub const HOME_VAR: &str = "HOME";
/// User identity variable, always carried over
pub const USER_VAR: &str = "USER";
/// Search path variable
pub const PATH_VAR: &str = "PATH";
/// Disables LFS content download during checkout
pub const SKIP_SMUDGE_VAR: &str = "GIT_LFS_SKIP_SMUDGE";
/// Stops git from prompting for credentials on a terminal
pub const TERMINAL_PROMPT_VAR: &str = "GIT_TERMINAL_PROMPT";

/// Environment variables applied on top of (or instead of) the inherited environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
    sanitized: bool,
}

impl EnvOverlay {
    /// Create an empty overlay that extends the inherited environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the overlay as the complete environment of the child
    pub fn sanitized(mut self) -> Self {
        self.sanitized = true;
        self
    }

    /// Whether the child starts from an empty environment
    pub fn is_sanitized(&self) -> bool {
        self.sanitized
    }

    /// Builder-style variant of [`EnvOverlay::set`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Set a variable only if it is not already present
    pub fn set_default(&mut self, key: &str, value: &str) {
        if !self.vars.contains_key(key) {
            self.vars.insert(key.to_string(), value.to_string());
        }
    }

    /// Get a variable's value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Check whether a variable is set
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Iterate over variables in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables in the overlay
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the overlay is empty
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Apply this overlay to a command about to be spawned
    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        if self.sanitized {
            cmd.env_clear();
        }
        cmd.envs(self.iter());
    }
}

/// Read-only copy of the parent environment taken before a fetch starts
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Look up a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Inputs to environment preparation
#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    /// Directory that must be searched first
    pub tool_dir: Option<PathBuf>,
    /// Name prefixes of parent variables to carry over
    pub preserve_prefixes: Vec<String>,
    /// Start children from an empty environment
    pub sanitize: bool,
}

/// Environments for every subprocess of one fetch
#[derive(Debug, Clone)]
pub struct PreparedEnv {
    base: EnvOverlay,
}

impl PreparedEnv {
    /// Build the overlay from the parent snapshot and the caller's variables
    ///
    /// Caller-supplied values always win. Internal defaults are only added
    /// for variables neither the caller nor the parent environment set.
    pub fn prepare(
        snapshot: &EnvSnapshot,
        caller: &BTreeMap<String, String>,
        options: &EnvOptions,
    ) -> Self {
        let mut base = EnvOverlay::new();
        if options.sanitize {
            base = base.sanitized();
        }

        for (key, value) in &snapshot.vars {
            if is_preserved(key, &options.preserve_prefixes) {
                base.set(key.clone(), value.clone());
            }
        }

        for (key, value) in caller {
            base.set(key.clone(), value.clone());
        }

        base.set_default(TERMINAL_PROMPT_VAR, "0");

        let inherited_path = caller
            .get(PATH_VAR)
            .map(String::as_str)
            .or_else(|| snapshot.get(PATH_VAR));

        if let Some(path) = search_path(inherited_path, options.tool_dir.as_deref()) {
            base.set(PATH_VAR, path);
        }

        debug!(
            vars = base.len(),
            sanitized = base.is_sanitized(),
            path = ?base.get(PATH_VAR),
            "Prepared subprocess environment"
        );

        Self { base }
    }

    /// Environment for tool probes, LFS pulls and submodule initialization
    pub fn base(&self) -> &EnvOverlay {
        &self.base
    }

    /// Environment for the base checkout
    ///
    /// LFS content is not downloaded during checkout; it is pulled in a
    /// separate step afterwards.
    pub fn for_checkout(&self) -> EnvOverlay {
        let mut overlay = self.base.clone();
        overlay.set_default(SKIP_SMUDGE_VAR, "1");
        overlay
    }
}

fn is_preserved(key: &str, prefixes: &[String]) -> bool {
    key == HOME_VAR || key == USER_VAR || prefixes.iter().any(|p| key.starts_with(p.as_str()))
}

/// Put `tool_dir` first on the search path, removing any later duplicate
fn search_path(inherited: Option<&str>, tool_dir: Option<&Path>) -> Option<String> {
    let Some(tool_dir) = tool_dir else {
        return inherited.map(str::to_string);
    };

    let mut entries: Vec<PathBuf> = vec![tool_dir.to_path_buf()];
    if let Some(path) = inherited {
        entries.extend(std::env::split_paths(path).filter(|p| p.as_path() != tool_dir));
    }

    match std::env::join_paths(&entries) {
        Ok(joined) => joined.into_string().ok().or_else(|| inherited.map(str::to_string)),
        Err(e) => {
            warn!(tool_dir = %tool_dir.display(), error = %e, "Cannot prepend tool directory to PATH");
            inherited.map(str::to_string)
        }
    }
}

/// Locate an executable by name on a search path
pub fn find_on_path(name: &str, path: Option<&str>) -> Option<PathBuf> {
    let path: OsString = path?.into();
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
