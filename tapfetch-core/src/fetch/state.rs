//! Fetch state sequence

use std::fmt;

/// The states of a fetch, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FetchState {
    PrepareEnvironment,
    VerifyTool,
    BaseCheckout,
    MaterializeLargeFiles,
    NormalizeNestedReferences,
    InitializeNestedRepositories,
}

impl FetchState {
    /// Every state in order
    pub const ALL: [FetchState; 6] = [
        Self::PrepareEnvironment,
        Self::VerifyTool,
        Self::BaseCheckout,
        Self::MaterializeLargeFiles,
        Self::NormalizeNestedReferences,
        Self::InitializeNestedRepositories,
    ];

    /// The state that follows this one
    pub fn next(&self) -> Option<Self> {
        let index = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrepareEnvironment => "prepare environment",
            Self::VerifyTool => "verify git-lfs",
            Self::BaseCheckout => "base checkout",
            Self::MaterializeLargeFiles => "materialize LFS content",
            Self::NormalizeNestedReferences => "normalize submodule URLs",
            Self::InitializeNestedRepositories => "initialize submodules",
        }
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tracks which states a fetch has entered
///
/// States may only be entered in the order of [`FetchState::ALL`].
#[derive(Debug, Clone, Default)]
pub struct FetchProgress {
    current: Option<FetchState>,
    completed: Vec<FetchState>,
}

impl FetchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state currently running
    pub fn current(&self) -> Option<FetchState> {
        self.current
    }

    /// States that ran to completion
    pub fn completed(&self) -> &[FetchState] {
        &self.completed
    }

    /// Whether `state` is the valid next state
    pub fn can_enter(&self, state: FetchState) -> bool {
        match self.current {
            None => state == FetchState::PrepareEnvironment,
            Some(current) => current.next() == Some(state),
        }
    }

    /// Move to `state`, marking the current one completed
    ///
    /// Returns false and stays put if `state` is out of order.
    pub fn enter(&mut self, state: FetchState) -> bool {
        if !self.can_enter(state) {
            tracing::warn!(from = ?self.current, to = ?state, "Invalid fetch state transition");
            return false;
        }

        tracing::info!(from = ?self.current, to = ?state, "Fetch state transition");

        if let Some(previous) = self.current.replace(state) {
            self.completed.push(previous);
        }
        true
    }

    /// Mark the current state completed after the last state succeeds
    pub fn finish(&mut self) {
        if let Some(last) = self.current.take() {
            self.completed.push(last);
        }
    }
}
