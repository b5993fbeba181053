//! External process execution
//!
//! Every subprocess the fetcher starts goes through a [`ProcessRunner`], which
//! reports non-zero exits as data instead of errors.

mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use runner::{ExecutionResult, Invocation, OutputMode, ProcessRunner, SystemRunner};
