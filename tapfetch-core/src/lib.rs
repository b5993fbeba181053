//! Tapfetch Core - Source tree fetching for package installers
//!
//! This crate clones a repository at a revision, materializes its Git LFS
//! content, rewrites SSH submodule URLs to HTTPS and initializes submodules,
//! so that an installer ends up with a complete build tree without SSH keys.

pub mod checkout;
pub mod config;
pub mod env;
pub mod error;
pub mod fetch;
pub mod gitmodules;
pub mod lfs;
pub mod process;
pub mod report;

pub use checkout::{BaseCheckout, CheckoutError, GitCheckout};
pub use config::{CliOverrides, Config};
pub use env::{EnvOverlay, EnvSnapshot, PreparedEnv};
pub use error::{Error, Result};
pub use fetch::{FailureKind, FetchOptions, FetchOutcome, FetchRequest, RepositoryFetcher};
pub use gitmodules::{ConfigRewriter, RewriteReport};
pub use lfs::LargeFileSync;
pub use process::{ProcessRunner, SystemRunner};
pub use report::{ConsoleSink, ProgressSink};
