//! The repository fetcher
//!
//! A fetch runs six states strictly in order (see [`FetchState`]) and ends in
//! a single [`FetchOutcome`].

mod fetcher;
mod request;
mod state;
mod submodules;

pub use fetcher::{FetchOptions, RepositoryFetcher};
pub use request::{FailureKind, FetchOutcome, FetchRequest};
pub use state::{FetchProgress, FetchState};
