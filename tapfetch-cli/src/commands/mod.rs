//! CLI command implementations

pub mod check;
pub mod fetch;
pub mod rewrite;

pub use check::CheckArgs;
pub use fetch::FetchArgs;
pub use rewrite::RewriteArgs;
