//! Submodule URL normalization
//!
//! `.gitmodules` files often point at SSH remotes that cannot be reached
//! without key material. The rewriter turns those into plain HTTPS URLs,
//! touching nothing but the `url` values.

mod parse;
mod rewrite;

pub use parse::{classify_url, https_equivalent, SubmoduleUrlEntry, UrlScheme};
pub use rewrite::{rewrite_content, ConfigRewriter, RewriteReport, UrlChange};

/// Name of the submodule declaration file at a repository root
pub const GITMODULES_FILE: &str = ".gitmodules";
