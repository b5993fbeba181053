//! Fetch command - materialize a repository at a revision

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use tapfetch_core::{CliOverrides, Config, ConsoleSink, FetchOutcome, FetchRequest, RepositoryFetcher};

/// Fetch a repository into a destination directory
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Repository URL or local path
    pub reference: String,

    /// Branch, tag or commit to check out
    #[arg(short, long)]
    pub revision: String,

    /// Destination directory
    #[arg(short, long)]
    pub dest: PathBuf,

    /// Fail the fetch if LFS content cannot be downloaded
    #[arg(long)]
    pub require_lfs: bool,

    /// Commit id the revision must resolve to
    #[arg(long, value_name = "SHA")]
    pub expect_commit: Option<String>,

    /// Environment variable for every git subprocess (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Label shown before progress lines
    #[arg(long)]
    pub label: Option<String>,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl FetchArgs {
    /// Execute the fetch command
    pub async fn execute(&self, config: Config) -> anyhow::Result<ExitCode> {
        let config = config.with_cli_overrides(CliOverrides {
            require_large_files: self.require_lfs,
            label: self.label.clone(),
            ..CliOverrides::default()
        });

        let sink = ConsoleSink::new(config.fetch.label.as_deref()).stderr_only(self.json);
        let fetcher = RepositoryFetcher::from_config(&config).with_sink(Arc::new(sink));

        let mut request = FetchRequest::new(&self.reference, &self.revision, &self.dest)
            .require_large_files(config.fetch.require_large_files);
        if let Some(ref commit) = self.expect_commit {
            request = request.expect_commit(commit);
        }
        for (key, value) in &self.env {
            request = request.with_env(key, value);
        }

        let outcome = fetcher.fetch(&request).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        } else if let FetchOutcome::Success { ref path } = outcome {
            println!("{}", path.display());
        }

        Ok(ExitCode::from(outcome.exit_code()))
    }
}

/// Parse a `KEY=VALUE` argument
fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("HOME=/tmp/home"),
            Ok(("HOME".to_string(), "/tmp/home".to_string()))
        );
        assert_eq!(
            parse_env_pair("OPTS=a=b"),
            Ok(("OPTS".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_env_pair("EMPTY="), Ok(("EMPTY".to_string(), String::new())));
        assert!(parse_env_pair("NOEQUALS").is_err());
        assert!(parse_env_pair("=value").is_err());
    }
}
