//! Check command - probe (and optionally install) git-lfs

use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use tapfetch_core::env::EnvOptions;
use tapfetch_core::{Config, EnvSnapshot, LargeFileSync, PreparedEnv, SystemRunner};

/// Check that git-lfs is available
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Never run the configured install command
    #[arg(long)]
    pub no_install: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<ExitCode> {
        let env = PreparedEnv::prepare(
            &EnvSnapshot::capture(),
            &Default::default(),
            &EnvOptions {
                tool_dir: config.tools.tool_dir.clone(),
                preserve_prefixes: config.fetch.preserve_prefixes.clone(),
                sanitize: config.fetch.sanitize_env,
            },
        );

        let install_command = if self.no_install {
            Vec::new()
        } else {
            config.tools.install_command.clone()
        };
        let lfs = LargeFileSync::new(
            Arc::new(SystemRunner::new()),
            config.tools.git.clone(),
            env.base().clone(),
        )
        .with_tool_dir(config.tools.tool_dir.clone())
        .with_install_command(install_command);

        if lfs.ensure_available().await {
            let version = lfs.version().await.unwrap_or_else(|| "(unknown version)".to_string());
            println!("git-lfs found and working: {}", version);
            return Ok(ExitCode::SUCCESS);
        }

        eprintln!("git-lfs not found! Diagnostic info:");
        for line in lfs.diagnostics() {
            eprintln!("  {}", line);
        }
        eprintln!();
        eprintln!("Install it first:");
        for step in &config.remediation.install_steps {
            eprintln!("  {}", step);
        }
        Ok(ExitCode::FAILURE)
    }
}
