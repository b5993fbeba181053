//! Tapfetch CLI - Command line interface for the tapfetch repository fetcher
//!
//! Fetches a complete source tree (LFS content and submodules included) the
//! way a package installer needs it.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tapfetch_core::{CliOverrides, Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CheckArgs, FetchArgs, RewriteArgs};

/// Tapfetch: fetch repositories with LFS content and HTTPS submodules
#[derive(Parser, Debug)]
#[command(name = "tapfetch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Git program to run (overrides config and env)
    #[arg(long, global = true)]
    git: Option<String>,

    /// Directory searched first for git and git-lfs (overrides config and env)
    #[arg(long, global = true)]
    tool_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Fetch a repository into a destination directory
    #[command(visible_alias = "f")]
    Fetch(FetchArgs),

    /// Check that git-lfs is available, installing it if configured
    Check(CheckArgs),

    /// Rewrite SSH submodule URLs in a .gitmodules file to HTTPS
    Rewrite(RewriteArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::load_with_overrides(CliOverrides {
        git: cli.git.clone(),
        tool_dir: cli.tool_dir.clone(),
        ..CliOverrides::default()
    })?;

    if cli.verbose {
        tracing::info!(
            git = %config.tools.git,
            tool_dir = ?config.tools.tool_dir,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("tapfetch {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Fetch(args)) => return args.execute(config).await,
        Some(Commands::Check(args)) => return args.execute(&config).await,
        Some(Commands::Rewrite(args)) => args.execute()?,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("Tapfetch - fetch repositories with LFS content and HTTPS submodules");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_config(config: &Config) {
    println!("Tapfetch Configuration");
    println!("======================");
    println!();
    println!("Tools:");
    println!("  git: {}", config.tools.git);
    println!(
        "  tool_dir: {}",
        config
            .tools
            .tool_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    if config.tools.install_command.is_empty() {
        println!("  install_command: (disabled)");
    } else {
        println!("  install_command: {}", config.tools.install_command.join(" "));
    }
    println!();
    println!("Fetch:");
    println!("  require_large_files: {}", config.fetch.require_large_files);
    println!("  submodule_depth: {}", config.fetch.submodule_depth);
    println!(
        "  state_timeout: {}",
        config
            .fetch
            .state_timeout
            .map(|d| format!("{:?}", d))
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!("  sanitize_env: {}", config.fetch.sanitize_env);
    println!("  preserve_prefixes: {}", config.fetch.preserve_prefixes.join(", "));
    println!();
    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}
