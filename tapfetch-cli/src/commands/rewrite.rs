//! Rewrite command - convert SSH submodule URLs to HTTPS in place

use std::path::PathBuf;

use clap::Args;
use tapfetch_core::gitmodules::GITMODULES_FILE;
use tapfetch_core::ConfigRewriter;

/// Rewrite SSH submodule URLs in a .gitmodules file
#[derive(Args, Debug)]
pub struct RewriteArgs {
    /// The .gitmodules file, or a repository directory containing one
    pub path: PathBuf,

    /// Report what would change without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RewriteArgs {
    /// Execute the rewrite command
    pub fn execute(&self) -> anyhow::Result<()> {
        let path = if self.path.is_dir() {
            self.path.join(GITMODULES_FILE)
        } else {
            self.path.clone()
        };

        let report = ConfigRewriter::new().dry_run(self.dry_run).rewrite(&path)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if report.entries.is_empty() {
            println!("No submodule URLs in {}", path.display());
            return Ok(());
        }

        for entry in &report.entries {
            let name = entry.name.as_deref().unwrap_or("-");
            println!("{:>4}  {:<24} {}", entry.line, name, entry.url);
        }
        println!();

        if !report.changed {
            println!("No SSH URLs found (already HTTPS)");
            return Ok(());
        }

        let verb = if self.dry_run { "Would convert" } else { "Converted" };
        println!("{} {} URL(s):", verb, report.changes.len());
        for change in &report.changes {
            println!("  line {}: {}", change.line, change.original.trim());
            println!("       => {}", change.rewritten.trim());
        }
        Ok(())
    }
}
