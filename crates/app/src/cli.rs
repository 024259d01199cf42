//! Command line arguments.
//!
//! Flags override the settings file and `KUSTFORGE_*` environment variables.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kustforge_infrastructure::{RunMode, Settings};

/// Render Kubernetes templates whose `{{ aws:... }}` placeholders are filled
/// with live resource values.
#[derive(Parser, Debug)]
#[command(name = "kustforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to `$KUSTFORGE_CONFIG`, then `kustforge.yaml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding templates and rendered output.
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Alias table file.
    #[arg(long, global = true)]
    pub aliases: Option<PathBuf>,

    /// Offline resource inventory.
    #[arg(long, global = true)]
    pub inventory: Option<PathBuf>,

    /// Maximum concurrent lookups.
    #[arg(short = 'j', long, global = true)]
    pub jobs: Option<usize>,

    /// Action; falls back to the configured mode.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to do with the templates.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Resolve and render, then show what would change.
    Diff,
    /// Resolve, render and write the output, keeping the previous version.
    Apply,
    /// Restore the output written before the last apply.
    Rollback,
}

impl From<Command> for RunMode {
    fn from(command: Command) -> Self {
        match command {
            Command::Diff => Self::Diff,
            Command::Apply => Self::Apply,
            Command::Rollback => Self::Rollback,
        }
    }
}

impl Cli {
    /// Parses the process arguments.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Writes flag values over `settings`.
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(command) = self.command {
            settings.mode = command.into();
        }
        if let Some(root) = &self.root {
            settings.template_root.clone_from(root);
        }
        if let Some(aliases) = &self.aliases {
            settings.aliases = Some(aliases.clone());
        }
        if let Some(inventory) = &self.inventory {
            settings.inventory = Some(inventory.clone());
        }
        if let Some(jobs) = self.jobs.filter(|jobs| *jobs > 0) {
            settings.max_concurrency = jobs;
        }
    }
}
