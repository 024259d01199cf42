//! Kustforge - main entry point
//!
//! Initializes logging, loads settings (file, then environment, then flags),
//! runs the requested action and maps the outcome to an exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use kustforge::{Cli, RunReport, Runner, write_report};
use kustforge_infrastructure::config::{CONFIG_ENV, DEFAULT_CONFIG_FILE};
use kustforge_infrastructure::{Settings, TokioFileSystem};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse_args()).await {
        Ok(report) if report.is_failure() => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunReport> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut settings = Settings::load(&TokioFileSystem::new(), &path).await?;
    settings.apply_process_env()?;
    cli.apply_to(&mut settings);

    let report = Runner::new(settings).run().await?;
    write_report(&mut std::io::stdout().lock(), &report).context("cannot write report")?;
    Ok(report)
}
