//! rooted: attack-path statistics from the command line.
//!
//! Usage:
//!   rooted user S-1-5-21-1004336348-1177238915-682003330-1104
//!   rooted --config rooted.json batch users ids.txt --concurrency 8
//!
//! Logs go to stderr so stdout stays valid JSON.

use anyhow::Result;
use clap::Parser;
use rooted_cli::{run, Cli};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let mut stdout = std::io::stdout().lock();
    run(&cli, &mut stdout).await
}
