use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hil_cli::{execute, Cli, UreqTransport};
use hil_client::Session;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = UreqTransport::new(Duration::from_secs(cli.timeout_secs));
    let session = Session::new(&cli.endpoint, transport);

    tracing::debug!(endpoint = %cli.endpoint, "running command");
    let output = execute(&cli.command, &session)
        .with_context(|| format!("request to {} failed", cli.endpoint))?;
    if let Some(text) = output {
        println!("{text}");
    }
    Ok(())
}
