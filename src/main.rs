use clap::Parser;
use tracing::info;

mod backends;
mod cli;
mod config;
mod core;
mod server;
mod utils;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "vidgate=debug,tower_http=debug"
    } else {
        "vidgate=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    info!("Starting vidgate v{}", env!("CARGO_PKG_VERSION"));

    cli.run().await?;

    Ok(())
}
