//! Entry point for toolstream.
//!
//! This binary loads environment variables, sets up logging, parses CLI
//! arguments via [`cli`], and dispatches to the chosen subcommand.

mod chat;
mod cli;
mod output;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Runs the toolstream CLI.
///
/// Loads `.env` files (silently ignored if absent). Logs go to stderr and
/// follow `RUST_LOG`, defaulting to warnings only.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(toolstream::constants::DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = cli::parse();
    cli::run(cli).await
}
