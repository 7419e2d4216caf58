//! Main entry point for the bulk-lister CLI

use bulk_lister::cli::{Cli, Commands};
use bulk_lister::CancelSignal;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
///
/// Logs go to stderr; stdout carries the listed records.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bulk_lister=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C cancels the running listing
    let cancel = CancelSignal::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - cancelling listing...");
                cancel.cancel();
            }
        }
    });

    let result = match cli.command {
        Commands::List(ref args) => args
            .execute(&cli, cancel.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
        Commands::Count(ref args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
