//! CLI command implementations

pub mod error;
pub mod list;

pub use error::CliError;
pub use list::{CountArgs, ListArgs};

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::connection::{ConnectionRetrier, DEFAULT_BACKOFF_COEFF};
use crate::source::{BulkHttpClient, StaticSession};

/// Bulk lister CLI
#[derive(Parser, Debug)]
#[command(name = "bulk-lister")]
#[command(about = "Stream every record of a list method through bulk calls", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Bulk endpoint URL
    #[arg(long, global = true, env = "BULK_LISTER_URL", default_value = "")]
    pub url: String,

    /// Account identifier sent with every call
    #[arg(long, global = true, env = "BULK_LISTER_CLIENT_CODE", default_value = "")]
    pub client_code: String,

    /// Session key of an authenticated session
    #[arg(long, global = true, env = "BULK_LISTER_SESSION_KEY", default_value = "", hide_env_values = true)]
    pub session_key: String,

    /// Partner key, if the account requires one
    #[arg(long, global = true, env = "BULK_LISTER_PARTNER_KEY")]
    pub partner_key: Option<String>,

    /// Connect attempts before giving up (1-20)
    #[arg(long, global = true, default_value = "5", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub connect_attempts: u32,

    /// Base delay between connect attempts in milliseconds
    #[arg(long, global = true, default_value = "1000")]
    pub connect_interval_ms: u64,

    /// Serve Prometheus metrics on this address (e.g., 0.0.0.0:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream matching records as JSON lines
    List(ListArgs),

    /// Print the number of matching records
    Count(CountArgs),
}

impl Cli {
    /// Session provider and HTTP client built from the global flags
    pub fn connect_client(&self) -> Result<(Arc<StaticSession>, Arc<BulkHttpClient>), CliError> {
        if self.url.is_empty() {
            return Err(CliError::InvalidArgument("--url is required".to_string()));
        }
        if self.client_code.is_empty() {
            return Err(CliError::InvalidArgument("--client-code is required".to_string()));
        }
        if self.session_key.is_empty() {
            return Err(CliError::InvalidArgument(
                "--session-key (or BULK_LISTER_SESSION_KEY) is required".to_string(),
            ));
        }

        let session = Arc::new(StaticSession::new(self.session_key.clone()));
        let mut client = BulkHttpClient::new(&self.url, &self.client_code, session.clone())?;
        if let Some(partner_key) = &self.partner_key {
            client = client.with_partner_key(partner_key);
        }
        Ok((session, Arc::new(client)))
    }

    /// Retrier configured from the global flags
    pub fn retrier(&self) -> ConnectionRetrier {
        ConnectionRetrier::new(
            self.connect_attempts,
            Duration::from_millis(self.connect_interval_ms),
            DEFAULT_BACKOFF_COEFF,
        )
    }

    /// Install the Prometheus exporter if requested
    pub async fn init_metrics(&self) -> Result<(), CliError> {
        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::Metrics(e.to_string()))?;
        }
        Ok(())
    }
}
