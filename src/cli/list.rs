//! List and count commands

use clap::{Args, Parser};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{BufWriter, Write};
use tracing::{error, info};

use super::{Cli, CliError};
use crate::connection::{ConnectionRetrier, SessionExpiry};
use crate::lister::config::{DEFAULT_MAX_FETCHERS, DEFAULT_MAX_ITEMS_PER_REQUEST};
use crate::source::{ApiError, BulkDataSource, RecordListing, SessionProvider};
use crate::{CancelSignal, Filters, Item, Lister, ListingError, ListingSettings};

/// Maximum allowed fetchers to prevent self-inflicted rate limiting
const MAX_FETCHERS: usize = 32;

/// Parse a `key=value` filter; values that parse as JSON keep their type
pub fn parse_filter(input: &str) -> Result<(String, serde_json::Value), CliError> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| CliError::InvalidArgument(format!("filter '{input}' is not key=value")))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::InvalidArgument(format!("filter '{input}' has an empty key")));
    }

    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Parse and validate the fetcher count
fn parse_max_fetchers(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("max fetchers must be at least 1".to_string());
    }
    if value > MAX_FETCHERS {
        return Err(format!("max fetchers {value} exceeds maximum of {MAX_FETCHERS}"));
    }
    Ok(value)
}

/// Which records to list
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Remote list method (e.g., getCustomers)
    #[arg(long)]
    pub method: String,

    /// Filter as key=value, repeatable
    #[arg(long = "filter")]
    pub filters: Vec<String>,
}

impl QueryArgs {
    /// Filters given on the command line
    pub fn parsed_filters(&self) -> Result<Filters, CliError> {
        self.filters.iter().map(|f| parse_filter(f)).collect()
    }
}

/// List command arguments
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Query to run
    #[command(flatten)]
    pub query: QueryArgs,

    /// Concurrent fetch workers (1-32)
    #[arg(long, default_value_t = DEFAULT_MAX_FETCHERS, value_parser = parse_max_fetchers)]
    pub max_fetchers: usize,

    /// Outbound calls per second, 0 for unlimited
    #[arg(long, default_value = "0")]
    pub max_requests_per_second: u32,

    /// Items buffered between pipeline stages
    #[arg(long, default_value = "100")]
    pub stream_buffer_size: usize,

    /// Records per bulk call (max 10000)
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS_PER_REQUEST)]
    pub max_items_per_request: usize,

    /// Print records in JSON arrays of this many items
    #[arg(long)]
    pub group_size: Option<usize>,
}

impl ListArgs {
    /// Engine settings from the flags
    pub fn settings(&self) -> ListingSettings {
        ListingSettings {
            max_requests_per_second: self.max_requests_per_second,
            stream_buffer_size: self.stream_buffer_size,
            max_fetchers: self.max_fetchers,
            max_items_per_request: self.max_items_per_request,
        }
    }

    /// Execute the list command
    pub async fn execute(&self, cli: &Cli, cancel: CancelSignal) -> Result<(), CliError> {
        cli.init_metrics().await?;
        let filters = self.query.parsed_filters()?;
        let (session, client) = cli.connect_client()?;
        let listing = RecordListing::<serde_json::Value>::new(client, &self.query.method);
        let lister = Lister::new(self.settings(), listing);

        let total = verify_session(&cli.retrier(), &lister, session.as_ref(), &filters).await?;
        info!(method = %self.query.method, total = total, "Listing records");

        let pb = create_progress_bar(total, &self.query.method);
        let mut out = BufWriter::new(std::io::stdout());
        let mut summary = Summary::default();

        match self.group_size {
            Some(group_size) => {
                let mut groups = lister.fetch_grouped(cancel, filters, group_size).await;
                while let Some(group) = groups.next().await {
                    let mut records = Vec::with_capacity(group.len());
                    for item in group {
                        if let Some(record) = summary.observe(item, &pb) {
                            records.push(record);
                        }
                    }
                    if !records.is_empty() {
                        write_line(&mut out, &records)?;
                    }
                }
            }
            None => {
                let mut items = lister.fetch(cancel, filters).await;
                while let Some(item) = items.next().await {
                    if let Some(record) = summary.observe(item, &pb) {
                        write_line(&mut out, &record)?;
                    }
                }
            }
        }

        out.flush()?;
        pb.finish_and_clear();
        summary.finish(&self.query.method)
    }
}

/// Count command arguments
#[derive(Parser, Debug)]
pub struct CountArgs {
    /// Query to run
    #[command(flatten)]
    pub query: QueryArgs,
}

impl CountArgs {
    /// Execute the count command
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        cli.init_metrics().await?;
        let filters = self.query.parsed_filters()?;
        let (session, client) = cli.connect_client()?;
        let listing = RecordListing::<serde_json::Value>::new(client, &self.query.method);
        let lister = Lister::new(ListingSettings::default(), listing);

        let total = verify_session(&cli.retrier(), &lister, session.as_ref(), &filters).await?;
        println!("{total}");
        Ok(())
    }
}

/// Count through the connection retrier, refreshing an expired session
async fn verify_session<S: BulkDataSource>(
    retrier: &ConnectionRetrier,
    lister: &Lister<S>,
    session: &dyn SessionProvider,
    filters: &Filters,
) -> Result<usize, CliError> {
    let total = std::sync::Mutex::new(0usize);
    let total_ref = &total;

    retrier
        .run(
            move || async move {
                let count = lister.count(filters).await?;
                *total_ref.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = count;
                Ok::<(), ApiError>(())
            },
            move || async move { session.refresh() },
        )
        .await
        .map_err(|e| {
            if e.is_session_expired() {
                error!(error = %e, "Session expired and could not be renewed");
            }
            CliError::Api(e)
        })?;

    let total = total.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
    Ok(total)
}

/// Counts delivered records and remembers the first failure
#[derive(Default)]
struct Summary {
    records: u64,
    failures: u64,
    first_error: Option<ListingError>,
}

impl Summary {
    fn observe<T>(&mut self, item: Item<T>, pb: &ProgressBar) -> Option<T> {
        if pb.length() != Some(item.total_count as u64) {
            pb.set_length(item.total_count as u64);
        }

        if let Some(e) = item.error {
            error!(error = %e, "Listing failed");
            self.failures += 1;
            self.first_error.get_or_insert(e);
            return None;
        }

        let record = item.payload?;
        self.records += 1;
        pb.inc(1);
        Some(record)
    }

    fn finish(self, method: &str) -> Result<(), CliError> {
        info!(
            method = %method,
            records = self.records,
            failures = self.failures,
            "Listing finished"
        );
        match self.first_error {
            Some(e) => Err(CliError::Listing(e)),
            None => Ok(()),
        }
    }
}

fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, value).map_err(std::io::Error::from)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Create progress bar with style
fn create_progress_bar(total: usize, method: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(format!("Listing {method}"));
    pb
}
