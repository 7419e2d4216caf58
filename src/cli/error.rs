//! CLI error types and conversions

use crate::lister::ListingError;
use crate::source::ApiError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Remote API error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The listing delivered error items
    #[error("listing error: {0}")]
    Listing(#[from] ListingError),

    /// Writing records to stdout failed
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    /// Metrics exporter could not be installed
    #[error("metrics error: {0}")]
    Metrics(String),
}
