//! Data sources for the bulk-fetch engine
//!
//! [`BulkDataSource`] is the seam between the engine and the remote API. The
//! engine only ever asks two things of a source: how many records match a
//! filter, and to execute one bulk call covering a batch of page filters.
//!
//! [`RecordListing`] implements the trait over one remote list method using
//! [`BulkHttpClient`].

use crate::Filters;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

pub mod http;
pub mod listing;
pub mod response;
pub mod session;

pub use http::BulkHttpClient;
pub use listing::RecordListing;
pub use response::{BulkItemResponse, BulkResponse, DecodableResponse, ResponseStatus};
pub use session::{SessionProvider, StaticSession};

/// Remote error code reported when the session key is no longer valid
pub const SESSION_EXPIRED_CODE: i64 = 1054;

/// Remote API errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Transport failure or unexpected HTTP status
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API answered with a non-ok status
    #[error("{request}: {status} (error code {code})")]
    Status {
        /// Remote error code
        code: i64,
        /// Name of the failed request
        request: String,
        /// Reported response status
        status: String,
    },

    /// The session key expired; a new session is needed before retrying
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// No usable session key
    #[error("session error: {0}")]
    Session(String),
}

/// Result type for remote API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// One logical sub-request of a bulk call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkInput {
    /// Remote method, e.g. "getCustomers"
    #[serde(rename = "requestName")]
    pub method_name: String,
    /// Parameters of the sub-request
    #[serde(flatten)]
    pub filters: Filters,
}

impl BulkInput {
    /// Create a sub-request
    pub fn new(method_name: impl Into<String>, filters: Filters) -> Self {
        Self {
            method_name: method_name.into(),
            filters,
        }
    }
}

/// Source of records the engine fetches from
#[async_trait]
pub trait BulkDataSource: Send + Sync + 'static {
    /// Decoded record type
    type Record: Send + 'static;

    /// Count the records matching `filters`
    async fn count(&self, filters: &Filters) -> ApiResult<usize>;

    /// Execute one bulk call covering every entry of `bulk_filters`
    ///
    /// `on_item` is invoked once per decoded record, in the order the remote
    /// returned them. A single error is returned if the bulk call failed or any
    /// sub-request inside it reported a non-ok status.
    async fn read(
        &self,
        bulk_filters: &[Filters],
        on_item: &mut (dyn FnMut(Self::Record) + Send),
    ) -> ApiResult<()>;
}

#[async_trait]
impl<S: BulkDataSource> BulkDataSource for Arc<S> {
    type Record = S::Record;

    async fn count(&self, filters: &Filters) -> ApiResult<usize> {
        (**self).count(filters).await
    }

    async fn read(
        &self,
        bulk_filters: &[Filters],
        on_item: &mut (dyn FnMut(Self::Record) + Send),
    ) -> ApiResult<()> {
        (**self).read(bulk_filters, on_item).await
    }
}
