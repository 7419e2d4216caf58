//! HTTP transport for bulk calls
//!
//! A bulk call is one form-encoded POST carrying up to
//! [`crate::lister::config::MAX_SUB_REQUESTS_PER_BULK_CALL`] sub-requests in
//! the `requests` parameter as a JSON array.

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::response::BulkResponse;
use super::session::SessionProvider;
use super::{ApiError, ApiResult, BulkInput};
use crate::metrics::BulkRequestMetrics;

/// HTTP connect timeout (seconds) - time to establish TCP connection
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout (seconds) - overall time for the entire request
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Client for the bulk endpoint of a record-oriented API
pub struct BulkHttpClient {
    client: Client,
    url: String,
    client_code: String,
    partner_key: Option<String>,
    session: Arc<dyn SessionProvider>,
}

impl BulkHttpClient {
    /// Create a client with its own connection pool
    ///
    /// # Arguments
    /// * `url` - Bulk endpoint URL
    /// * `client_code` - Account identifier sent with every call
    /// * `session` - Source of the session key
    pub fn new(
        url: impl Into<String>,
        client_code: impl Into<String>,
        session: Arc<dyn SessionProvider>,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, url, client_code, session))
    }

    /// Create a client on top of an existing reqwest client
    pub fn with_client(
        client: Client,
        url: impl Into<String>,
        client_code: impl Into<String>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            client_code: client_code.into(),
            partner_key: None,
            session,
        }
    }

    /// Send `partner_key` with every call
    pub fn with_partner_key(mut self, partner_key: impl Into<String>) -> Self {
        self.partner_key = Some(partner_key.into());
        self
    }

    /// Session provider used by this client
    pub fn session(&self) -> &Arc<dyn SessionProvider> {
        &self.session
    }

    /// Form parameters of a bulk call
    pub fn build_form(&self, inputs: &[BulkInput]) -> ApiResult<Vec<(String, String)>> {
        let requests = serde_json::to_string(inputs)
            .map_err(|e| ApiError::Decode(format!("failed to encode bulk requests: {e}")))?;

        let mut form = vec![
            ("clientCode".to_string(), self.client_code.clone()),
            ("sessionKey".to_string(), self.session.session_key()?),
        ];
        if let Some(partner_key) = &self.partner_key {
            form.push(("partnerKey".to_string(), partner_key.clone()));
        }
        form.push(("requests".to_string(), requests));
        Ok(form)
    }

    /// Execute one bulk call and check every status in the response
    pub async fn send_bulk<T>(&self, inputs: &[BulkInput]) -> ApiResult<BulkResponse<T>>
    where
        T: DeserializeOwned,
    {
        let method = inputs
            .first()
            .map(|input| input.method_name.as_str())
            .unwrap_or_default();
        let metrics = BulkRequestMetrics::start(method, inputs.len());

        let result = self.execute(inputs).await;
        match &result {
            Ok(_) => metrics.record_complete(),
            Err(e) => metrics.record_failure(&e.to_string()),
        }
        result
    }

    async fn execute<T>(&self, inputs: &[BulkInput]) -> ApiResult<BulkResponse<T>>
    where
        T: DeserializeOwned,
    {
        let form = self.build_form(inputs)?;

        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Http(format!(
                "unexpected status {}: {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Http(format!("failed to read response body: {e}")))?;
        debug!(bytes = body.len(), "Bulk response received");

        decode_bulk_response(&body)
    }
}

/// Decode a bulk response body and check every status in it
pub fn decode_bulk_response<T>(body: &str) -> ApiResult<BulkResponse<T>>
where
    T: DeserializeOwned,
{
    let response: BulkResponse<T> = serde_json::from_str(body)
        .map_err(|e| ApiError::Decode(format!("failed to decode bulk response: {e}")))?;
    response.ensure_all_ok()?;
    Ok(response)
}
