//! Decoding of bulk API responses
//!
//! Every response shape carries a [`ResponseStatus`]. Shapes expose it through
//! [`DecodableResponse`] so status checking does not depend on the concrete
//! response type.

use super::{ApiError, ApiResult, SESSION_EXPIRED_CODE};
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status block of a response or of one bulk sub-response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStatus {
    /// Request name ("requestName" inside bulk sub-responses)
    #[serde(default, alias = "requestName")]
    pub request: String,
    /// "ok" on success
    #[serde(default)]
    pub response_status: String,
    /// Remote error code, 0 on success
    #[serde(default, deserialize_with = "lenient_number")]
    pub error_code: i64,
    /// Offending input field, if any
    #[serde(default)]
    pub error_field: String,
    /// Number of records matching the request
    #[serde(default, deserialize_with = "lenient_count")]
    pub records_total: usize,
    /// Number of records in this response
    #[serde(default, deserialize_with = "lenient_count")]
    pub records_in_response: usize,
}

impl ResponseStatus {
    /// Whether the remote reported success
    pub fn is_ok(&self) -> bool {
        self.response_status.eq_ignore_ascii_case("ok")
    }

    /// Convert a failed status into an error
    pub fn to_error(&self) -> ApiError {
        if self.error_code == SESSION_EXPIRED_CODE {
            return ApiError::SessionExpired(format!(
                "{} (error code {})",
                self.request, self.error_code
            ));
        }
        ApiError::Status {
            code: self.error_code,
            request: self.request.clone(),
            status: self.response_status.clone(),
        }
    }
}

/// Response shape that carries a status block
pub trait DecodableResponse {
    /// The status block
    fn status(&self) -> &ResponseStatus;
}

/// Fail with the response's own error unless its status is ok
pub fn ensure_ok<R: DecodableResponse + ?Sized>(response: &R) -> ApiResult<()> {
    let status = response.status();
    if status.is_ok() {
        Ok(())
    } else {
        Err(status.to_error())
    }
}

/// Envelope of a bulk call
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct BulkResponse<T> {
    /// Status of the bulk call as a whole
    #[serde(default)]
    pub status: ResponseStatus,
    /// One entry per sub-request, in request order
    #[serde(default, rename = "requests")]
    pub items: Vec<BulkItemResponse<T>>,
}

impl<T> BulkResponse<T> {
    /// Fail if the envelope or any sub-response reported a non-ok status
    pub fn ensure_all_ok(&self) -> ApiResult<()> {
        ensure_ok(self)?;
        self.items.iter().try_for_each(|item| ensure_ok(item))
    }

    /// Total record count reported by the first sub-response, 0 without any
    pub fn records_total(&self) -> usize {
        self.items
            .first()
            .map(|item| item.status.records_total)
            .unwrap_or(0)
    }
}

impl<T> DecodableResponse for BulkResponse<T> {
    fn status(&self) -> &ResponseStatus {
        &self.status
    }
}

/// Result of one sub-request inside a bulk call
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct BulkItemResponse<T> {
    /// Status of this sub-request
    #[serde(default)]
    pub status: ResponseStatus,
    /// Records of this page
    #[serde(default)]
    pub records: Vec<T>,
}

impl<T> DecodableResponse for BulkItemResponse<T> {
    fn status(&self) -> &ResponseStatus {
        &self.status
    }
}

// Some methods report counts as strings, and null where nothing was counted.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid count: {n}"))),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid count: {s}"))),
        other => Err(D::Error::custom(format!("invalid count: {other}"))),
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("invalid error code: {n}"))),
        Value::String(s) if s.is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid error code: {s}"))),
        other => Err(D::Error::custom(format!("invalid error code: {other}"))),
    }
}
