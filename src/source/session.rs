//! Session keys for authenticated requests

use super::{ApiError, ApiResult};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Supplies the session key sent with every request
pub trait SessionProvider: Send + Sync {
    /// Current session key
    fn session_key(&self) -> ApiResult<String>;

    /// Drop the current session so the next call needs a fresh one
    fn invalidate(&self);

    /// Replace a session the remote rejected
    ///
    /// Returns an error when no fresh key can be obtained, in which case
    /// retrying is pointless.
    fn refresh(&self) -> ApiResult<()>;
}

/// Session provider holding a key obtained elsewhere
#[derive(Debug, Default)]
pub struct StaticSession {
    key: RwLock<Option<String>>,
}

impl StaticSession {
    /// Create a provider holding `key`
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: RwLock::new(Some(key.into())),
        }
    }

    /// Install a freshly acquired key
    pub fn renew(&self, key: impl Into<String>) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = Some(key.into());
    }

    /// Whether a key is currently held
    pub fn is_valid(&self) -> bool {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl SessionProvider for StaticSession {
    fn session_key(&self) -> ApiResult<String> {
        self.key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ApiError::Session("no valid session key".to_string()))
    }

    fn invalidate(&self) {
        debug!("Invalidating session key");
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// A static key cannot be re-acquired; the session is dropped and the
    /// expiry is reported back.
    fn refresh(&self) -> ApiResult<()> {
        self.invalidate();
        Err(ApiError::SessionExpired(
            "session key was rejected and cannot be renewed".to_string(),
        ))
    }
}
