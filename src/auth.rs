//! Credential storage and session lifecycle notifications
//!
//! The [`CredentialStore`] is the single owner of the live [`CredentialPair`].
//! It is handed to the [`ApiClient`](crate::client::ApiClient) by handle; the
//! client's renewal routine is its only writer besides explicit login/logout.
//! Secondary session markers (a routing-guard cookie, a UI badge) are kept in
//! sync through a [`SessionObserver`].

use crate::types::CredentialPair;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Shared handle to the process-wide credential pair
///
/// Cloning the handle shares the same underlying pair.
#[derive(Clone, Default)]
pub struct CredentialStore {
    current: Arc<RwLock<Option<CredentialPair>>>,
}

impl CredentialStore {
    /// Create an empty store (not authenticated)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a pair (e.g. restored after login)
    pub fn with_credentials(pair: CredentialPair) -> Self {
        Self {
            current: Arc::new(RwLock::new(Some(pair))),
        }
    }

    /// Current pair, if authenticated
    pub fn get_current(&self) -> Option<CredentialPair> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current access token, if authenticated
    pub fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    /// Current refresh token, if authenticated and non-empty
    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|pair| pair.refresh_token.clone())
            .filter(|token| !token.is_empty())
    }

    /// Replace the pair atomically
    pub fn replace(&self, pair: CredentialPair) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
        debug!("credentials replaced");
    }

    /// Forget the pair (logout or failed renewal)
    pub fn clear(&self) {
        let had_credentials = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        if had_credentials {
            info!("credentials cleared");
        }
    }

    /// Whether a pair is held
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// Why a session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionExpiry {
    /// Human-readable reason
    pub reason: String,
    /// Path of the request that could not be completed, so the caller can
    /// return the user there after signing in again
    pub request_path: Option<String>,
}

/// Observer for session lifecycle changes
///
/// Implementations must be cheap and non-blocking; they run inline on the
/// renewal path.
pub trait SessionObserver: Send + Sync {
    /// A renewal succeeded and the store now holds `pair`
    fn on_renewed(&self, pair: &CredentialPair) {
        let _ = pair;
    }

    /// The session ended: renewal was impossible, failed, or the user logged out
    fn on_session_expired(&self, expiry: &SessionExpiry);
}

/// Observer that ignores every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSessionObserver;

impl SessionObserver for NoopSessionObserver {
    fn on_session_expired(&self, _expiry: &SessionExpiry) {}
}
