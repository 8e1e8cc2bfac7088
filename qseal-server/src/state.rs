//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use crate::auth::AuthVerifier;
use crate::keystore::KeyStorage;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Signing key storage (PostgreSQL or in-memory fallback)
    pub key_storage: Arc<KeyStorage>,
    /// Broker token verifier; `None` means authenticated routes return 500
    pub auth: Option<Arc<AuthVerifier>>,
    /// Service name embedded in signed attestations
    pub service_name: String,
}
