//! qseal Server Library - REST signing boundary for document attestations
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keystore;
pub mod openapi;
pub mod routes;
pub mod state;

pub use auth::{AuthVerifier, AuthenticatedIdentity, JwksCache};
pub use config::Config;
pub use error::ApiError;
pub use keystore::{
    KeyStorage, KeyStoreError, PublicKeyRecord, SigningKeyRecord, PURPOSE_ATTESTATION,
};
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_config};
pub use state::AppState;
