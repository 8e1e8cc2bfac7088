//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod keys;
pub mod sign;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use keys::{get_key_handler, PublicKeyResponse};
pub use sign::{sign_attestation_handler, SignAttestationRequest, SignAttestationResponse};
