//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::keystore::PURPOSE_ATTESTATION;
use crate::state::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Whether an active signing key is available
    pub signing_key_available: bool,
    /// Whether key storage is persistent (PostgreSQL)
    pub persistent_storage: bool,
    /// Service name
    pub service: &'static str,
}

/// GET /health - Health check endpoint
///
/// Returns JSON with service status and signing key availability. A server
/// without an active signing key still answers but reports "degraded",
/// since every signing request would fail.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let signing_key_available = matches!(
        state.key_storage.active_key(PURPOSE_ATTESTATION).await,
        Ok(Some(_))
    );

    let status = if signing_key_available {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        signing_key_available,
        persistent_storage: state.key_storage.is_persistent(),
        service: "qseal-server",
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// Returns 200 once key storage answers. Unlike /health, this is a simple
/// yes/no check.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Readiness state", body = ReadyResponse)
    )
)]
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    match state.key_storage.check_health().await {
        Ok(()) => Json(ReadyResponse {
            ready: true,
            message: None,
        }),
        Err(_) => Json(ReadyResponse {
            ready: false,
            message: Some("key storage unreachable"),
        }),
    }
}
