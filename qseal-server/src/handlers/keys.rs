//! Public key lookup handler
//!
//! Handles GET /keys/{id} requests so verifiers can resolve the public key
//! named by an attestation's key id. Rotated-out keys stay resolvable;
//! only unknown ids return 404.

use axum::extract::{Path, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// Public half of a signing key.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    /// Key identifier as embedded in attestations
    #[schema(example = "key-550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,
    /// Base64-encoded public key
    pub public_key: String,
    /// Signature algorithm
    #[schema(example = "ed25519")]
    pub algorithm: String,
}

/// Look up a public key by its identifier.
#[utoipa::path(
    get,
    path = "/keys/{id}",
    tag = "Keys",
    params(
        ("id" = String, Path, description = "Key identifier from an attestation")
    ),
    responses(
        (status = 200, description = "Public key found", body = PublicKeyResponse),
        (status = 404, description = "No key with this identifier")
    )
)]
pub async fn get_key_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicKeyResponse>, ApiError> {
    let record = state
        .key_storage
        .public_key(&id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, key_id = %id, "Key storage lookup failed");
            ApiError::internal("Key storage unavailable")
        })?
        .ok_or_else(|| ApiError::not_found(format!("No key with id '{}'", id)))?;

    Ok(Json(PublicKeyResponse {
        id: record.id,
        public_key: BASE64.encode(&record.public_key),
        algorithm: record.algorithm,
    }))
}
