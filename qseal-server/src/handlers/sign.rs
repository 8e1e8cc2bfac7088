//! Attestation signing handler
//!
//! Handles POST /sign-attestation requests. The server binds the
//! broker-verified identity, assigns the timestamp and key id, and signs
//! the canonical attestation bytes with the active Ed25519 key. Signing
//! fails hard when no active key exists; there is no fallback signature.

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use qseal_core::{
    AttestationDraft, DocumentHashes, ExclusionZone, IdentityBlock, PerceptualHashes,
    SealPlacement, ServiceBlock,
};

use crate::auth::AuthenticatedIdentity;
use crate::error::ApiError;
use crate::keystore::PURPOSE_ATTESTATION;
use crate::state::AppState;

/// Document hashes submitted for signing.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestHashes {
    /// Hex-encoded SHA3-256 of the document with the seal area blanked
    #[schema(example = "a1b2c3d4...")]
    pub cryptographic: String,
    /// Base64-encoded DCT perceptual hash
    pub p_hash: String,
    /// Base64-encoded gradient perceptual hash
    pub d_hash: String,
}

/// Identity the client claims to seal as. Must match the broker token.
#[derive(Deserialize, ToSchema)]
pub struct RequestIdentity {
    #[schema(example = "email")]
    pub provider: String,
    #[schema(example = "alice@example.com")]
    pub identifier: String,
}

/// Pixel rectangle that was blanked before hashing, plus its fill color.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestExclusionZone {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Fill color as hex without '#'
    #[schema(example = "ffffff")]
    pub fill_color: String,
}

/// Relative placement the seal was stamped with, carried in the signed
/// payload so verifiers can re-derive the zone after re-rasterization.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestPlacement {
    pub x_pct: f64,
    pub y_pct: f64,
    pub size_pct: f64,
}

/// Request body for POST /sign-attestation.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignAttestationRequest {
    pub hashes: RequestHashes,
    pub identity: RequestIdentity,
    pub exclusion_zone: RequestExclusionZone,
    #[serde(default)]
    pub placement: Option<RequestPlacement>,
    /// Optional free-form URL embedded alongside the attestation
    #[serde(default)]
    pub user_url: Option<String>,
}

/// Response for a successful signing request.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignAttestationResponse {
    /// Server-assigned signing timestamp; the client must embed this exact
    /// value when assembling the final attestation
    pub timestamp: DateTime<Utc>,
    /// Base64-encoded Ed25519 signature over the canonical attestation bytes
    pub signature: String,
    /// Base64-encoded public key that verifies the signature
    pub public_key: String,
    /// Identifier of the signing key, embedded in the attestation
    pub public_key_id: String,
    /// Service name embedded in the attestation's service block
    pub service_name: String,
}

/// Basic shape validation on the request before any key material is touched
fn validate_request(request: &SignAttestationRequest) -> Result<(), ApiError> {
    if request.hashes.cryptographic.len() != 64
        || hex::decode(&request.hashes.cryptographic).is_err()
    {
        return Err(ApiError::bad_request(
            "cryptographic hash must be 64 hex characters",
        ));
    }
    if request.hashes.p_hash.is_empty() || request.hashes.d_hash.is_empty() {
        return Err(ApiError::bad_request("perceptual hashes must be non-empty"));
    }
    if request.identity.provider.is_empty() || request.identity.identifier.is_empty() {
        return Err(ApiError::bad_request("identity must be non-empty"));
    }
    if request.exclusion_zone.width == 0 || request.exclusion_zone.height == 0 {
        return Err(ApiError::bad_request(
            "exclusion zone must have non-zero dimensions",
        ));
    }
    if let Some(ref placement) = request.placement {
        if !placement.x_pct.is_finite()
            || !placement.y_pct.is_finite()
            || !placement.size_pct.is_finite()
        {
            return Err(ApiError::bad_request("placement values must be finite"));
        }
    }
    Ok(())
}

/// Sign an attestation for the authenticated identity.
///
/// The identity embedded in the attestation comes from the broker token;
/// a request claiming a different identity is rejected with 403 rather
/// than silently rewritten. The timestamp and key id in the response are
/// server-assigned and covered by the returned signature.
#[utoipa::path(
    post,
    path = "/sign-attestation",
    tag = "Signing",
    request_body = SignAttestationRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Attestation signed", body = SignAttestationResponse),
        (status = 400, description = "Malformed request body"),
        (status = 401, description = "Missing or invalid broker token"),
        (status = 403, description = "Claimed identity does not match the token"),
        (status = 500, description = "No active signing key")
    )
)]
pub async fn sign_attestation_handler(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Json(request): Json<SignAttestationRequest>,
) -> Result<Json<SignAttestationResponse>, ApiError> {
    validate_request(&request)?;

    // The signed identity is whatever the broker verified. A mismatch is a
    // spoofing attempt, not a recoverable input error.
    if request.identity.provider != identity.provider
        || request.identity.identifier != identity.identifier
    {
        tracing::warn!(
            claimed_provider = %request.identity.provider,
            claimed_identifier = %request.identity.identifier,
            token_identifier = %identity.identifier,
            subject = %identity.subject,
            "Identity mismatch between request body and broker token"
        );
        return Err(ApiError::forbidden(
            "claimed identity does not match the authenticated session",
        ));
    }

    let key = state
        .key_storage
        .active_key(PURPOSE_ATTESTATION)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Key storage lookup failed");
            ApiError::internal("Key storage unavailable")
        })?
        .ok_or_else(|| {
            tracing::error!("No active signing key for attestation purpose");
            ApiError::internal("No active signing key configured")
        })?;

    let seed: [u8; 32] = key.private_key[..].try_into().map_err(|_| {
        tracing::error!(key_id = %key.id, "Stored private key has wrong length");
        ApiError::internal("Malformed signing key material")
    })?;
    let signing_key = SigningKey::from_bytes(&seed);

    let draft = AttestationDraft {
        hashes: DocumentHashes {
            cryptographic: request.hashes.cryptographic,
            perceptual: PerceptualHashes {
                p: request.hashes.p_hash,
                d: request.hashes.d_hash,
            },
        },
        identity: IdentityBlock {
            provider: identity.provider,
            identifier: identity.identifier,
        },
        exclusion: ExclusionZone {
            x: request.exclusion_zone.x,
            y: request.exclusion_zone.y,
            width: request.exclusion_zone.width,
            height: request.exclusion_zone.height,
            fill_color: request.exclusion_zone.fill_color,
        },
        placement: request
            .placement
            .map(|p| SealPlacement::new(p.x_pct, p.y_pct, p.size_pct)),
        user_url: request.user_url,
    };

    let service = ServiceBlock {
        name: state.service_name.clone(),
        key_id: key.id.clone(),
    };
    let timestamp = Utc::now();
    let unsigned = draft.into_unsigned(service, timestamp);

    let message = unsigned.signable_bytes().map_err(ApiError::from)?;
    let signature = signing_key.sign(&message);

    tracing::info!(
        key_id = %key.id,
        identity = %unsigned.identity.identifier,
        "Attestation signed"
    );

    Ok(Json(SignAttestationResponse {
        timestamp,
        signature: BASE64.encode(signature.to_bytes()),
        public_key: BASE64.encode(&key.public_key),
        public_key_id: key.id.clone(),
        service_name: state.service_name.clone(),
    }))
}
