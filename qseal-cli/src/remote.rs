//! HTTP clients for the signing service.
//!
//! [`RemoteSigner`] implements the signing boundary over the service's
//! REST API, and [`HttpKeyResolver`] resolves public keys for
//! verification. Both map transport failures to
//! [`SealError::NetworkError`] so callers can classify them as retryable.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use serde_json::json;

use qseal_core::{
    AttestationData, AttestationDraft, AttestationSigner, KeyResolver, Result, SealError,
    ServiceBlock,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Response body from POST /sign-attestation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignResponse {
    timestamp: DateTime<Utc>,
    signature: String,
    public_key: String,
    public_key_id: String,
    service_name: String,
}

/// Error body returned by the signing service.
#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Signing boundary over the signing service's REST API.
pub struct RemoteSigner {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RemoteSigner {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl AttestationSigner for RemoteSigner {
    async fn sign(&self, draft: AttestationDraft) -> Result<AttestationData> {
        let body = json!({
            "hashes": {
                "cryptographic": &draft.hashes.cryptographic,
                "pHash": &draft.hashes.perceptual.p,
                "dHash": &draft.hashes.perceptual.d,
            },
            "identity": {
                "provider": &draft.identity.provider,
                "identifier": &draft.identity.identifier,
            },
            "exclusionZone": {
                "x": draft.exclusion.x,
                "y": draft.exclusion.y,
                "width": draft.exclusion.width,
                "height": draft.exclusion.height,
                "fillColor": &draft.exclusion.fill_color,
            },
            "placement": draft.placement.as_ref().map(|p| json!({
                "xPct": p.x_pct,
                "yPct": p.y_pct,
                "sizePct": p.size_pct,
            })),
            "userUrl": &draft.user_url,
        });

        let response = self
            .client
            .post(format!("{}/sign-attestation", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SealError::NetworkError(format!("signing request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| "no error detail".to_string());
            return Err(SealError::SigningService(format!(
                "signing service returned {}: {}",
                status, detail
            )));
        }

        let signed: SignResponse = response.json().await.map_err(|e| {
            SealError::SigningService(format!("invalid signing response: {}", e))
        })?;

        let service = ServiceBlock {
            name: signed.service_name,
            key_id: signed.public_key_id,
        };
        let mut attestation = draft.into_unsigned(service, signed.timestamp);
        attestation.signature = Some(BASE64.decode(&signed.signature).map_err(|e| {
            SealError::SigningService(format!("invalid signature encoding: {}", e))
        })?);

        // Sanity-check the returned signature against the returned public
        // key before stamping it into the document
        let key_bytes = BASE64.decode(&signed.public_key).map_err(|e| {
            SealError::SigningService(format!("invalid public key encoding: {}", e))
        })?;
        let raw: [u8; 32] = key_bytes[..].try_into().map_err(|_| {
            SealError::SigningService("public key must be 32 bytes".to_string())
        })?;
        let verifying_key = VerifyingKey::from_bytes(&raw)
            .map_err(|e| SealError::SigningService(format!("invalid public key: {}", e)))?;
        if !attestation.verify_signature(&verifying_key)? {
            return Err(SealError::SignatureError(
                "signing service returned a signature that does not verify".to_string(),
            ));
        }

        tracing::debug!(
            key_id = %attestation.service.key_id,
            "attestation signed by remote service"
        );
        Ok(attestation)
    }
}

/// Resolves public keys through GET /keys/{id}.
pub struct HttpKeyResolver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpKeyResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Response body from GET /keys/{id}.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
    public_key: String,
}

#[async_trait]
impl KeyResolver for HttpKeyResolver {
    async fn resolve(&self, key_id: &str) -> Result<Option<VerifyingKey>> {
        let response = self
            .client
            .get(format!("{}/keys/{}", self.base_url, key_id))
            .send()
            .await
            .map_err(|e| SealError::NetworkError(format!("key lookup failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(SealError::SigningService(format!(
                "key service returned {}",
                status
            )));
        }

        let key: KeyResponse = response
            .json()
            .await
            .map_err(|e| SealError::SigningService(format!("invalid key response: {}", e)))?;
        let bytes = BASE64
            .decode(&key.public_key)
            .map_err(|e| SealError::SigningService(format!("invalid key encoding: {}", e)))?;
        let raw: [u8; 32] = bytes[..]
            .try_into()
            .map_err(|_| SealError::SigningService("public key must be 32 bytes".to_string()))?;
        let verifying_key = VerifyingKey::from_bytes(&raw)
            .map_err(|e| SealError::SigningService(format!("invalid public key: {}", e)))?;
        Ok(Some(verifying_key))
    }
}
