//! Signing boundary abstraction.
//!
//! The sealing pipeline hands an [`AttestationDraft`] to an
//! [`AttestationSigner`] and gets back the complete, signed attestation.
//! The signer — not the caller — assigns the timestamp and the key id, so
//! a client can never backdate an attestation or claim a key it does not
//! hold. [`LocalSigner`] signs in-process for self-hosted and test use;
//! the REST signing service implements the same assembly server-side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::attestation::{
    AttestationData, ExclusionZone, HashBlock, IdentityBlock, ServiceBlock,
};
use crate::error::{Result, CURRENT_ATTESTATION_VERSION};
use crate::geometry::SealPlacement;
use crate::hash::DocumentHashes;

/// The unsigned attestation material assembled client-side.
#[derive(Debug, Clone)]
pub struct AttestationDraft {
    pub hashes: DocumentHashes,
    pub identity: IdentityBlock,
    pub exclusion: ExclusionZone,
    pub placement: Option<SealPlacement>,
    pub user_url: Option<String>,
}

impl AttestationDraft {
    /// Assemble the unsigned attestation with boundary-assigned service
    /// block and timestamp. The signature is attached afterwards.
    pub fn into_unsigned(self, service: ServiceBlock, timestamp: DateTime<Utc>) -> AttestationData {
        AttestationData {
            version: CURRENT_ATTESTATION_VERSION,
            hashes: HashBlock {
                cryptographic: self.hashes.cryptographic,
                perceptual: self.hashes.perceptual,
            },
            timestamp,
            identity: self.identity,
            service,
            exclusion: self.exclusion,
            placement: self.placement.map(Into::into),
            user_url: self.user_url,
            signature: None,
        }
    }
}

/// A boundary that turns drafts into signed attestations.
#[async_trait]
pub trait AttestationSigner: Send + Sync {
    /// Sign the draft. Implementations must fail hard on any signing
    /// problem; a placeholder signature is never an acceptable fallback.
    async fn sign(&self, draft: AttestationDraft) -> Result<AttestationData>;
}

/// In-process Ed25519 signer for self-hosted and test use.
pub struct LocalSigner {
    service_name: String,
    key_id: String,
    key: SigningKey,
}

impl LocalSigner {
    pub fn new(
        service_name: impl Into<String>,
        key_id: impl Into<String>,
        key: SigningKey,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            key_id: key_id.into(),
            key,
        }
    }

    /// Generate a signer with a fresh random keypair.
    pub fn generate(service_name: impl Into<String>, key_id: impl Into<String>) -> Self {
        Self::new(service_name, key_id, SigningKey::generate(&mut OsRng))
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

#[async_trait]
impl AttestationSigner for LocalSigner {
    async fn sign(&self, draft: AttestationDraft) -> Result<AttestationData> {
        let service = ServiceBlock {
            name: self.service_name.clone(),
            key_id: self.key_id.clone(),
        };
        let mut attestation = draft.into_unsigned(service, Utc::now());
        let message = attestation.signable_bytes()?;
        let signature = self.key.sign(&message);
        attestation.signature = Some(signature.to_bytes().to_vec());

        tracing::debug!(
            key_id = %self.key_id,
            identity = %attestation.identity.identifier,
            "attestation signed locally"
        );
        Ok(attestation)
    }
}

/// Generate a fresh Ed25519 keypair.
pub fn generate_keypair() -> (SigningKey, VerifyingKey) {
    let signing = SigningKey::generate(&mut OsRng);
    let verifying = signing.verifying_key();
    (signing, verifying)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::PerceptualHashes;
    use crate::hash::DEFAULT_FILL_COLOR;

    fn sample_draft() -> AttestationDraft {
        AttestationDraft {
            hashes: DocumentHashes {
                cryptographic: "00".repeat(32),
                perceptual: PerceptualHashes {
                    p: "cXc".into(),
                    d: "enc".into(),
                },
            },
            identity: IdentityBlock {
                provider: "g".into(),
                identifier: "ada@example.com".into(),
            },
            exclusion: ExclusionZone {
                x: 10,
                y: 10,
                width: 100,
                height: 120,
                fill_color: DEFAULT_FILL_COLOR.into(),
            },
            placement: Some(SealPlacement::new(90.0, 90.0, 20.0)),
            user_url: None,
        }
    }

    #[tokio::test]
    async fn test_sign_and_verify() {
        let signer = LocalSigner::generate("qs", "test-key");
        let attestation = signer.sign(sample_draft()).await.unwrap();

        assert_eq!(attestation.service.key_id, "test-key");
        assert!(attestation.signature.is_some());
        assert!(attestation
            .verify_signature(&signer.verifying_key())
            .unwrap());
    }

    #[tokio::test]
    async fn test_tampered_identity_fails_signature() {
        let signer = LocalSigner::generate("qs", "test-key");
        let mut attestation = signer.sign(sample_draft()).await.unwrap();

        attestation.identity.identifier = "mallory@example.com".into();
        assert!(!attestation
            .verify_signature(&signer.verifying_key())
            .unwrap());
        // The hash block is untouched; only authentication is broken
        assert_eq!(attestation.hashes.cryptographic, "00".repeat(32));
    }

    #[tokio::test]
    async fn test_wrong_key_fails_signature() {
        let signer = LocalSigner::generate("qs", "test-key");
        let attestation = signer.sign(sample_draft()).await.unwrap();

        let (_, other_key) = generate_keypair();
        assert!(!attestation.verify_signature(&other_key).unwrap());
    }
}
