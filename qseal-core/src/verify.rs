//! Verification engine.
//!
//! A single verification attempt walks `locating → decoding → hashing →
//! verifying` and terminates in exactly one [`VerificationOutcome`]. The
//! engine is a pure pipeline over an explicit [`VerificationSession`];
//! abandoning an attempt is simply dropping the session, and nothing from
//! one attempt can leak into the next. No step retries internally — a
//! failed attempt requires explicit user action to restart.

use std::collections::HashMap;

use async_trait::async_trait;
use ed25519_dalek::VerifyingKey;

use crate::attestation::{AttestationData, ExclusionZone};
use crate::error::{Result, SealError};
use crate::geometry::{compute_geometry, PixelRect, SealPlacement};
use crate::hash::{perceptual_match, HashProvider, DEFAULT_SIMILARITY_THRESHOLD};
use crate::qr::locate_and_decode;

/// One verification attempt's inputs.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub image_bytes: Vec<u8>,
    /// Manual-assist sub-rectangle to search for the QR code, for when
    /// automatic detection fails.
    pub region: Option<PixelRect>,
}

impl VerificationSession {
    pub fn new(image_bytes: Vec<u8>) -> Self {
        Self {
            image_bytes,
            region: None,
        }
    }

    pub fn with_region(mut self, region: PixelRect) -> Self {
        self.region = Some(region);
        self
    }
}

/// Resolves a public key by the attestation's key id.
///
/// Resolution may be a local lookup ([`StaticKeyResolver`]) or a network
/// call; network failures must surface as [`SealError::NetworkError`] so
/// the engine can classify them as retryable.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    /// `Ok(None)` means the key id is unknown, which is a failed
    /// authentication, not an error.
    async fn resolve(&self, key_id: &str) -> Result<Option<VerifyingKey>>;
}

/// Key resolver over a fixed in-memory key set, for offline verification.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, VerifyingKey>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key_id: impl Into<String>, key: VerifyingKey) -> Self {
        let mut resolver = Self::new();
        resolver.insert(key_id, key);
        resolver
    }

    pub fn insert(&mut self, key_id: impl Into<String>, key: VerifyingKey) {
        self.keys.insert(key_id.into(), key);
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, key_id: &str) -> Result<Option<VerifyingKey>> {
        Ok(self.keys.get(key_id).copied())
    }
}

/// The three independent checks a verification performs. They are never
/// collapsed into a single boolean in the engine itself: an invalid
/// signature with matching content and a valid signature over changed
/// content call for different user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationChecks {
    pub cryptographic_match: bool,
    pub perceptual_match: bool,
    pub signature_valid: bool,
}

impl VerificationChecks {
    /// Strict validity: exact content match and an authentic signature.
    pub fn is_valid(&self) -> bool {
        self.cryptographic_match && self.signature_valid
    }
}

/// Failure classification for attempts that produced no comparison at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyFailure {
    /// Payload absent, unreadable, or structurally invalid.
    MissingData,
    /// Verification backend misconfigured or failing.
    ServerError,
    /// Transient connectivity failure; safe to retry.
    NetworkError,
}

impl VerifyFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingData => "missing_data",
            Self::ServerError => "server_error",
            Self::NetworkError => "network_error",
        }
    }

    /// Recommended next action, surfaced alongside every failure.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::MissingData => {
                "re-scan the document or select the seal area manually; \
                 the document may not be sealed at all"
            }
            Self::ServerError => "the verification backend is unavailable; retry later",
            Self::NetworkError => "connectivity failure; safe to retry",
        }
    }
}

/// Terminal state of one verification attempt.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    /// Exact, byte-for-byte content match.
    Verified {
        attestation: AttestationData,
        checks: VerificationChecks,
    },
    /// Content changed at the byte level but is visually intact —
    /// typically a re-export through a different encoder.
    Modified {
        attestation: AttestationData,
        checks: VerificationChecks,
    },
    /// Content changed both cryptographically and visually.
    HashMismatch {
        attestation: AttestationData,
        checks: VerificationChecks,
    },
    /// The attempt produced no usable comparison.
    Error {
        kind: VerifyFailure,
        message: String,
    },
}

impl VerificationOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Verified { .. } => "verified",
            Self::Modified { .. } => "modified",
            Self::HashMismatch { .. } => "hash_mismatch",
            Self::Error { .. } => "error",
        }
    }

    pub fn checks(&self) -> Option<&VerificationChecks> {
        match self {
            Self::Verified { checks, .. }
            | Self::Modified { checks, .. }
            | Self::HashMismatch { checks, .. } => Some(checks),
            Self::Error { .. } => None,
        }
    }

    pub fn attestation(&self) -> Option<&AttestationData> {
        match self {
            Self::Verified { attestation, .. }
            | Self::Modified { attestation, .. }
            | Self::HashMismatch { attestation, .. } => Some(attestation),
            Self::Error { .. } => None,
        }
    }

    /// Strict validity: exact content match and an authentic signature.
    pub fn is_valid(&self) -> bool {
        self.checks().is_some_and(|c| c.is_valid())
    }

    /// Human-readable summary. Signature state is always reported
    /// explicitly so an unauthenticated attestation never reads as fully
    /// verified.
    pub fn message(&self) -> String {
        match self {
            Self::Verified { checks, .. } => {
                if checks.signature_valid {
                    "Document verified: content is byte-identical to the sealed version and \
                     the attestation signature is authentic."
                        .into()
                } else {
                    "Document content is byte-identical to the sealed version, but the \
                     attestation signature could not be authenticated; treat the identity \
                     claim as unproven."
                        .into()
                }
            }
            Self::Modified { checks, .. } => {
                let sig = if checks.signature_valid {
                    "signature is authentic"
                } else {
                    "signature could not be authenticated"
                };
                format!(
                    "Document was re-encoded since sealing: visual content matches but the \
                     bytes differ; {}.",
                    sig
                )
            }
            Self::HashMismatch { checks, .. } => {
                let sig = if checks.signature_valid {
                    "signature is authentic"
                } else {
                    "signature could not be authenticated"
                };
                format!(
                    "Document content has changed since sealing; {}. Treat the content as \
                     altered.",
                    sig
                )
            }
            Self::Error { kind, message } => format!("{} ({})", message, kind.advice()),
        }
    }
}

/// Internal phase marker, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Locating,
    Decoding,
    Hashing,
    Verifying,
}

/// Orchestrates one verification attempt end to end.
pub struct VerificationEngine<H: HashProvider, R: KeyResolver> {
    hash_provider: H,
    resolver: R,
    similarity_threshold: u32,
}

impl<H: HashProvider, R: KeyResolver> VerificationEngine<H, R> {
    pub fn new(hash_provider: H, resolver: R) -> Self {
        Self {
            hash_provider,
            resolver,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_similarity_threshold(mut self, threshold: u32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Run one attempt to a terminal outcome. Never panics, never retries.
    pub async fn verify(&self, session: VerificationSession) -> VerificationOutcome {
        tracing::debug!(phase = ?Phase::Locating, region = ?session.region, "verification started");
        let payload = match locate_and_decode(&session.image_bytes, session.region) {
            Ok(payload) => payload,
            Err(e) => return missing_data(e),
        };

        tracing::debug!(phase = ?Phase::Decoding, payload_len = payload.len(), "QR located");
        let attestation = match AttestationData::decode(&payload) {
            Ok(attestation) => attestation,
            Err(e) => return missing_data(e),
        };

        tracing::debug!(phase = ?Phase::Hashing, key_id = %attestation.service.key_id, "attestation decoded");
        let (width, height) = match image::load_from_memory(&session.image_bytes) {
            Ok(image) => (image.width(), image.height()),
            Err(e) => {
                return missing_data(SealError::ImageError(format!(
                    "failed to decode image: {}",
                    e
                )))
            }
        };

        let exclusion = match self.effective_exclusion(&attestation, width, height) {
            Ok(zone) => zone,
            Err(e) => return missing_data(e),
        };

        let computed = match self
            .hash_provider
            .compute_hashes(&session.image_bytes, Some(&exclusion))
        {
            Ok(hashes) => hashes,
            Err(e) => return missing_data(e),
        };

        tracing::debug!(phase = ?Phase::Verifying, "hashes recomputed");
        let signature_valid = match self.resolver.resolve(&attestation.service.key_id).await {
            Ok(Some(key)) => match attestation.verify_signature(&key) {
                Ok(valid) => valid,
                Err(e) => {
                    return VerificationOutcome::Error {
                        kind: VerifyFailure::ServerError,
                        message: format!("signature check failed: {}", e),
                    }
                }
            },
            Ok(None) => {
                tracing::warn!(key_id = %attestation.service.key_id, "unknown signing key");
                false
            }
            Err(SealError::NetworkError(e)) => {
                return VerificationOutcome::Error {
                    kind: VerifyFailure::NetworkError,
                    message: format!("could not fetch public key: {}", e),
                }
            }
            Err(e) => {
                return VerificationOutcome::Error {
                    kind: VerifyFailure::ServerError,
                    message: format!("could not resolve public key: {}", e),
                }
            }
        };

        let checks = VerificationChecks {
            cryptographic_match: attestation.hashes.cryptographic == computed.cryptographic,
            perceptual_match: perceptual_match(
                &attestation.hashes.perceptual,
                &computed.perceptual,
                self.similarity_threshold,
            ),
            signature_valid,
        };

        tracing::info!(
            cryptographic_match = checks.cryptographic_match,
            perceptual_match = checks.perceptual_match,
            signature_valid = checks.signature_valid,
            "verification complete"
        );

        if checks.cryptographic_match {
            VerificationOutcome::Verified {
                attestation,
                checks,
            }
        } else if checks.perceptual_match {
            VerificationOutcome::Modified {
                attestation,
                checks,
            }
        } else {
            VerificationOutcome::HashMismatch {
                attestation,
                checks,
            }
        }
    }

    /// The exclusion zone to blank before re-hashing.
    ///
    /// The stored zone is used verbatim when it fits the image. When the
    /// document was re-rasterized at other dimensions, the zone is
    /// re-derived from the attestation's relative placement through the
    /// same geometry calculation as at seal time. A zone that can be
    /// neither used nor re-derived is indistinguishable from tampering and
    /// fails closed.
    fn effective_exclusion(
        &self,
        attestation: &AttestationData,
        width: u32,
        height: u32,
    ) -> Result<ExclusionZone> {
        if attestation.exclusion.rect().fits_within(width, height) {
            return Ok(attestation.exclusion.clone());
        }

        let Some(placement) = attestation.placement else {
            return Err(SealError::InvalidAttestation(
                "exclusion zone lies outside the image and the attestation carries no \
                 placement to re-derive it from"
                    .into(),
            ));
        };

        tracing::debug!(width, height, "re-deriving exclusion zone from relative placement");
        let geometry = compute_geometry(&SealPlacement::from(placement), width, height)?;
        Ok(ExclusionZone::from_rect(
            geometry.exclusion,
            attestation.exclusion.fill_color.clone(),
        ))
    }
}

fn missing_data(error: SealError) -> VerificationOutcome {
    VerificationOutcome::Error {
        kind: VerifyFailure::MissingData,
        message: error.to_string(),
    }
}
