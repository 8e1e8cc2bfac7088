//! Attestation data model and QR-safe codec.
//!
//! The attestation is the signed claim binding a document fingerprint, a
//! signing timestamp, and an authenticated identity. Field names are kept
//! to one or two characters because the encoded payload must fit a
//! scannable QR code; the serde renames below define the wire format.
//!
//! Encoding is versioned, deterministic CBOR wrapped in URL-safe base64.
//! The canonical to-be-signed view is the same CBOR serialization with the
//! signature omitted, so sign and verify operate over identical bytes.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SealError, CURRENT_ATTESTATION_VERSION, MAX_QR_PAYLOAD_BYTES};
use crate::geometry::{PixelRect, SealPlacement};

/// Hash block: one exact cryptographic digest plus two independent
/// perceptual hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashBlock {
    /// Cryptographic hash (hex SHA3-256) of the document with the seal
    /// area blanked.
    #[serde(rename = "c")]
    pub cryptographic: String,
    /// Perceptual hashes, tolerant of lossy re-encoding.
    #[serde(rename = "p")]
    pub perceptual: PerceptualHashes,
}

/// Two perceptual hashes computed with different algorithms; no single
/// algorithm is robust to every transformation class, so both must agree
/// for a perceptual match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptualHashes {
    /// DCT-based hash (robust to compression and color-space drift).
    pub p: String,
    /// Gradient-based hash (robust to brightness and scaling changes).
    pub d: String,
}

/// Identity block asserted by the auth broker at sign time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityBlock {
    /// Short provider code (for example "g" for Google, "ms" for Microsoft).
    #[serde(rename = "p")]
    pub provider: String,
    /// Provider-asserted identifier, typically an email address.
    #[serde(rename = "id")]
    pub identifier: String,
}

/// Signing service block, set exclusively by the signing boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBlock {
    /// Short service name.
    #[serde(rename = "n")]
    pub name: String,
    /// Identifier of the public key that verifies the signature.
    #[serde(rename = "k")]
    pub key_id: String,
}

/// The exact rectangle blanked before the cryptographic hash was computed,
/// plus the fill color used to blank it. Must reproduce the seal-time
/// rectangle bit for bit; any mismatch at verify time reads as tampering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionZone {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
    /// Fill color as hex without '#', for example "ffffff".
    #[serde(rename = "f")]
    pub fill_color: String,
}

impl ExclusionZone {
    pub fn from_rect(rect: PixelRect, fill_color: impl Into<String>) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            fill_color: fill_color.into(),
        }
    }

    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.width, self.height)
    }
}

/// Relative placement the seal was stamped with, carried so the exclusion
/// zone can be re-derived when the document has been re-rasterized at
/// different pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementBlock {
    pub x: f64,
    pub y: f64,
    pub s: f64,
}

impl From<SealPlacement> for PlacementBlock {
    fn from(p: SealPlacement) -> Self {
        Self {
            x: p.x_pct,
            y: p.y_pct,
            s: p.size_pct,
        }
    }
}

impl From<PlacementBlock> for SealPlacement {
    fn from(p: PlacementBlock) -> Self {
        SealPlacement::new(p.x, p.y, p.s)
    }
}

/// The attestation package embedded in the QR code.
///
/// Created once per seal action and immutable thereafter. `t`, `i` as
/// countersigned, and `s` are assigned by the signing boundary; a decoded
/// attestation must never be re-signed client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationData {
    /// Payload format version.
    #[serde(rename = "v")]
    pub version: u8,
    #[serde(rename = "h")]
    pub hashes: HashBlock,
    /// Signing timestamp, assigned by the signing boundary.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "i")]
    pub identity: IdentityBlock,
    #[serde(rename = "s")]
    pub service: ServiceBlock,
    #[serde(rename = "e")]
    pub exclusion: ExclusionZone,
    #[serde(rename = "g", skip_serializing_if = "Option::is_none", default)]
    pub placement: Option<PlacementBlock>,
    /// Optional free-form URL supplied by the user.
    #[serde(rename = "u", skip_serializing_if = "Option::is_none", default)]
    pub user_url: Option<String>,
    /// Ed25519 signature over the canonical serialization of every field
    /// above. Absent on the unsigned draft.
    #[serde(rename = "sig", skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<Vec<u8>>,
}

/// Borrowed view of the to-be-signed fields. Field order and renames must
/// stay identical to [`AttestationData`] minus `sig`.
#[derive(Serialize)]
struct SignableView<'a> {
    #[serde(rename = "v")]
    version: u8,
    #[serde(rename = "h")]
    hashes: &'a HashBlock,
    #[serde(rename = "t")]
    timestamp: &'a DateTime<Utc>,
    #[serde(rename = "i")]
    identity: &'a IdentityBlock,
    #[serde(rename = "s")]
    service: &'a ServiceBlock,
    #[serde(rename = "e")]
    exclusion: &'a ExclusionZone,
    #[serde(rename = "g", skip_serializing_if = "Option::is_none")]
    placement: &'a Option<PlacementBlock>,
    #[serde(rename = "u", skip_serializing_if = "Option::is_none")]
    user_url: &'a Option<String>,
}

impl AttestationData {
    /// Canonical CBOR serialization of everything except the signature.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        let view = SignableView {
            version: self.version,
            hashes: &self.hashes,
            timestamp: &self.timestamp,
            identity: &self.identity,
            service: &self.service,
            exclusion: &self.exclusion,
            placement: &self.placement,
            user_url: &self.user_url,
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&view, &mut bytes)
            .map_err(|e| SealError::SerializationError(e.to_string()))?;
        Ok(bytes)
    }

    /// Serialize to the URL-safe compact string embedded in the QR code.
    pub fn encode(&self) -> Result<String> {
        let mut cbor = Vec::new();
        ciborium::into_writer(self, &mut cbor)
            .map_err(|e| SealError::SerializationError(e.to_string()))?;

        if cbor.len() > MAX_QR_PAYLOAD_BYTES {
            return Err(SealError::PayloadTooLarge {
                size: cbor.len(),
                max: MAX_QR_PAYLOAD_BYTES,
            });
        }

        Ok(URL_SAFE_NO_PAD.encode(&cbor))
    }

    /// Parse a QR payload back into an attestation.
    ///
    /// Accepts either the bare payload or a verification URL ending in
    /// `/v/<payload>`. Fails closed on payloads newer than
    /// [`CURRENT_ATTESTATION_VERSION`] and on structurally valid but
    /// semantically incomplete attestations.
    pub fn decode(payload: &str) -> Result<Self> {
        let payload = extract_payload(payload);

        let cbor = URL_SAFE_NO_PAD
            .decode(payload.as_bytes())
            .map_err(|e| SealError::InvalidAttestation(format!("invalid base64: {}", e)))?;

        let data: AttestationData = ciborium::from_reader(cbor.as_slice())
            .map_err(|e| SealError::InvalidAttestation(format!("invalid CBOR: {}", e)))?;

        if data.version > CURRENT_ATTESTATION_VERSION {
            return Err(SealError::UnsupportedVersion(
                data.version,
                CURRENT_ATTESTATION_VERSION,
            ));
        }

        data.check_complete()?;
        Ok(data)
    }

    /// Shape checks on a decoded attestation: every block the verifier
    /// relies on must be present and non-empty.
    fn check_complete(&self) -> Result<()> {
        let missing = if self.hashes.cryptographic.is_empty() {
            Some("cryptographic hash")
        } else if self.hashes.perceptual.p.is_empty() || self.hashes.perceptual.d.is_empty() {
            Some("perceptual hashes")
        } else if self.identity.provider.is_empty() || self.identity.identifier.is_empty() {
            Some("identity block")
        } else if self.service.key_id.is_empty() {
            Some("signing key id")
        } else if self.exclusion.width == 0 || self.exclusion.height == 0 {
            Some("exclusion zone")
        } else {
            None
        };

        match missing {
            Some(what) => Err(SealError::InvalidAttestation(format!(
                "incomplete attestation: missing {}",
                what
            ))),
            None => Ok(()),
        }
    }

    /// Verify the signature against the given public key.
    ///
    /// Returns `Ok(false)` for an absent, malformed, or non-matching
    /// signature; errors are reserved for failures to reconstruct the
    /// signable bytes.
    pub fn verify_signature(&self, key: &VerifyingKey) -> Result<bool> {
        let Some(ref sig_bytes) = self.signature else {
            return Ok(false);
        };
        let Ok(signature) = Signature::from_slice(sig_bytes) else {
            return Ok(false);
        };
        let message = self.signable_bytes()?;
        Ok(key.verify(&message, &signature).is_ok())
    }
}

/// Strip a verification-URL wrapper (`…/v/<payload>`) down to the bare
/// payload. Bare payloads pass through unchanged.
pub fn extract_payload(input: &str) -> &str {
    let input = input.trim();
    match input.rfind("/v/") {
        Some(idx) => &input[idx + 3..],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_attestation() -> AttestationData {
        AttestationData {
            version: CURRENT_ATTESTATION_VERSION,
            hashes: HashBlock {
                cryptographic: "ab".repeat(32),
                perceptual: PerceptualHashes {
                    p: "cWFzZGY".into(),
                    d: "enhjdg".into(),
                },
            },
            timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap(),
            identity: IdentityBlock {
                provider: "g".into(),
                identifier: "ada@example.com".into(),
            },
            service: ServiceBlock {
                name: "qs".into(),
                key_id: "k-2026-01".into(),
            },
            exclusion: ExclusionZone {
                x: 733,
                y: 521,
                width: 168,
                height: 203,
                fill_color: "ffffff".into(),
            },
            placement: Some(PlacementBlock {
                x: 90.0,
                y: 90.0,
                s: 20.0,
            }),
            user_url: None,
            signature: None,
        }
    }

    #[test]
    fn test_codec_roundtrip() {
        let mut attestation = sample_attestation();
        attestation.signature = Some(vec![7u8; 64]);
        attestation.user_url = Some("https://example.com/doc".into());

        let encoded = attestation.encode().unwrap();
        // URL-safe alphabet only
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let decoded = AttestationData::decode(&encoded).unwrap();
        assert_eq!(decoded, attestation);
    }

    #[test]
    fn test_decode_accepts_verification_url() {
        let attestation = sample_attestation();
        let encoded = attestation.encode().unwrap();
        let url = format!("https://qseal.example.com/v/{}", encoded);
        let decoded = AttestationData::decode(&url).unwrap();
        assert_eq!(decoded, attestation);
    }

    #[test]
    fn test_decode_rejects_newer_version() {
        let mut attestation = sample_attestation();
        attestation.version = CURRENT_ATTESTATION_VERSION + 1;
        let encoded = attestation.encode().unwrap();

        match AttestationData::decode(&encoded) {
            Err(SealError::UnsupportedVersion(v, current)) => {
                assert_eq!(v, CURRENT_ATTESTATION_VERSION + 1);
                assert_eq!(current, CURRENT_ATTESTATION_VERSION);
            }
            other => panic!("expected UnsupportedVersion, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(AttestationData::decode("!!!not base64!!!").is_err());
        // Valid base64, not CBOR
        assert!(AttestationData::decode(&URL_SAFE_NO_PAD.encode(b"hello world")).is_err());
    }

    #[test]
    fn test_decode_rejects_incomplete_attestation() {
        let mut attestation = sample_attestation();
        attestation.identity.identifier.clear();
        let encoded = attestation.encode().unwrap();
        match AttestationData::decode(&encoded) {
            Err(SealError::InvalidAttestation(msg)) => assert!(msg.contains("identity")),
            other => panic!("expected InvalidAttestation, got {:?}", other),
        }
    }

    #[test]
    fn test_signable_bytes_exclude_signature() {
        let mut attestation = sample_attestation();
        let unsigned = attestation.signable_bytes().unwrap();
        attestation.signature = Some(vec![1u8; 64]);
        let signed = attestation.signable_bytes().unwrap();
        assert_eq!(unsigned, signed);
    }

    #[test]
    fn test_signable_bytes_change_with_identity() {
        let attestation = sample_attestation();
        let mut tampered = attestation.clone();
        tampered.identity.identifier = "mallory@example.com".into();
        assert_ne!(
            attestation.signable_bytes().unwrap(),
            tampered.signable_bytes().unwrap()
        );
    }

    #[test]
    fn test_extract_payload() {
        assert_eq!(extract_payload("abc123"), "abc123");
        assert_eq!(extract_payload("https://x.test/v/abc123"), "abc123");
        assert_eq!(extract_payload("  abc123\n"), "abc123");
    }

    #[test]
    fn test_payload_size_guard() {
        let mut attestation = sample_attestation();
        attestation.user_url = Some("x".repeat(MAX_QR_PAYLOAD_BYTES));
        match attestation.encode() {
            Err(SealError::PayloadTooLarge { size, max }) => {
                assert!(size > max);
            }
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }
}
