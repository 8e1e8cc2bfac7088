//! Sealing pipeline.
//!
//! Orchestrates one seal action over an explicit [`SealSession`]: compute
//! the seal geometry, fingerprint the document with the exclusion zone
//! blanked, have the signing boundary produce the attestation, then stamp
//! the encoded QR payload into the computed rectangle. Every step is a
//! function of the session; there is no ambient state to leak between
//! operations.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::attestation::{AttestationData, ExclusionZone, IdentityBlock};
use crate::error::{Result, SealError};
use crate::geometry::{compute_geometry, SealGeometry, SealPlacement};
use crate::hash::{DocumentHashes, HashProvider, DEFAULT_FILL_COLOR};
use crate::qr::stamp_seal;
use crate::signer::{AttestationDraft, AttestationSigner};

/// Everything one seal action needs, carried explicitly.
#[derive(Debug, Clone)]
pub struct SealSession {
    pub image_bytes: Vec<u8>,
    pub placement: SealPlacement,
    pub identity: IdentityBlock,
    pub fill_color: String,
    pub user_url: Option<String>,
}

impl SealSession {
    pub fn new(image_bytes: Vec<u8>, placement: SealPlacement, identity: IdentityBlock) -> Self {
        Self {
            image_bytes,
            placement,
            identity,
            fill_color: DEFAULT_FILL_COLOR.into(),
            user_url: None,
        }
    }

    pub fn with_fill_color(mut self, fill_color: impl Into<String>) -> Self {
        self.fill_color = fill_color.into();
        self
    }

    pub fn with_user_url(mut self, url: impl Into<String>) -> Self {
        self.user_url = Some(url.into());
        self
    }
}

/// The result of a seal action.
#[derive(Debug, Clone)]
pub struct SealedDocument {
    /// PNG-encoded sealed image. Always PNG: a lossy container would
    /// change pixels outside the exclusion zone and break the fingerprint.
    pub image_png: Vec<u8>,
    /// The signed attestation embedded in the QR code.
    pub attestation: AttestationData,
    /// The encoded QR payload.
    pub payload: String,
    /// Pixel geometry the seal was stamped with.
    pub geometry: SealGeometry,
    /// Fingerprint of the untouched document, before blanking. Not part
    /// of the attestation; useful for diagnostics and audit logs.
    pub draft_hashes: DocumentHashes,
}

/// One seal action: geometry → blanked fingerprint → signature → stamp.
pub struct SealPipeline<H: HashProvider, S: AttestationSigner> {
    hash_provider: H,
    signer: S,
}

impl<H: HashProvider, S: AttestationSigner> SealPipeline<H, S> {
    pub fn new(hash_provider: H, signer: S) -> Self {
        Self {
            hash_provider,
            signer,
        }
    }

    pub async fn seal(&self, session: SealSession) -> Result<SealedDocument> {
        let image = image::load_from_memory(&session.image_bytes)
            .map_err(|e| SealError::ImageError(format!("failed to decode image: {}", e)))?;
        let (width, height) = (image.width(), image.height());

        let geometry = compute_geometry(&session.placement, width, height)?;
        let exclusion = ExclusionZone::from_rect(geometry.exclusion, session.fill_color.clone());

        // Draft fingerprint of the document as uploaded, then the stored
        // fingerprint with the seal area blanked. Only the latter is
        // signed; it is what verification re-derives.
        let draft_hashes = self.hash_provider.compute_hashes(&session.image_bytes, None)?;
        let hashes = self
            .hash_provider
            .compute_hashes(&session.image_bytes, Some(&exclusion))?;

        let draft = AttestationDraft {
            hashes,
            identity: session.identity,
            exclusion: exclusion.clone(),
            placement: Some(session.placement),
            user_url: session.user_url,
        };

        let attestation = self.signer.sign(draft).await?;
        let payload = attestation.encode()?;

        let mut pixels = image.to_rgba8();
        stamp_seal(&mut pixels, &payload, &geometry, &exclusion.fill_color)?;

        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(pixels)
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| SealError::ImageError(format!("failed to encode sealed image: {}", e)))?;

        tracing::info!(
            width,
            height,
            payload_len = payload.len(),
            key_id = %attestation.service.key_id,
            "document sealed"
        );

        Ok(SealedDocument {
            image_png: buffer.into_inner(),
            attestation,
            payload,
            geometry,
            draft_hashes,
        })
    }
}
