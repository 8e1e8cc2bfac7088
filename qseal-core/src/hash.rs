//! Document fingerprinting.
//!
//! Dual-hash scheme: an exact SHA3-256 digest over the decoded pixel data
//! (so the digest survives container changes but flags any pixel edit) and
//! two perceptual hashes computed with different algorithms (DCT and
//! gradient), each tolerant to a different class of visual transformation.
//!
//! The exclusion rectangle is blanked to the zone's fill color before any
//! hash is computed, which makes every hash independent of the rendered
//! seal itself. All functions here are pure: identical bytes plus an
//! identical rectangle always produce identical hashes.

use image::{DynamicImage, Rgba, RgbaImage};
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use sha3::{Digest, Sha3_256};

use crate::attestation::{ExclusionZone, PerceptualHashes};
use crate::error::{Result, SealError};
use crate::geometry::PixelRect;

/// Default fill color for the blanked seal area (hex, no '#').
pub const DEFAULT_FILL_COLOR: &str = "ffffff";

/// Maximum Hamming distance (of 64 bits) at which a perceptual hash still
/// counts as matching.
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 10;

/// The complete fingerprint of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHashes {
    /// Hex-encoded SHA3-256 over dimensions and RGBA pixel data.
    pub cryptographic: String,
    /// Base64-encoded perceptual hashes.
    pub perceptual: PerceptualHashes,
}

/// Pluggable hashing primitive.
///
/// The verification and sealing pipelines only ever talk to this trait, so
/// the concrete algorithms can be swapped without touching codec, geometry,
/// or orchestration logic.
pub trait HashProvider: Send + Sync {
    /// Compute the document fingerprint, blanking the exclusion rectangle
    /// first when one is given.
    fn compute_hashes(
        &self,
        image_bytes: &[u8],
        exclusion: Option<&ExclusionZone>,
    ) -> Result<DocumentHashes>;
}

/// Default [`HashProvider`] over raster images (PNG, JPEG, GIF, WebP).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageHashProvider;

impl HashProvider for ImageHashProvider {
    fn compute_hashes(
        &self,
        image_bytes: &[u8],
        exclusion: Option<&ExclusionZone>,
    ) -> Result<DocumentHashes> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| SealError::ImageError(format!("failed to decode image: {}", e)))?;
        let mut pixels = image.to_rgba8();

        if let Some(zone) = exclusion {
            let rect = zone.rect();
            if !rect.fits_within(pixels.width(), pixels.height()) {
                return Err(SealError::HashError(format!(
                    "exclusion zone {}x{}+{}+{} lies outside a {}x{} image",
                    rect.width,
                    rect.height,
                    rect.x,
                    rect.y,
                    pixels.width(),
                    pixels.height()
                )));
            }
            let fill = parse_fill_color(&zone.fill_color)?;
            blank_region(&mut pixels, rect, fill);
        }

        Ok(hash_pixels(pixels))
    }
}

/// Hash an RGBA buffer that has already had its exclusion zone blanked.
fn hash_pixels(pixels: RgbaImage) -> DocumentHashes {
    let mut hasher = Sha3_256::new();
    hasher.update(pixels.width().to_be_bytes());
    hasher.update(pixels.height().to_be_bytes());
    hasher.update(pixels.as_raw());
    let cryptographic = hex::encode(hasher.finalize());

    let image = DynamicImage::ImageRgba8(pixels);
    let p = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .to_hasher()
        .hash_image(&image)
        .to_base64();
    let d = HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .to_hasher()
        .hash_image(&image)
        .to_base64();

    DocumentHashes {
        cryptographic,
        perceptual: PerceptualHashes { p, d },
    }
}

/// Overwrite a rectangle with a solid fill color.
pub fn blank_region(pixels: &mut RgbaImage, rect: PixelRect, fill: Rgba<u8>) {
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            pixels.put_pixel(x, y, fill);
        }
    }
}

/// Parse a `rrggbb` hex fill color (no '#') into an opaque RGBA pixel.
pub fn parse_fill_color(hex_color: &str) -> Result<Rgba<u8>> {
    let bytes = hex::decode(hex_color)
        .map_err(|e| SealError::HashError(format!("invalid fill color '{}': {}", hex_color, e)))?;
    let [r, g, b] = bytes[..].try_into().map_err(|_| {
        SealError::HashError(format!(
            "invalid fill color '{}': expected 6 hex digits",
            hex_color
        ))
    })?;
    Ok(Rgba([r, g, b, 0xFF]))
}

/// Hamming distance between two base64-encoded perceptual hashes.
///
/// Returns `None` when either hash fails to parse or the bit widths
/// differ; callers must treat that as a non-match, never as zero.
pub fn perceptual_distance(a: &str, b: &str) -> Option<u32> {
    let a: ImageHash = ImageHash::from_base64(a).ok()?;
    let b: ImageHash = ImageHash::from_base64(b).ok()?;
    if a.as_bytes().len() != b.as_bytes().len() {
        return None;
    }
    Some(a.dist(&b))
}

/// Whether both stored perceptual hashes match the recomputed ones within
/// the threshold. Both algorithms must agree; a single matching hash is
/// not sufficient.
pub fn perceptual_match(
    stored: &PerceptualHashes,
    computed: &PerceptualHashes,
    threshold: u32,
) -> bool {
    matches!(perceptual_distance(&stored.p, &computed.p), Some(d) if d <= threshold)
        && matches!(perceptual_distance(&stored.d, &computed.d), Some(d) if d <= threshold)
}
