//! End-to-end tests for the seal/verify pipelines.
//!
//! These exercise the full flow — geometry, blanked fingerprinting,
//! signing, QR stamping, QR discovery, and result classification — over
//! synthetic documents, including the tamper and re-encode scenarios the
//! product must distinguish.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use qseal_core::{
    compute_geometry, AttestationData, HashProvider, IdentityBlock, ImageHashProvider,
    LocalSigner, SealPipeline, SealPlacement, SealSession, SealedDocument, StaticKeyResolver,
    VerificationEngine, VerificationOutcome, VerificationSession, VerifyFailure,
};

/// Structured test document: gradients plus a checker pattern so the
/// perceptual hashes have features to latch onto.
fn test_document(width: u32, height: u32) -> RgbaImage {
    let mut img = RgbaImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let pattern = if (x / 32 + y / 32) % 2 == 0 { 60 } else { 0 };
        *pixel = Rgba([r.saturating_add(pattern), g, 140, 255]);
    }
    img
}

fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("PNG encoding failed");
    buffer.into_inner()
}

fn identity() -> IdentityBlock {
    IdentityBlock {
        provider: "g".into(),
        identifier: "ada@example.com".into(),
    }
}

/// Seal a test document and return the sealed result plus a resolver
/// holding the signer's public key.
async fn seal_document(
    width: u32,
    height: u32,
    placement: SealPlacement,
) -> (SealedDocument, StaticKeyResolver) {
    let signer = LocalSigner::generate("qs", "test-key-1");
    let resolver = StaticKeyResolver::single("test-key-1", signer.verifying_key());

    let document = png_bytes(&test_document(width, height));
    let session = SealSession::new(document, placement, identity());

    let pipeline = SealPipeline::new(ImageHashProvider, signer);
    let sealed = pipeline.seal(session).await.expect("sealing failed");
    (sealed, resolver)
}

#[tokio::test]
async fn test_full_seal_verify_roundtrip() {
    let (sealed, resolver) = seal_document(1600, 1600, SealPlacement::new(90.0, 90.0, 25.0)).await;

    let engine = VerificationEngine::new(ImageHashProvider, resolver);
    let outcome = engine
        .verify(VerificationSession::new(sealed.image_png.clone()))
        .await;

    match &outcome {
        VerificationOutcome::Verified { checks, attestation } => {
            assert!(checks.cryptographic_match);
            assert!(checks.perceptual_match);
            assert!(checks.signature_valid);
            assert_eq!(attestation.identity.identifier, "ada@example.com");
            assert_eq!(attestation.service.key_id, "test-key-1");
        }
        other => panic!("expected Verified, got {:?}", other.status()),
    }
    assert!(outcome.is_valid());
}

/// Sealing a 1000x800 image at position (90%, 90%), size 20%: the
/// exclusion rectangle re-derived from the decoded attestation on the same
/// dimensions must be identical to the one used at seal time, and
/// re-hashing with it blanked must reproduce the stored hash.
#[tokio::test]
async fn test_exclusion_zone_roundtrip_1000x800() {
    let (sealed, _) = seal_document(1000, 800, SealPlacement::new(90.0, 90.0, 20.0)).await;

    // The attestation round-trips through its QR payload
    let attestation = AttestationData::decode(&sealed.payload).unwrap();
    assert_eq!(attestation, sealed.attestation);

    // Re-deriving the geometry from the decoded relative placement on the
    // same dimensions yields the identical rectangle
    let placement = SealPlacement::from(attestation.placement.unwrap());
    let rederived = compute_geometry(&placement, 1000, 800).unwrap();
    assert_eq!(rederived.exclusion, attestation.exclusion.rect());
    assert_eq!(rederived, sealed.geometry);

    // Re-hashing the sealed image with that rectangle blanked reproduces
    // the stored cryptographic hash
    let recomputed = ImageHashProvider
        .compute_hashes(&sealed.image_png, Some(&attestation.exclusion))
        .unwrap();
    assert_eq!(recomputed.cryptographic, attestation.hashes.cryptographic);
    assert_eq!(recomputed.perceptual, attestation.hashes.perceptual);
}

#[tokio::test]
async fn test_pixel_flip_outside_zone_breaks_cryptographic_match() {
    let (sealed, resolver) = seal_document(1600, 1600, SealPlacement::new(90.0, 90.0, 25.0)).await;

    let mut pixels = image::load_from_memory(&sealed.image_png)
        .unwrap()
        .to_rgba8();
    // Top-left corner is far from the bottom-right seal
    let px = pixels.get_pixel(5, 5).0;
    pixels.put_pixel(5, 5, Rgba([px[0] ^ 0xFF, px[1], px[2], 255]));

    let engine = VerificationEngine::new(ImageHashProvider, resolver);
    let outcome = engine
        .verify(VerificationSession::new(png_bytes(&pixels)))
        .await;

    let checks = outcome.checks().expect("expected a comparison outcome");
    assert!(!checks.cryptographic_match);
    assert!(checks.signature_valid);
    assert_ne!(outcome.status(), "verified");
}

#[tokio::test]
async fn test_pixel_flip_inside_zone_does_not_affect_hashes() {
    let (sealed, resolver) = seal_document(1600, 1600, SealPlacement::new(90.0, 90.0, 25.0)).await;

    let mut pixels = image::load_from_memory(&sealed.image_png)
        .unwrap()
        .to_rgba8();
    // Bottom edge of the exclusion zone: inside the blanked area, but in
    // the caption band where it cannot corrupt the QR modules
    let zone = sealed.attestation.exclusion.rect();
    pixels.put_pixel(
        zone.x + 2,
        zone.y + zone.height - 2,
        Rgba([255, 0, 0, 255]),
    );

    let engine = VerificationEngine::new(ImageHashProvider, resolver);
    let outcome = engine
        .verify(VerificationSession::new(png_bytes(&pixels)))
        .await;

    match outcome {
        VerificationOutcome::Verified { checks, .. } => {
            assert!(checks.cryptographic_match);
            assert!(checks.signature_valid);
        }
        other => panic!("expected Verified, got {:?}", other.status()),
    }
}

#[tokio::test]
async fn test_lossy_reencode_classified_as_modified() {
    let (sealed, resolver) = seal_document(1600, 1600, SealPlacement::new(90.0, 90.0, 25.0)).await;

    // Re-export through a lossy encoder: visually identical, byte-different
    let decoded = image::load_from_memory(&sealed.image_png).unwrap();
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, 92);
    DynamicImage::ImageRgb8(decoded.to_rgb8())
        .write_with_encoder(encoder)
        .expect("JPEG encoding failed");

    let engine = VerificationEngine::new(ImageHashProvider, resolver);
    let outcome = engine
        .verify(VerificationSession::new(buffer.into_inner()))
        .await;

    match outcome {
        VerificationOutcome::Modified { checks, .. } => {
            assert!(!checks.cryptographic_match);
            assert!(checks.perceptual_match);
            assert!(checks.signature_valid);
        }
        other => panic!("expected Modified, got {:?}", other.status()),
    }
}

/// Downscaling re-rasterizes the document: the stored exclusion zone no
/// longer fits the image, so the engine must re-derive it from the
/// attestation's relative placement before re-hashing. Nearest-neighbor
/// keeps the QR modules crisp enough to decode at the smaller size.
#[tokio::test]
async fn test_downscaled_image_rederives_zone_and_classifies_modified() {
    let (sealed, resolver) = seal_document(1600, 1600, SealPlacement::new(90.0, 90.0, 25.0)).await;

    // The bottom-right zone from the 1600x1600 original cannot fit the
    // downscaled image, forcing the re-derivation path
    assert!(!sealed.attestation.exclusion.rect().fits_within(1200, 1200));

    let resized = image::load_from_memory(&sealed.image_png)
        .unwrap()
        .resize_exact(1200, 1200, image::imageops::FilterType::Nearest)
        .to_rgba8();

    let engine = VerificationEngine::new(ImageHashProvider, resolver);
    let outcome = engine
        .verify(VerificationSession::new(png_bytes(&resized)))
        .await;

    match outcome {
        VerificationOutcome::Modified { checks, .. } => {
            assert!(!checks.cryptographic_match);
            assert!(checks.perceptual_match);
            assert!(checks.signature_valid);
        }
        other => panic!("expected Modified, got {:?}", other.status()),
    }
}

#[tokio::test]
async fn test_tampered_identity_breaks_signature_only() {
    let (sealed, resolver) = seal_document(1600, 1600, SealPlacement::new(90.0, 90.0, 25.0)).await;

    // Forge the payload: swap the identity, keep everything else
    let mut forged = sealed.attestation.clone();
    forged.identity.identifier = "mallory@example.com".into();
    let forged_payload = forged.encode().unwrap();

    // Stamp the forged payload onto a fresh copy of the original document
    // using the same geometry
    let mut pixels = test_document(1600, 1600);
    qseal_core::stamp_seal(
        &mut pixels,
        &forged_payload,
        &sealed.geometry,
        &forged.exclusion.fill_color,
    )
    .unwrap();

    let engine = VerificationEngine::new(ImageHashProvider, resolver);
    let outcome = engine
        .verify(VerificationSession::new(png_bytes(&pixels)))
        .await;

    // Content still matches byte-for-byte, but the attestation cannot be
    // authenticated — the two checks stay independent
    match outcome {
        VerificationOutcome::Verified { checks, .. } => {
            assert!(checks.cryptographic_match);
            assert!(!checks.signature_valid);
        }
        other => panic!("expected Verified with invalid signature, got {:?}", other.status()),
    }
}

#[tokio::test]
async fn test_unknown_key_reported_as_unauthenticated() {
    let (sealed, _) = seal_document(1600, 1600, SealPlacement::new(90.0, 90.0, 25.0)).await;

    let engine = VerificationEngine::new(ImageHashProvider, StaticKeyResolver::new());
    let outcome = engine
        .verify(VerificationSession::new(sealed.image_png))
        .await;

    let checks = outcome.checks().expect("expected a comparison outcome");
    assert!(checks.cryptographic_match);
    assert!(!checks.signature_valid);
    assert!(!outcome.is_valid());
}

#[tokio::test]
async fn test_unsealed_image_is_missing_data() {
    let engine = VerificationEngine::new(ImageHashProvider, StaticKeyResolver::new());
    let outcome = engine
        .verify(VerificationSession::new(png_bytes(&test_document(640, 640))))
        .await;

    match outcome {
        VerificationOutcome::Error { kind, .. } => assert_eq!(kind, VerifyFailure::MissingData),
        other => panic!("expected Error, got {:?}", other.status()),
    }
}

#[tokio::test]
async fn test_repeated_attempts_are_independent() {
    let (sealed, resolver) = seal_document(1600, 1600, SealPlacement::new(10.0, 10.0, 25.0)).await;
    let engine = VerificationEngine::new(ImageHashProvider, resolver);

    // A failed attempt must not leak anything into the next one
    let failed = engine
        .verify(VerificationSession::new(b"not an image".to_vec()))
        .await;
    assert_eq!(failed.status(), "error");

    let outcome = engine
        .verify(VerificationSession::new(sealed.image_png))
        .await;
    assert_eq!(outcome.status(), "verified");
}
