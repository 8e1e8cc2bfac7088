//! qseal-core - Attestation and verification engine for QR-sealed documents.
//!
//! Produces a portable, offline-verifiable proof that a document existed in
//! an exact byte/visual form, bound to an authenticated identity at a point
//! in time, encoded entirely inside a QR code stamped onto the document.
//! Verifying a sealed document needs only the QR payload and a public key;
//! no server round trip is required.
//!
//! # Components
//!
//! - [`hash`]: dual-hash fingerprinting (exact SHA3-256 over pixels plus
//!   two perceptual hashes tolerant of lossy re-encoding)
//! - [`attestation`]: the compact attestation data model and its QR-safe,
//!   versioned codec
//! - [`geometry`]: the pixel-exact placement/exclusion calculator shared
//!   by seal and verify paths
//! - [`signer`]: the signing boundary abstraction and a local Ed25519 signer
//! - [`seal`] / [`verify`]: the two orchestration pipelines
//!
//! # Example
//!
//! ```no_run
//! use qseal_core::{
//!     IdentityBlock, ImageHashProvider, LocalSigner, SealPipeline, SealPlacement,
//!     SealSession, StaticKeyResolver, VerificationEngine, VerificationSession,
//! };
//!
//! # async fn example() -> qseal_core::Result<()> {
//! let signer = LocalSigner::generate("qs", "dev-key");
//! let resolver = StaticKeyResolver::single("dev-key", signer.verifying_key());
//!
//! let identity = IdentityBlock {
//!     provider: "g".into(),
//!     identifier: "ada@example.com".into(),
//! };
//! let document = std::fs::read("contract.png").unwrap();
//! let session = SealSession::new(document, SealPlacement::new(90.0, 90.0, 20.0), identity);
//!
//! let pipeline = SealPipeline::new(ImageHashProvider, signer);
//! let sealed = pipeline.seal(session).await?;
//!
//! let engine = VerificationEngine::new(ImageHashProvider, resolver);
//! let outcome = engine
//!     .verify(VerificationSession::new(sealed.image_png))
//!     .await;
//! assert!(outcome.is_valid());
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod error;
pub mod geometry;
pub mod hash;
pub mod qr;
pub mod seal;
pub mod signer;
pub mod verify;

// Re-export main types for convenience
pub use attestation::{
    extract_payload, AttestationData, ExclusionZone, HashBlock, IdentityBlock, PerceptualHashes,
    PlacementBlock, ServiceBlock,
};
pub use error::{Result, SealError, CURRENT_ATTESTATION_VERSION, MAX_QR_PAYLOAD_BYTES};
pub use geometry::{
    compute_geometry, PixelRect, SealGeometry, SealPlacement, MAX_SIZE_PCT, MIN_SIZE_PCT,
};
pub use hash::{
    perceptual_distance, perceptual_match, DocumentHashes, HashProvider, ImageHashProvider,
    DEFAULT_FILL_COLOR, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use qr::{locate_and_decode, stamp_seal};
pub use seal::{SealPipeline, SealSession, SealedDocument};
pub use signer::{generate_keypair, AttestationDraft, AttestationSigner, LocalSigner};
pub use verify::{
    KeyResolver, StaticKeyResolver, VerificationChecks, VerificationEngine, VerificationOutcome,
    VerificationSession, VerifyFailure,
};
