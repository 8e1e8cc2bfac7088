use thiserror::Error;

/// Current attestation payload version. Decoders must fail closed on
/// anything newer.
pub const CURRENT_ATTESTATION_VERSION: u8 = 1;

/// Maximum encoded QR payload size in bytes.
///
/// A version-40 QR code at error-correction level M holds 2331 bytes of
/// binary data; anything near that is unscannable in print. 1800 leaves
/// headroom for the verification-URL prefix.
pub const MAX_QR_PAYLOAD_BYTES: usize = 1800;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("Invalid attestation: {0}")]
    InvalidAttestation(String),

    #[error("Unsupported attestation version {0} (current: {1})")]
    UnsupportedVersion(u8, u8),

    #[error("Attestation payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Signature error: {0}")]
    SignatureError(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Geometry error: {0}")]
    GeometryError(String),

    #[error("QR code error: {0}")]
    QrError(String),

    #[error("Signing service error: {0}")]
    SigningService(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

pub type Result<T> = std::result::Result<T, SealError>;
