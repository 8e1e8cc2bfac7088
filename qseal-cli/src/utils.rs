//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use qseal_core::{generate_keypair, PixelRect};

/// Key file format for local signing and offline verification.
///
/// The private seed is optional so a public-only copy of the same file can
/// be handed to verifiers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    /// Key identifier embedded in attestations signed with this key
    pub key_id: String,
    /// Base64-encoded 32-byte Ed25519 seed; absent in public-only files
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub private_key: Option<String>,
    /// Base64-encoded 32-byte Ed25519 public key
    pub public_key: String,
}

impl KeyFile {
    /// Generate a fresh keypair. The key id is derived from the public key
    /// so two generated files never collide.
    pub fn generate() -> Self {
        let (signing, verifying) = generate_keypair();
        let public_bytes = verifying.to_bytes();
        Self {
            key_id: format!("local-{}", hex::encode(&public_bytes[..4])),
            private_key: Some(BASE64.encode(signing.to_bytes())),
            public_key: BASE64.encode(public_bytes),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse key file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize key file")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write key file: {}", path.display()))
    }

    /// The private signing key, required for local sealing.
    pub fn signing_key(&self) -> Result<SigningKey> {
        let encoded = self
            .private_key
            .as_ref()
            .context("key file holds no private key; it is a public-only file")?;
        let bytes = BASE64
            .decode(encoded)
            .context("invalid base64 in private key")?;
        let seed: [u8; 32] = bytes[..]
            .try_into()
            .map_err(|_| anyhow::anyhow!("private key must be 32 bytes"))?;
        Ok(SigningKey::from_bytes(&seed))
    }

    /// The public verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let bytes = BASE64
            .decode(&self.public_key)
            .context("invalid base64 in public key")?;
        let raw: [u8; 32] = bytes[..]
            .try_into()
            .map_err(|_| anyhow::anyhow!("public key must be 32 bytes"))?;
        VerifyingKey::from_bytes(&raw).context("invalid Ed25519 public key")
    }
}

/// Build the sealed output path from the original file path.
///
/// Transforms `doc.png` into `doc.sealed.png`.
pub fn build_sealed_path(file: &Path) -> PathBuf {
    file.with_extension("sealed.png")
}

/// Parse an `x,y,width,height` pixel region argument.
pub fn parse_region(value: &str) -> Result<PixelRect> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        bail!("region must be four comma-separated integers: x,y,width,height");
    }
    let mut numbers = [0u32; 4];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .with_context(|| format!("invalid region component '{}'", part))?;
    }
    if numbers[2] == 0 || numbers[3] == 0 {
        bail!("region width and height must be non-zero");
    }
    Ok(PixelRect::new(numbers[0], numbers[1], numbers[2], numbers[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_sealed_path() {
        assert_eq!(
            build_sealed_path(Path::new("contract.png")),
            PathBuf::from("contract.sealed.png")
        );
        assert_eq!(
            build_sealed_path(Path::new("scan.jpg")),
            PathBuf::from("scan.sealed.png")
        );
        assert_eq!(
            build_sealed_path(Path::new("noext")),
            PathBuf::from("noext.sealed.png")
        );
    }

    #[test]
    fn test_parse_region() {
        let rect = parse_region("10, 20, 300, 400").unwrap();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (10, 20, 300, 400));

        assert!(parse_region("10,20,300").is_err());
        assert!(parse_region("10,20,0,400").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }

    #[test]
    fn test_key_file_roundtrip() {
        let key_file = KeyFile::generate();
        let signing = key_file.signing_key().unwrap();
        let verifying = key_file.verifying_key().unwrap();
        assert_eq!(signing.verifying_key(), verifying);
        assert!(key_file.key_id.starts_with("local-"));
    }

    #[test]
    fn test_public_only_key_file_cannot_sign() {
        let mut key_file = KeyFile::generate();
        key_file.private_key = None;
        assert!(key_file.signing_key().is_err());
        assert!(key_file.verifying_key().is_ok());
    }
}
