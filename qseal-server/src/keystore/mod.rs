//! Signing key storage module
//!
//! Holds the Ed25519 key material the signing endpoint uses, keyed by purpose.
//! At most one key per purpose is active at a time; rotation deactivates the
//! previous active key and activates the replacement in a single atomic step.
//!
//! If `DATABASE_URL` is not set, falls back to in-memory storage with a freshly
//! generated ephemeral key (useful for development, but attestations signed with
//! it become unverifiable after a restart).

mod memory;
mod postgres;

pub use memory::MemoryKeyStore;
pub use postgres::PostgresKeyStore;

use chrono::{DateTime, Utc};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// Purpose label for document attestation signing keys
pub const PURPOSE_ATTESTATION: &str = "attestation";

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Key conflict: {0}")]
    Conflict(String),
}

/// A stored signing key with its private material.
///
/// The private seed is wrapped in `Zeroizing` so it is wiped when the record
/// is dropped. `Debug` is implemented by hand to keep it out of logs.
#[derive(Clone)]
pub struct SigningKeyRecord {
    pub id: String,
    /// 32-byte Ed25519 seed, zeroed on drop
    pub private_key: Zeroizing<Vec<u8>>,
    /// 32-byte Ed25519 public key
    pub public_key: Vec<u8>,
    pub algorithm: String,
    pub is_active: bool,
    pub purpose: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for SigningKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyRecord")
            .field("id", &self.id)
            .field("private_key", &"<redacted>")
            .field("public_key", &hex::encode(&self.public_key))
            .field("algorithm", &self.algorithm)
            .field("is_active", &self.is_active)
            .field("purpose", &self.purpose)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl SigningKeyRecord {
    /// Generate a fresh active Ed25519 key for the given purpose
    pub fn generate(purpose: &str) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            id: format!("key-{}", uuid::Uuid::new_v4()),
            private_key: Zeroizing::new(signing_key.to_bytes().to_vec()),
            public_key: signing_key.verifying_key().to_bytes().to_vec(),
            algorithm: "ed25519".to_string(),
            is_active: true,
            purpose: purpose.to_string(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }
}

/// Public half of a stored key, safe to hand to clients
#[derive(Debug, Clone)]
pub struct PublicKeyRecord {
    pub id: String,
    pub public_key: Vec<u8>,
    pub algorithm: String,
}

impl From<&SigningKeyRecord> for PublicKeyRecord {
    fn from(record: &SigningKeyRecord) -> Self {
        Self {
            id: record.id.clone(),
            public_key: record.public_key.clone(),
            algorithm: record.algorithm.clone(),
        }
    }
}

/// Key storage backend
enum KeyBackend {
    /// PostgreSQL storage (production)
    Postgres(PostgresKeyStore),
    /// In-memory storage (development fallback)
    Memory(MemoryKeyStore),
}

/// Unified signing key storage
pub struct KeyStorage {
    backend: KeyBackend,
}

impl KeyStorage {
    /// Create storage with PostgreSQL backend
    pub async fn with_postgres(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, KeyStoreError> {
        let pg_store = PostgresKeyStore::new(database_url, max_connections, min_connections).await?;
        pg_store.migrate().await?;

        Ok(Self {
            backend: KeyBackend::Postgres(pg_store),
        })
    }

    /// Create storage with an empty in-memory backend
    pub fn in_memory() -> Self {
        Self {
            backend: KeyBackend::Memory(MemoryKeyStore::new()),
        }
    }

    /// Create storage from environment
    ///
    /// Uses PostgreSQL if `DATABASE_URL` is set, otherwise falls back to an
    /// in-memory store seeded with an ephemeral attestation key. Pool bounds
    /// come from the caller's [`Config`](crate::config::Config).
    pub async fn from_env(
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, KeyStoreError> {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => {
                tracing::info!("Using PostgreSQL key storage");
                Self::with_postgres(&url, max_connections, min_connections).await
            }
            _ => {
                tracing::warn!(
                    "DATABASE_URL not set, using in-memory key storage with an ephemeral key - \
                     attestations will be unverifiable after restart!"
                );
                let storage = Self::in_memory();
                let record = SigningKeyRecord::generate(PURPOSE_ATTESTATION);
                tracing::info!(key_id = %record.id, "Generated ephemeral attestation key");
                storage.insert_key(record).await?;
                Ok(storage)
            }
        }
    }

    /// Check if using persistent storage
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, KeyBackend::Postgres(_))
    }

    /// Check database health (always Ok for memory backend)
    pub async fn check_health(&self) -> Result<(), KeyStoreError> {
        match &self.backend {
            KeyBackend::Postgres(pg) => pg.check_health().await,
            KeyBackend::Memory(_) => Ok(()),
        }
    }

    /// Get the active, unexpired signing key for a purpose
    pub async fn active_key(
        &self,
        purpose: &str,
    ) -> Result<Option<SigningKeyRecord>, KeyStoreError> {
        match &self.backend {
            KeyBackend::Postgres(pg) => pg.active_key(purpose).await,
            KeyBackend::Memory(mem) => mem.active_key(purpose).await,
        }
    }

    /// Get the public half of a key by ID, regardless of active state
    pub async fn public_key(&self, id: &str) -> Result<Option<PublicKeyRecord>, KeyStoreError> {
        match &self.backend {
            KeyBackend::Postgres(pg) => pg.public_key(id).await,
            KeyBackend::Memory(mem) => mem.public_key(id).await,
        }
    }

    /// Insert a key record.
    ///
    /// Fails with `Conflict` if the ID already exists, or if the record is
    /// active and another active key already holds the same purpose.
    pub async fn insert_key(&self, record: SigningKeyRecord) -> Result<(), KeyStoreError> {
        match &self.backend {
            KeyBackend::Postgres(pg) => pg.insert_key(&record).await,
            KeyBackend::Memory(mem) => mem.insert_key(record).await,
        }
    }

    /// Rotate the active key for a purpose.
    ///
    /// Deactivates the current active key (if any) and inserts the new record
    /// as active, atomically. Verification of attestations signed with the old
    /// key keeps working through `public_key`.
    pub async fn rotate_key(
        &self,
        purpose: &str,
        new_record: SigningKeyRecord,
    ) -> Result<(), KeyStoreError> {
        match &self.backend {
            KeyBackend::Postgres(pg) => pg.rotate_key(purpose, &new_record).await,
            KeyBackend::Memory(mem) => mem.rotate_key(purpose, new_record).await,
        }
    }
}

impl std::fmt::Debug for KeyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            KeyBackend::Postgres(_) => "PostgreSQL",
            KeyBackend::Memory(_) => "Memory",
        };
        f.debug_struct("KeyStorage").field("backend", &backend).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_storage_not_persistent() {
        let storage = KeyStorage::in_memory();
        assert!(!storage.is_persistent());
    }

    #[test]
    fn test_generated_record_shape() {
        let record = SigningKeyRecord::generate(PURPOSE_ATTESTATION);
        assert_eq!(record.private_key.len(), 32);
        assert_eq!(record.public_key.len(), 32);
        assert_eq!(record.algorithm, "ed25519");
        assert!(record.is_active);
        assert_eq!(record.purpose, PURPOSE_ATTESTATION);
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let record = SigningKeyRecord::generate(PURPOSE_ATTESTATION);
        let rendered = format!("{:?}", record);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&hex::encode(&record.private_key[..])));
    }
}
