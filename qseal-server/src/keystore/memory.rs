//! In-memory signing key storage
//!
//! Development fallback backend. All mutations run under one write lock, so
//! rotation observes the same atomicity as the PostgreSQL transaction path.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::{KeyStoreError, PublicKeyRecord, SigningKeyRecord};

/// In-memory key store backed by a `RwLock<HashMap>`
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, SigningKeyRecord>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Get the active, unexpired key for a purpose
    pub async fn active_key(
        &self,
        purpose: &str,
    ) -> Result<Option<SigningKeyRecord>, KeyStoreError> {
        let keys = self.keys.read().await;
        let now = Utc::now();
        Ok(keys
            .values()
            .find(|k| {
                k.purpose == purpose
                    && k.is_active
                    && k.expires_at.map(|exp| exp > now).unwrap_or(true)
            })
            .cloned())
    }

    /// Get the public half of a key by ID
    pub async fn public_key(&self, id: &str) -> Result<Option<PublicKeyRecord>, KeyStoreError> {
        let keys = self.keys.read().await;
        Ok(keys.get(id).map(PublicKeyRecord::from))
    }

    /// Insert a key record, rejecting duplicate IDs and duplicate active keys
    pub async fn insert_key(&self, record: SigningKeyRecord) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.write().await;

        if keys.contains_key(&record.id) {
            return Err(KeyStoreError::Conflict(format!(
                "key '{}' already exists",
                record.id
            )));
        }

        if record.is_active
            && keys
                .values()
                .any(|k| k.purpose == record.purpose && k.is_active)
        {
            return Err(KeyStoreError::Conflict(format!(
                "an active key already exists for purpose '{}'",
                record.purpose
            )));
        }

        keys.insert(record.id.clone(), record);
        Ok(())
    }

    /// Deactivate the current active key for a purpose and insert the new
    /// record as active, under a single write lock
    pub async fn rotate_key(
        &self,
        purpose: &str,
        mut new_record: SigningKeyRecord,
    ) -> Result<(), KeyStoreError> {
        let mut keys = self.keys.write().await;

        if keys.contains_key(&new_record.id) {
            return Err(KeyStoreError::Conflict(format!(
                "key '{}' already exists",
                new_record.id
            )));
        }

        for key in keys.values_mut() {
            if key.purpose == purpose && key.is_active {
                key.is_active = false;
            }
        }

        new_record.is_active = true;
        new_record.purpose = purpose.to_string();
        keys.insert(new_record.id.clone(), new_record);
        Ok(())
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}
