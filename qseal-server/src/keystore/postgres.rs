//! PostgreSQL storage for signing keys
//!
//! Provides persistent storage for Ed25519 key material. A partial unique
//! index enforces the one-active-key-per-purpose invariant at the database
//! level, and rotation runs inside a transaction.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use zeroize::Zeroizing;

use super::{KeyStoreError, PublicKeyRecord, SigningKeyRecord};

/// PostgreSQL-backed key storage
pub struct PostgresKeyStore {
    pool: PgPool,
}

impl PostgresKeyStore {
    /// Create a new PostgreSQL key store with the given pool bounds
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, KeyStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(database_url)
            .await
            .map_err(|e| KeyStoreError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist
    pub async fn migrate(&self) -> Result<(), KeyStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signing_keys (
                id          TEXT PRIMARY KEY,
                private_key BYTEA NOT NULL,
                public_key  BYTEA NOT NULL,
                algorithm   TEXT NOT NULL,
                is_active   BOOLEAN NOT NULL DEFAULT FALSE,
                purpose     TEXT NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                expires_at  TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KeyStoreError::Migration(e.to_string()))?;

        // One active key per purpose, enforced by the database
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS ux_signing_keys_active_purpose
            ON signing_keys (purpose) WHERE is_active
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| KeyStoreError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Check database connection health
    pub async fn check_health(&self) -> Result<(), KeyStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| KeyStoreError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Get the active, unexpired key for a purpose
    pub async fn active_key(
        &self,
        purpose: &str,
    ) -> Result<Option<SigningKeyRecord>, KeyStoreError> {
        let row = sqlx::query_as::<_, KeyRow>(
            r#"
            SELECT id, private_key, public_key, algorithm, is_active, purpose,
                   created_at, expires_at
            FROM signing_keys
            WHERE purpose = $1
              AND is_active
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(purpose)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KeyStoreError::Query(e.to_string()))?;

        Ok(row.map(KeyRow::into_record))
    }

    /// Get the public half of a key by ID, regardless of active state
    pub async fn public_key(&self, id: &str) -> Result<Option<PublicKeyRecord>, KeyStoreError> {
        let row = sqlx::query_as::<_, PublicKeyRow>(
            r#"
            SELECT id, public_key, algorithm
            FROM signing_keys
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| KeyStoreError::Query(e.to_string()))?;

        Ok(row.map(|r| PublicKeyRecord {
            id: r.id,
            public_key: r.public_key,
            algorithm: r.algorithm,
        }))
    }

    /// Insert a new key record
    pub async fn insert_key(&self, record: &SigningKeyRecord) -> Result<(), KeyStoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO signing_keys
                (id, private_key, public_key, algorithm, is_active, purpose,
                 created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.id)
        .bind(&record.private_key[..])
        .bind(&record.public_key)
        .bind(&record.algorithm)
        .bind(record.is_active)
        .bind(&record.purpose)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::info!(key_id = %record.id, purpose = %record.purpose, "Signing key stored");
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                KeyStoreError::Conflict(format!("key '{}' conflicts with an existing key", record.id)),
            ),
            Err(e) => Err(KeyStoreError::Query(e.to_string())),
        }
    }

    /// Deactivate the current active key for a purpose and insert the new
    /// record as active, inside one transaction
    pub async fn rotate_key(
        &self,
        purpose: &str,
        new_record: &SigningKeyRecord,
    ) -> Result<(), KeyStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| KeyStoreError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE signing_keys SET is_active = FALSE
            WHERE purpose = $1 AND is_active
            "#,
        )
        .bind(purpose)
        .execute(&mut *tx)
        .await
        .map_err(|e| KeyStoreError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO signing_keys
                (id, private_key, public_key, algorithm, is_active, purpose,
                 created_at, expires_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7)
            "#,
        )
        .bind(&new_record.id)
        .bind(&new_record.private_key[..])
        .bind(&new_record.public_key)
        .bind(&new_record.algorithm)
        .bind(purpose)
        .bind(new_record.created_at)
        .bind(new_record.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => KeyStoreError::Conflict(
                format!("key '{}' conflicts with an existing key", new_record.id),
            ),
            other => KeyStoreError::Query(other.to_string()),
        })?;

        tx.commit()
            .await
            .map_err(|e| KeyStoreError::Query(e.to_string()))?;

        tracing::info!(key_id = %new_record.id, purpose = %purpose, "Signing key rotated");
        Ok(())
    }
}

/// Database row for full key records
#[derive(sqlx::FromRow)]
struct KeyRow {
    id: String,
    private_key: Vec<u8>,
    public_key: Vec<u8>,
    algorithm: String,
    is_active: bool,
    purpose: String,
    created_at: chrono::DateTime<chrono::Utc>,
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl KeyRow {
    fn into_record(self) -> SigningKeyRecord {
        SigningKeyRecord {
            id: self.id,
            private_key: Zeroizing::new(self.private_key),
            public_key: self.public_key,
            algorithm: self.algorithm,
            is_active: self.is_active,
            purpose: self.purpose,
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Database row for public key lookups
#[derive(sqlx::FromRow)]
struct PublicKeyRow {
    id: String,
    public_key: Vec<u8>,
    algorithm: String,
}

impl std::fmt::Debug for PostgresKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresKeyStore")
            .field("pool", &"<PgPool>")
            .finish()
    }
}
