//! JWT authentication module
//!
//! Provides the `AuthenticatedIdentity` extractor for Axum handlers. Tokens are
//! minted by the identity broker and carry the provider/identifier pair that the
//! signing endpoint binds into attestations. Two validation modes exist: RS256
//! against the broker's JWKS endpoint (cached with a 1-hour TTL), or HS256 with
//! a shared secret for development and test deployments.

use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, jwk, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::state::AppState;

/// JWKS cache TTL (1 hour)
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// JWT claims from broker tokens
#[derive(Debug, Deserialize)]
struct BrokerClaims {
    /// Subject (broker session or account ID)
    sub: String,
    /// Identity provider the broker authenticated against (e.g. "email", "phone")
    provider: String,
    /// Provider-scoped identifier (e.g. the verified email address)
    identifier: String,
    /// Expiration time (validated by jsonwebtoken)
    #[allow(dead_code)]
    exp: u64,
}

/// Cached JWKS keys with timestamp
struct CachedJwks {
    keys: Vec<jwk::Jwk>,
    fetched_at: Instant,
}

/// JWKS cache that fetches and caches the broker's JSON Web Key Set
pub struct JwksCache {
    keys: RwLock<Option<CachedJwks>>,
    jwks_url: String,
    http_client: reqwest::Client,
}

/// JWKS response structure from the broker
#[derive(Deserialize)]
struct JwksResponse {
    keys: Vec<jwk::Jwk>,
}

impl JwksCache {
    /// Create a new JWKS cache for the given broker JWKS URL
    pub fn new(jwks_url: String) -> Self {
        Self {
            keys: RwLock::new(None),
            jwks_url,
            http_client: reqwest::Client::new(),
        }
    }

    /// Get cached JWKS keys, fetching from the broker if expired or not yet cached
    async fn get_keys(&self) -> Result<Vec<jwk::Jwk>, ApiError> {
        // Try read lock first (fast path)
        {
            let cache = self.keys.read().await;
            if let Some(ref cached) = *cache {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        // Cache miss or expired — acquire write lock and fetch
        let mut cache = self.keys.write().await;

        // Double-check after acquiring write lock (another task may have refreshed)
        if let Some(ref cached) = *cache {
            if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                return Ok(cached.keys.clone());
            }
        }

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch JWKS from broker");
                ApiError::internal("Authentication service temporarily unavailable")
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "Broker JWKS endpoint returned error");
            return Err(ApiError::internal(
                "Authentication service temporarily unavailable",
            ));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            ApiError::internal("Authentication service temporarily unavailable")
        })?;

        let keys = jwks.keys;
        tracing::info!(key_count = keys.len(), "Refreshed JWKS cache from broker");

        *cache = Some(CachedJwks {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });

        Ok(keys)
    }

    /// Find a JWK by key ID
    async fn find_key(&self, kid: &str) -> Result<jwk::Jwk, ApiError> {
        let keys = self.get_keys().await?;
        keys.into_iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| {
                ApiError::auth_error(
                    "AUTH_UNKNOWN_KEY",
                    format!("No matching key found for kid '{}'", kid),
                )
            })
    }
}

/// Token validation backend selected at startup from configuration.
pub enum AuthVerifier {
    /// RS256 against the broker's JWKS endpoint (production)
    Jwks(JwksCache),
    /// HS256 with a shared secret (development and integration tests)
    SharedSecret(String),
}

/// Map a jsonwebtoken decode error to a structured auth error
fn decode_error(e: jsonwebtoken::errors::Error) -> ApiError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ApiError::auth_error("AUTH_TOKEN_EXPIRED", "JWT token has expired")
        }
        jsonwebtoken::errors::ErrorKind::InvalidSignature => {
            ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid JWT signature")
        }
        _ => ApiError::auth_error("AUTH_INVALID_TOKEN", format!("JWT validation failed: {}", e)),
    }
}

/// Validate a JWT token and extract broker claims.
///
/// This is the core validation logic, separated for testability.
async fn validate_jwt(token: &str, verifier: &AuthVerifier) -> Result<BrokerClaims, ApiError> {
    match verifier {
        AuthVerifier::Jwks(jwks_cache) => {
            // Decode header to get kid
            let header = decode_header(token).map_err(|e| {
                ApiError::auth_error("AUTH_INVALID_TOKEN", format!("Invalid JWT header: {}", e))
            })?;

            let kid = header.kid.ok_or_else(|| {
                ApiError::auth_error("AUTH_INVALID_TOKEN", "JWT header missing 'kid' field")
            })?;

            let jwk = jwks_cache.find_key(&kid).await?;

            let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
                tracing::error!(error = %e, kid = %kid, "Failed to convert JWK to decoding key");
                ApiError::auth_error("AUTH_INVALID_TOKEN", "Failed to process signing key")
            })?;

            let mut validation = Validation::new(Algorithm::RS256);
            validation.validate_exp = true;
            // Broker tokens don't always have aud, so disable audience validation
            validation.validate_aud = false;

            let token_data =
                decode::<BrokerClaims>(token, &decoding_key, &validation).map_err(decode_error)?;

            Ok(token_data.claims)
        }
        AuthVerifier::SharedSecret(secret) => {
            let decoding_key = DecodingKey::from_secret(secret.as_bytes());

            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_exp = true;
            validation.validate_aud = false;

            let token_data =
                decode::<BrokerClaims>(token, &decoding_key, &validation).map_err(decode_error)?;

            Ok(token_data.claims)
        }
    }
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing Authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Invalid Authorization header encoding",
        )
    })?;

    auth_value.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Authorization header must use Bearer scheme",
        )
    })
}

/// Authenticated identity extractor that validates the broker JWT.
///
/// The extractor:
/// 1. Reads `Authorization: Bearer <token>` header
/// 2. Validates the JWT against the configured verifier (JWKS or shared secret)
/// 3. Exposes the broker-verified provider/identifier pair
///
/// Returns 401 with structured error codes on any failure.
pub struct AuthenticatedIdentity {
    /// Identity provider the broker authenticated against
    pub provider: String,
    /// Provider-scoped identifier verified by the broker
    pub identifier: String,
    /// Broker subject, used for audit logging only
    pub subject: String,
}

impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;

        let verifier = state.auth.as_ref().ok_or_else(|| {
            ApiError::internal(
                "JWT authentication not configured (missing BROKER_JWKS_URL or BROKER_SHARED_SECRET)",
            )
        })?;

        let claims = validate_jwt(token, verifier).await?;

        Ok(AuthenticatedIdentity {
            provider: claims.provider,
            identifier: claims.identifier,
            subject: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Test JWT claims for creating test tokens
    #[derive(Debug, Serialize)]
    struct TestClaims {
        sub: String,
        provider: String,
        identifier: String,
        exp: u64,
        iat: u64,
    }

    fn now_epoch() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn create_test_token(provider: &str, identifier: &str, exp: u64, secret: &str) -> String {
        let claims = TestClaims {
            sub: "session_abc123".to_string(),
            provider: provider.to_string(),
            identifier: identifier.to_string(),
            exp,
            iat: now_epoch(),
        };

        let header = Header::new(Algorithm::HS256);
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        encode(&header, &claims, &encoding_key).unwrap()
    }

    #[tokio::test]
    async fn test_valid_shared_secret_token() {
        let verifier = AuthVerifier::SharedSecret("test-secret".to_string());
        let token = create_test_token("email", "alice@example.com", now_epoch() + 3600, "test-secret");

        let claims = validate_jwt(&token, &verifier).await.unwrap();
        assert_eq!(claims.provider, "email");
        assert_eq!(claims.identifier, "alice@example.com");
        assert_eq!(claims.sub, "session_abc123");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let verifier = AuthVerifier::SharedSecret("test-secret".to_string());
        let token = create_test_token("email", "alice@example.com", now_epoch() - 3600, "test-secret");

        let err = validate_jwt(&token, &verifier).await.unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_TOKEN_EXPIRED"),
            other => panic!("Expected AuthError with AUTH_TOKEN_EXPIRED, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let verifier = AuthVerifier::SharedSecret("test-secret".to_string());
        let token = create_test_token("email", "alice@example.com", now_epoch() + 3600, "other-secret");

        let err = validate_jwt(&token, &verifier).await.unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AuthError with AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_missing_identity_claims() {
        #[derive(Serialize)]
        struct BareClaims {
            sub: String,
            exp: u64,
        }
        let claims = BareClaims {
            sub: "session_abc123".to_string(),
            exp: now_epoch() + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        let verifier = AuthVerifier::SharedSecret("test-secret".to_string());
        let err = validate_jwt(&token, &verifier).await.unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AuthError with AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let verifier = AuthVerifier::SharedSecret("test-secret".to_string());
        let err = validate_jwt("not-a-valid-jwt", &verifier).await.unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AuthError with AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let (parts, _) = axum::http::Request::builder()
            .body(())
            .unwrap()
            .into_parts();

        let err = extract_bearer_token(&parts).unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_MISSING_TOKEN"),
            other => panic!("Expected AuthError with AUTH_MISSING_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let (parts, _) = axum::http::Request::builder()
            .header("Authorization", "Basic dXNlcjpwYXNz")
            .body(())
            .unwrap()
            .into_parts();

        let err = extract_bearer_token(&parts).unwrap_err();
        match err {
            ApiError::AuthError { code, .. } => assert_eq!(code, "AUTH_INVALID_TOKEN"),
            other => panic!("Expected AuthError with AUTH_INVALID_TOKEN, got: {:?}", other),
        }
    }

    #[test]
    fn test_extract_bearer_token_success() {
        let (parts, _) = axum::http::Request::builder()
            .header("Authorization", "Bearer my-jwt-token")
            .body(())
            .unwrap()
            .into_parts();

        let token = extract_bearer_token(&parts).unwrap();
        assert_eq!(token, "my-jwt-token");
    }
}
