//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unauthorized - missing or invalid authentication
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden - authenticated, but not allowed to act as the claimed identity
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - required service is not configured or available
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Authentication error with specific error code
    #[error("{message}")]
    AuthError { message: String, code: String },

    /// Seal core error - error from the attestation library
    #[error("Seal error: {0}")]
    Seal(#[from] qseal_core::SealError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Create an authentication error with a specific error code
    pub fn auth_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Seal(ref e) => match e {
                // External service failures → 503
                qseal_core::SealError::NetworkError(_)
                | qseal_core::SealError::SigningService(_) => StatusCode::SERVICE_UNAVAILABLE,

                // Client-provided invalid input → 400
                qseal_core::SealError::InvalidAttestation(_)
                | qseal_core::SealError::UnsupportedVersion(_, _)
                | qseal_core::SealError::PayloadTooLarge { .. }
                | qseal_core::SealError::ImageError(_)
                | qseal_core::SealError::GeometryError(_) => StatusCode::BAD_REQUEST,

                // Internal processing failures → 500
                qseal_core::SealError::SignatureError(_)
                | qseal_core::SealError::SerializationError(_)
                | qseal_core::SealError::HashError(_)
                | qseal_core::SealError::QrError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "IDENTITY_MISMATCH",
            Self::AuthError { .. } => "AUTH_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Seal(ref e) => match e {
                qseal_core::SealError::NetworkError(_) => "UPSTREAM_ERROR",
                qseal_core::SealError::SigningService(_) => "SIGNING_SERVICE_ERROR",
                qseal_core::SealError::InvalidAttestation(_) => "INVALID_ATTESTATION",
                qseal_core::SealError::UnsupportedVersion(_, _) => "UNSUPPORTED_VERSION",
                qseal_core::SealError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
                qseal_core::SealError::ImageError(_) => "IMAGE_ERROR",
                qseal_core::SealError::GeometryError(_) => "GEOMETRY_ERROR",
                qseal_core::SealError::SignatureError(_) => "SIGNATURE_ERROR",
                qseal_core::SealError::SerializationError(_) => "SERIALIZATION_ERROR",
                qseal_core::SealError::HashError(_) => "HASH_ERROR",
                qseal_core::SealError::QrError(_) => "QR_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            // For core errors, sanitize internal details
            Self::Seal(ref e) => match e {
                qseal_core::SealError::NetworkError(_) => "Upstream service error".to_string(),
                qseal_core::SealError::SigningService(_) => {
                    "Signing service unavailable".to_string()
                }
                qseal_core::SealError::InvalidAttestation(_) => {
                    "Invalid attestation format".to_string()
                }
                qseal_core::SealError::UnsupportedVersion(v, current) => {
                    format!("Unsupported attestation version {} (current: {})", v, current)
                }
                qseal_core::SealError::PayloadTooLarge { size, max } => {
                    format!("Payload size {} bytes exceeds maximum of {} bytes", size, max)
                }
                qseal_core::SealError::ImageError(_) => "Invalid image data".to_string(),
                qseal_core::SealError::GeometryError(_) => "Invalid seal geometry".to_string(),
                qseal_core::SealError::SignatureError(_) => {
                    "Signature operation failed".to_string()
                }
                qseal_core::SealError::SerializationError(_) => {
                    "Attestation serialization error".to_string()
                }
                qseal_core::SealError::HashError(_) => "Hash computation failed".to_string(),
                qseal_core::SealError::QrError(_) => "QR code operation failed".to_string(),
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::AuthError { .. } => "auth_error",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Seal(_) => "seal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::BadRequest(_) | Self::NotFound(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Client error"
                );
            }
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::AuthError { .. } => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Authentication error"
                );
            }
            Self::ServiceUnavailable(_) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Service unavailable"
                );
            }
            Self::Internal(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    "Server error"
                );
            }
            // For core errors, log full internal details
            Self::Seal(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = code,
                    error = %internal_message,
                    client_message = %client_message,
                    "Seal error (internal details logged)"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
