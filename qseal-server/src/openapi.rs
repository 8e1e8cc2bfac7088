//! OpenAPI documentation configuration
//!
//! Generates OpenAPI 3.0 specification for the attestation signing API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::handlers::sign::{
    RequestExclusionZone, RequestHashes, RequestIdentity, RequestPlacement,
};
use crate::handlers::{
    HealthResponse, PublicKeyResponse, ReadyResponse, SignAttestationRequest,
    SignAttestationResponse,
};

/// qseal signing API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "qseal - Attestation Signing API",
        version = "0.1.0",
        description = r#"
## Document Attestation Signing API

qseal stamps documents with a signed QR seal binding together:

- **Dual hashing** - an exact SHA3-256 digest plus two perceptual hashes
- **Authenticated identity** - the provider/identifier pair verified by the identity broker
- **Ed25519 signatures** - server-held keys, rotated without breaking old seals

### How It Works

1. The client hashes the document with the seal area blanked
2. `POST /sign-attestation` binds the broker-verified identity and signs the attestation
3. The client embeds the signed attestation in a QR code stamped onto the document
4. Verifiers decode the QR offline and resolve the public key via `GET /keys/{id}`
"#
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Signing", description = "Sign attestations for authenticated identities"),
        (name = "Keys", description = "Resolve public keys named by attestations"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::sign::sign_attestation_handler,
        crate::handlers::keys::get_key_handler,
        crate::handlers::health::health,
        crate::handlers::health::ready,
    ),
    components(
        schemas(
            SignAttestationRequest,
            SignAttestationResponse,
            RequestHashes,
            RequestIdentity,
            RequestExclusionZone,
            RequestPlacement,
            PublicKeyResponse,
            HealthResponse,
            ReadyResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the broker bearer token scheme referenced by signing paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
