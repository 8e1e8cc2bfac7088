//! qseal Server - REST signing boundary for document attestations
//!
//! Endpoints:
//! - POST /sign-attestation - Sign an attestation for the authenticated identity
//! - GET  /keys/{id}        - Resolve a public key by identifier
//! - GET  /health, /ready   - Monitoring probes

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use qseal_server::auth::{AuthVerifier, JwksCache};
use qseal_server::config::Config;
use qseal_server::keystore::KeyStorage;
use qseal_server::routes::create_router_with_config;
use qseal_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("qseal_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let key_storage = KeyStorage::from_env(
        config.database_max_connections,
        config.database_min_connections,
    )
    .await
        .map_err(|e| anyhow::anyhow!("key storage initialization failed: {}", e))?;

    let auth = if let Some(ref jwks_url) = config.broker_jwks_url {
        tracing::info!(jwks_url = %jwks_url, "Broker auth: RS256 via JWKS");
        Some(Arc::new(AuthVerifier::Jwks(JwksCache::new(jwks_url.clone()))))
    } else if let Some(ref secret) = config.broker_shared_secret {
        tracing::warn!("Broker auth: HS256 shared secret (development mode)");
        Some(Arc::new(AuthVerifier::SharedSecret(secret.clone())))
    } else {
        tracing::error!(
            "No broker auth configured (BROKER_JWKS_URL or BROKER_SHARED_SECRET); \
             signing requests will fail"
        );
        None
    };

    let state = AppState {
        key_storage: Arc::new(key_storage),
        auth,
        service_name: config.service_name.clone(),
    };

    let app = create_router_with_config(state, &config);

    let addr = config.socket_addr();
    tracing::info!(%addr, "qseal server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
