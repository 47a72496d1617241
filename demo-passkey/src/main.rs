mod config;
mod server;
mod webauthn;

use std::sync::Arc;

use axum::{Router, routing::get};

use passkey_ceremony::{
    CacheStoreConfig, CeremonyConfig, CeremonyOrchestrator, DataStoreConfig, TracingNotifier,
    credential_store_for,
};
use passkey_ceremony_axum::passkey_ceremony_router;

use crate::config::{SERVER_ADDR, SWEEP_INTERVAL};
use crate::webauthn::WebauthnRsProvider;

async fn index() -> &'static str {
    "passkey-ceremony demo: endpoints are mounted under /auth"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    server::init_tracing("demo_passkey");

    let data_store = DataStoreConfig::from_env()?.connect().await?;
    let credentials = credential_store_for(data_store.clone()).await?;
    let cache = CacheStoreConfig::from_env()?.build_shared().await?;
    let provider = WebauthnRsProvider::from_env()?;

    let orchestrator = Arc::new(CeremonyOrchestrator::new(
        credentials,
        cache.clone(),
        Arc::new(provider),
        Arc::new(TracingNotifier),
        CeremonyConfig::from_env(),
    ));

    let sweeper = server::spawn_sweeper(orchestrator.clone(), *SWEEP_INTERVAL);

    let app = Router::new()
        .route("/", get(index))
        .nest("/auth", passkey_ceremony_router(orchestrator));

    let listener = tokio::net::TcpListener::bind(SERVER_ADDR.as_str()).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    sweeper.abort();
    cache.close().await;
    if let Some(data_store) = data_store {
        data_store.close().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}
