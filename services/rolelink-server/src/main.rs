use anyhow::{Context, Result};
use rolelink_core::AttributeStore;
use rolelink_oauth2::{InMemoryStateStore, LinkFlow, OAuthStateStore};
use rolelink_server::config::{Config, StorageBackend};
use rolelink_server::interactions::SignatureVerifyingRouter;
use rolelink_server::{AppState, maintenance, router, telemetry};
use rolelink_store::{InMemoryAttributeStore, JsonFileAttributeStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;

    info!("Starting rolelink server");
    info!(discord = ?config.discord, storage = ?config.storage, "Configuration loaded");

    let store: Arc<dyn AttributeStore> = match config.storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory attribute store; attributes are lost on restart");
            Arc::new(InMemoryAttributeStore::new())
        }
        StorageBackend::Json => Arc::new(
            JsonFileAttributeStore::open(&config.storage.path)
                .await
                .with_context(|| {
                    format!("Failed to open attribute store at {}", config.storage.path.display())
                })?,
        ),
    };

    let states: Arc<dyn OAuthStateStore> = Arc::new(InMemoryStateStore::new());
    maintenance::spawn_state_purger(
        states.clone(),
        Duration::from_secs(config.oauth.state_purge_interval_seconds),
    );

    let flow = LinkFlow::discord(Arc::new(config.link_config()), states, store)
        .context("Failed to initialize link flow")?;

    let interactions = SignatureVerifyingRouter::from_hex(&config.discord.public_key)
        .context("Failed to load interaction public key")?;

    let state = AppState::new(
        Arc::new(flow),
        config.discord.scopes.clone(),
        Arc::new(interactions),
    );
    let app = router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("OAuth2 redirect URI: {}", config.discord.redirect_uri);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
