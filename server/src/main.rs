// Forbid unwrap() in production code. Test code may use it.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::sync::Arc;

use teams_server::auth::{AuthService, TokenIssuer, TokenIssuerConfig};
use teams_server::config::ServerConfig;
use teams_server::data::SnapshotStore;
use teams_server::http::{AppState, router};
use teams_server::time::SystemTimeSource;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teams_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: listen_addr={}, data_path={}, issuer={:?}, audience={:?}, leeway={:?}",
        config.listen_addr,
        config.data_path.display(),
        config.jwt_issuer,
        config.jwt_audience,
        config.jwt_leeway
    );

    let issuer_config = match TokenIssuerConfig::new(
        config.jwt_issuer.clone(),
        config.jwt_audience.clone(),
        config.jwt_leeway,
        config.jwt_secret.clone().into_bytes(),
    ) {
        Ok(issuer_config) => issuer_config,
        Err(e) => {
            tracing::error!("Invalid token configuration: {e}");
            std::process::exit(1);
        }
    };

    // Startup fails if the dataset is missing or inconsistent; later reload
    // failures only keep the previous snapshot.
    let store = match SnapshotStore::open(&config.data_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to load dataset: {e}");
            std::process::exit(1);
        }
    };

    let issuer = TokenIssuer::new(issuer_config);
    tracing::debug!(config = ?issuer.config(), "token issuer ready");

    let auth = AuthService::new(
        Arc::clone(&store) as Arc<dyn teams_server::data::DataRepository>,
        issuer,
        Arc::new(SystemTimeSource),
    );
    let app = router(AppState::new(auth));

    tracing::info!("listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        store.shutdown().await;
        std::process::exit(1);
    }

    if !store.is_running() {
        tracing::warn!("dataset reload worker exited before shutdown");
    }
    store.shutdown().await;
    tracing::info!("server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
