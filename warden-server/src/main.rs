//! Warden Server - identity and access REST API
//!
//! Serves account registration, password-grant tokens, profile and admin
//! routes, and WebAuthn passkey registration.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden_server::{create_router, db, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warden_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let pool = match &config.database_url {
        Some(url) => Some(db::connect(url, config.database_max_connections).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory backend");
            None
        }
    };

    let state = AppState::build(&config, pool)?;
    state.spawn_sweeper(config.session_sweep_secs);

    let app = create_router(state, &config)?;

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Warden server listening on http://{}", addr);
    tracing::info!("Swagger UI on http://{}/swagger-ui", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
