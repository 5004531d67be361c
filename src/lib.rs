// src/lib.rs
//! Backend for a small polling app.
//!
//! Signed-in users create polls and vote once per poll; anyone can read
//! polls with live counts. Identity comes from a hosted auth service,
//! data lives in Postgres (or in memory for local runs).

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::Handle;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod items;
pub mod models;
pub mod poll;
pub mod routes;
pub mod state;
pub mod store;

use auth::RemoteAuth;
use config::{Config, StorageBackend};
use error::ServerError;
use state::AppState;
use store::{MemoryStore, PgStore, PollStore};

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickpoll=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub async fn start_server(config: Config) -> Result<(), ServerError> {
    info!("Initializing state...");

    let store: Arc<dyn PollStore> = match (&config.storage, &config.database_url) {
        (StorageBackend::Postgres, Some(url)) => {
            info!("Connecting to database...");
            let pool = db::create_pool(url, config.max_connections).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgStore::new(pool))
        }
        (StorageBackend::Postgres, None) => {
            return Err(config::ConfigError::Missing("DATABASE_URL").into());
        }
        (StorageBackend::Memory, _) => {
            info!("Using in-memory storage; data resets on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let auth = RemoteAuth::new(&config.auth_url, &config.auth_api_key, config.auth_timeout)?;
    let state = AppState::new(store, Arc::new(auth));

    let cors = routes::cors_layer(config.cors_allowed_origin.as_deref())?;
    let app = routes::create_routes(state, cors);

    let address = config.address();
    let socket: SocketAddr = address
        .parse()
        .map_err(|_| ServerError::Address(address.clone()))?;

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {address}");
    axum_server::bind(socket)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
