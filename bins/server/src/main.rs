//! Tierstore API Server
//!
//! Main entry point for the tiered object storage service.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tierstore_api::{AppState, create_router};
use tierstore_core::storage::{ObjectStorageService, StorageConfig};
use tierstore_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tierstore=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    // Bind the storage tier once for the process lifetime
    let storage = ObjectStorageService::from_config(StorageConfig::from(&config.storage))
        .context("failed to initialize object storage")?;
    info!(
        provider = %storage.active_provider(),
        local_root = %config.storage.local_root,
        "Object storage ready"
    );

    // Create router
    let app = create_router(AppState::new(storage));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
