//! HTTP server entry point.
//!
//! Loads configuration from the environment, opens the database and feature
//! flags, and starts the Axum server on the configured address.

use std::sync::Arc;

use anyhow::{Context, Result};
use labelhost_config::{FeatureFlags, ServerConfig};
use labelhost_server::db::SqliteStore;
use labelhost_server::{router, ServerState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .compact()
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;

    if config.local_files.serving_enabled {
        info!(
            "Local file serving enabled, document root: {}",
            config.local_files.document_root.display()
        );
    } else {
        info!("Local file serving disabled");
    }

    let store = SqliteStore::open(&config.database_url).context("failed to initialize database")?;

    let flags = FeatureFlags::load(&config.feature_flags).unwrap_or_else(|e| {
        warn!("Failed to load feature flags: {}", e);
        FeatureFlags::default()
    });
    info!("Loaded {} feature flags", flags.all_flags().len());

    let addr = config.bind_addr.clone();
    let state = Arc::new(ServerState::new(config, Arc::new(store), flags));
    let app = router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
