//! Script Webhook - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Open the storage backend (PostgreSQL pool + migrations, or in-memory)
//! 3. Build the services and the HTTP router
//! 4. Start server on configured port

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use script_webhook::{
    build_router,
    config::{Config, StorageBackend},
    db,
    services::capabilities::NoCapabilities,
    state::AppState,
    storage::{
        KeyValueStore, MemoryKeyValueStore, MemoryTabularStore, PgKeyValueStore, PgTabularStore,
        TabularStore,
    },
};

/// Sheet name of the audit log inside `tabular_rows`.
const AUDIT_SHEET: &str = "audit_log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(backend = ?config.storage_backend, "Configuration loaded");

    let key_values: Arc<dyn KeyValueStore>;
    let rows: Arc<dyn TabularStore>;

    match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORAGE_BACKEND=postgres")?;

            let pool = db::create_pool(database_url, config.database_max_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            key_values = Arc::new(PgKeyValueStore::new(pool.clone()));
            rows = Arc::new(PgTabularStore::new(pool, AUDIT_SHEET));
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; keys and audit log are lost on restart");
            key_values = Arc::new(MemoryKeyValueStore::new());
            rows = Arc::new(MemoryTabularStore::new());
        }
    }

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set; admin routes are disabled");
    }

    let port = config.server_port;
    let state = AppState::build(config, key_values, rows, Arc::new(NoCapabilities)).await?;
    let app = build_router(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
