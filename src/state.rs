//! Shared application state.
//!
//! Services are built once at startup and handed to every handler through
//! axum's `State` extractor.

use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        audit_log::AuditLog,
        capabilities::CapabilityProvider,
        execution_engine::ExecutionEngine,
        key_store::KeyStore,
        request_handler::RequestHandler,
    },
    storage::{KeyValueStore, StoreError, TabularStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub key_store: Arc<KeyStore>,
    pub audit_log: Arc<AuditLog>,
    pub request_handler: Arc<RequestHandler>,
}

impl AppState {
    /// Wire the services on top of the given storage backends.
    ///
    /// # Errors
    ///
    /// Fails if the audit log header cannot be written.
    pub async fn build(
        config: Config,
        key_values: Arc<dyn KeyValueStore>,
        rows: Arc<dyn TabularStore>,
        capabilities: Arc<dyn CapabilityProvider>,
    ) -> Result<Self, StoreError> {
        let key_store = Arc::new(KeyStore::new(key_values));
        let audit_log = Arc::new(AuditLog::open(rows, config.audit_max_entries).await?);
        let engine = Arc::new(ExecutionEngine::new(
            config.script_max_operations,
            capabilities.as_ref(),
        ));

        let request_handler = Arc::new(RequestHandler::new(
            Arc::clone(&key_store),
            Arc::clone(&audit_log),
            engine,
            capabilities,
        ));

        Ok(Self {
            config: Arc::new(config),
            key_store,
            audit_log,
            request_handler,
        })
    }
}
