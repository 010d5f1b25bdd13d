//! Script Webhook - authenticated script execution with an audit trail.
//!
//! A caller POSTs a title, a Rhai script and a long-lived API key. The key is
//! validated against the key store, the script runs in a sandboxed engine
//! against a fixed set of injected capabilities, and every attempt that gets
//! past request parsing is recorded in a size-capped audit log.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: PostgreSQL with sqlx, or in-memory, behind small store traits
//! - **Scripting**: Rhai, with capabilities bound by name into a fresh scope
//! - **Authentication**: UUID API keys, stored as SHA-256 digests
//! - **Format**: JSON requests/responses

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod services;
pub mod state;
pub mod storage;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the HTTP router.
///
/// The `/admin` routes are mounted only when an admin token is configured.
pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public routes
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/webhook", post(handlers::webhook::execute_script));

    if state.config.admin_token.is_some() {
        let admin_routes = Router::new()
            .route(
                "/admin/keys",
                post(handlers::admin::create_key).get(handlers::admin::list_keys),
            )
            .route("/admin/keys/{identifier}", delete(handlers::admin::delete_key))
            .route(
                "/admin/logs",
                get(handlers::admin::list_logs).delete(handlers::admin::clear_logs),
            )
            .route("/admin/logs/stats", get(handlers::admin::log_stats))
            .route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                middleware::auth::admin_auth_middleware,
            ));

        app = app.merge(admin_routes);
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
