//! HTTP middleware components.

/// Admin bearer-token authentication middleware
pub mod auth;
