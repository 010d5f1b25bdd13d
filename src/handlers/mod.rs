//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (raw body, JSON, URL params)
//! 2. Delegates to the services in `AppState`
//! 3. Returns HTTP response (JSON, status code)

/// Key and audit log administration endpoints
pub mod admin;
pub mod health;
/// Script execution webhook
pub mod webhook;
