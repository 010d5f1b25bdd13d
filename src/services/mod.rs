//! Core services.
//!
//! Services hold the webhook's logic, separated from HTTP handlers and from
//! the storage backends they run on.

pub mod audit_log;
pub mod capabilities;
pub mod execution_engine;
pub mod key_store;
pub mod request_handler;
