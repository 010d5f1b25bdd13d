//! Data models for stored records and request/response payloads.

/// API key records and key management payloads
pub mod api_key;
/// Audit log entries and statistics
pub mod audit;
/// Script execution request and result
pub mod execution;
