//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

use crate::services::audit_log::DEFAULT_MAX_ENTRIES;

/// Where API keys and the audit log are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local; everything is lost on restart.
    Memory,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `STORAGE_BACKEND` (optional): `postgres` (default) or `memory`
/// - `DATABASE_URL` (required for postgres): PostgreSQL connection string
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `AUDIT_MAX_ENTRIES` (optional): audit log cap, defaults to 10000
/// - `SCRIPT_MAX_OPERATIONS` (optional): per-script operation ceiling, 0 (default) = unlimited
/// - `ADMIN_TOKEN` (optional): enables the `/admin` routes when set
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_backend")]
    pub storage_backend: StorageBackend,

    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_audit_max_entries")]
    pub audit_max_entries: usize,

    #[serde(default)]
    pub script_max_operations: u64,

    #[serde(default)]
    pub admin_token: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_backend() -> StorageBackend {
    StorageBackend::Postgres
}

fn default_max_connections() -> u32 {
    5
}

fn default_audit_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into
    /// expected types, or if `AUDIT_MAX_ENTRIES` is 0. A missing `DATABASE_URL`
    /// is reported at startup, once the backend is known.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()?.validated()
    }

    fn validated(self) -> Result<Self, envy::Error> {
        if self.audit_max_entries == 0 {
            return Err(envy::Error::Custom(
                "AUDIT_MAX_ENTRIES must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// In-memory configuration with defaults, for tests and local runs.
    pub fn in_memory() -> Self {
        Self {
            server_port: default_port(),
            storage_backend: StorageBackend::Memory,
            database_url: None,
            database_max_connections: default_max_connections(),
            audit_max_entries: DEFAULT_MAX_ENTRIES,
            script_max_operations: 0,
            admin_token: None,
        }
    }
}
