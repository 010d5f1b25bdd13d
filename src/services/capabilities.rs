//! Capabilities injected into the script scope.
//!
//! A capability is an opaque object granting access to one external service.
//! The engine never inspects capabilities; it only binds each one into the
//! script scope under its name.

use std::collections::BTreeMap;

use rhai::{Dynamic, Engine};
use serde_json::Value;

/// Name → value bindings for one execution.
pub type CapabilitySet = BTreeMap<String, Dynamic>;

/// Supplies the capability bindings and any native types they need.
pub trait CapabilityProvider: Send + Sync {
    /// Register native types and functions. Called once, when the engine is built.
    fn register(&self, _engine: &mut Engine) {}

    /// Bindings for a single execution.
    fn capabilities(&self) -> CapabilitySet;
}

/// Provider with no bindings; scripts see only the language itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapabilities;

impl CapabilityProvider for NoCapabilities {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new()
    }
}

/// Provider binding plain data values (objects become Rhai object maps).
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    bindings: CapabilitySet,
}

impl StaticCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name`. Values with no Rhai form are skipped.
    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        match rhai::serde::to_dynamic(&value) {
            Ok(dynamic) => {
                self.bindings.insert(name, dynamic);
            }
            Err(err) => tracing::warn!(%name, error = %err, "capability value skipped"),
        }
        self
    }
}

impl CapabilityProvider for StaticCapabilities {
    fn capabilities(&self) -> CapabilitySet {
        self.bindings.clone()
    }
}
