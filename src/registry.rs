//! Registry mapping configuration-entry ids to engine instances
//!
//! The command layer receives a registry handle at construction instead of
//! discovering engines through ambient shared state. Entries are added at
//! setup and removed at entry unload; the registry itself lives as long as the
//! process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::battery::EngineHandle;

/// Shared registry of battery engines, keyed by configuration-entry id
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Arc<Mutex<HashMap<String, EngineHandle>>>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine for a configuration entry
    pub fn register(&self, entry_id: impl Into<String>, engine: EngineHandle) {
        let entry_id = entry_id.into();
        log::info!("Registering battery engine for entry {}", entry_id);
        self.engines.lock().unwrap().insert(entry_id, engine);
    }

    /// Remove the engine for a configuration entry, returning it if present
    pub fn unregister(&self, entry_id: &str) -> Option<EngineHandle> {
        let removed = self.engines.lock().unwrap().remove(entry_id);
        if removed.is_some() {
            log::info!("Unregistered battery engine for entry {}", entry_id);
        }
        removed
    }

    /// Look up the engine for a configuration entry
    pub fn find(&self, entry_id: &str) -> Option<EngineHandle> {
        self.engines.lock().unwrap().get(entry_id).cloned()
    }

    /// Currently registered entry ids
    pub fn entry_ids(&self) -> Vec<String> {
        self.engines.lock().unwrap().keys().cloned().collect()
    }

    /// Number of registered engines
    pub fn len(&self) -> usize {
        self.engines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.lock().unwrap().is_empty()
    }
}
