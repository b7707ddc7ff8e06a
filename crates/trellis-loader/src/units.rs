use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use trellis_unit::Unit;
use trellis_unit::path::normalize_path;

/// Registration table for executable units, keyed by normalized logical
/// path. This replaces source fetching for executable resources: a unit is
/// a registered value, not text compiled at run time.
#[derive(Default)]
pub struct UnitRegistry {
    units: Mutex<HashMap<String, Arc<dyn Unit>>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        UnitRegistry::default()
    }

    /// Register a unit. Registering a path twice replaces the earlier
    /// unit; already-cached modules are unaffected.
    pub fn register(&self, path: impl AsRef<str>, unit: Arc<dyn Unit>) {
        let path = normalize_path(path.as_ref());
        if self.units.lock().unwrap().insert(path.clone(), unit).is_some() {
            log::warn!("unit '{path}' replaced in registry");
        }
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn Unit>> {
        self.units.lock().unwrap().get(&normalize_path(path)).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.units.lock().unwrap().contains_key(&normalize_path(path))
    }

    pub fn paths(&self) -> Vec<String> {
        self.units.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_unit::{FnUnit, Namespace};

    #[test]
    fn registration_is_keyed_by_normalized_path() {
        let registry = UnitRegistry::new();
        registry.register(
            "/framework/service/flow.unit",
            Arc::new(FnUnit::new(|_ctx| async { Ok(Namespace::new()) })),
        );
        assert!(registry.contains("framework/service/flow.unit"));
        assert!(registry.get("framework/service/flow.unit").is_some());
        assert!(registry.get("framework/other.unit").is_none());
    }
}
