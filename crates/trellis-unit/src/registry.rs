use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::module::Module;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no collaborator registered under '{0}'")]
    Missing(String),
}

/// Name-keyed store of singleton collaborators (managers) plus per-service
/// provider lists. Owned by the loader and shared by handle; the flow
/// wrapper consults it to inject collaborators by name.
#[derive(Debug, Default)]
pub struct Registry {
    managers: Mutex<HashMap<String, Arc<Module>>>,
    providers: Mutex<HashMap<String, Vec<Arc<Module>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a singleton collaborator. Re-registering a name replaces
    /// the previous entry.
    pub fn insert_manager(&self, name: impl Into<String>, module: Arc<Module>) {
        let name = name.into();
        let mut guard = self.managers.lock().unwrap();
        if guard.insert(name.clone(), module).is_some() {
            log::warn!("collaborator '{name}' replaced in registry");
        }
    }

    pub fn manager(&self, name: &str) -> Result<Arc<Module>, RegistryError> {
        self.managers
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Missing(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.managers.lock().unwrap().contains_key(name)
    }

    /// Append a provider to the list registered for `service`.
    pub fn add_provider(&self, service: impl Into<String>, module: Arc<Module>) {
        self.providers
            .lock()
            .unwrap()
            .entry(service.into())
            .or_default()
            .push(module);
    }

    pub fn providers(&self, service: &str) -> Vec<Arc<Module>> {
        self.providers
            .lock()
            .unwrap()
            .get(service)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Namespace;

    fn module(path: &str) -> Arc<Module> {
        Arc::new(Module::new(path, path, Namespace::new()))
    }

    #[test]
    fn manager_lookup_round_trip() {
        let registry = Registry::new();
        registry.insert_manager("messenger", module("infrastructure/message/console.unit"));
        assert!(registry.contains("messenger"));
        assert_eq!(
            registry.manager("messenger").unwrap().path(),
            "infrastructure/message/console.unit"
        );
        assert_eq!(
            registry.manager("absent").unwrap_err(),
            RegistryError::Missing("absent".into())
        );
    }

    #[test]
    fn providers_accumulate_per_service() {
        let registry = Registry::new();
        registry.add_provider("persistence", module("infrastructure/persistence/redis.unit"));
        registry.add_provider("persistence", module("infrastructure/persistence/mem.unit"));
        assert_eq!(registry.providers("persistence").len(), 2);
        assert!(registry.providers("presentation").is_empty());
    }
}
