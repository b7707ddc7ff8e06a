use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::member::MemberKind;
use crate::module::{Module, Namespace};

/// Runnable self-check bound to a contract; executed against the raw
/// module before it is trusted.
pub type CheckFn =
    Arc<dyn Fn(Arc<Module>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Export transform: given the fully executed module, returns the curated
/// namespace containing only sanctioned members.
pub type ExportFn = Arc<dyn Fn(&Module) -> Namespace + Send + Sync>;

/// One entry of a contract's public-surface list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractMember {
    pub kind: MemberKind,
    pub required: bool,
}

pub struct SelfCheck {
    pub name: String,
    pub run: CheckFn,
}

/// Declared public surface of a unit plus optional self-checks and an
/// optional export transform. Built by contract units and read back by
/// the validator.
#[derive(Default)]
pub struct Contract {
    surface: IndexMap<String, ContractMember>,
    checks: Vec<SelfCheck>,
    export: Option<ExportFn>,
}

impl Contract {
    pub fn new() -> Self {
        Contract::default()
    }

    /// Declare a member the unit must define.
    pub fn require(mut self, name: impl Into<String>, kind: MemberKind) -> Self {
        self.surface
            .insert(name.into(), ContractMember { kind, required: true });
        self
    }

    /// Declare a member the unit may define.
    pub fn optional(mut self, name: impl Into<String>, kind: MemberKind) -> Self {
        self.surface
            .insert(name.into(), ContractMember { kind, required: false });
        self
    }

    /// Attach a runnable self-check, executed in declaration order.
    pub fn check<F, Fut>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(Arc<Module>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.checks.push(SelfCheck {
            name: name.into(),
            run: Arc::new(move |module| Box::pin(run(module))),
        });
        self
    }

    /// Replace the default surface filter with a custom export transform.
    pub fn export<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Module) -> Namespace + Send + Sync + 'static,
    {
        self.export = Some(Arc::new(transform));
        self
    }

    pub fn surface(&self) -> &IndexMap<String, ContractMember> {
        &self.surface
    }

    pub fn checks(&self) -> &[SelfCheck] {
        &self.checks
    }

    pub fn export_fn(&self) -> Option<ExportFn> {
        self.export.clone()
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("surface", &self.surface.keys().collect::<Vec<_>>())
            .field("checks", &self.checks.len())
            .field("export", &self.export.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_surface_and_checks() {
        let contract = Contract::new()
            .require("post", MemberKind::Callable)
            .optional("defaults", MemberKind::Map)
            .check("smoke", |_module| async { Ok(()) });

        assert_eq!(contract.surface().len(), 2);
        assert!(contract.surface()["post"].required);
        assert!(!contract.surface()["defaults"].required);
        assert_eq!(contract.checks().len(), 1);
        assert_eq!(contract.checks()[0].name, "smoke");
        assert!(contract.export_fn().is_none());
    }
}
