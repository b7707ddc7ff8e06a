use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::bail;
use indexmap::IndexMap;
use serde_json::Value;

use crate::contract::Contract;
use crate::member::{CallArgs, Member, UnitFn};

/// Namespace produced by executing one unit: an ordered map of member
/// bindings, plus the contract declaration when the unit *is* a contract.
#[derive(Clone, Default)]
pub struct Namespace {
    members: IndexMap<String, Member>,
    contract: Option<Arc<Contract>>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, member: Member) {
        self.members.insert(name.into(), member);
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: Value) {
        self.insert(name, Member::Value(value));
    }

    /// Bind an async callable under `name`.
    pub fn insert_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let callable: UnitFn = Arc::new(move |args| Box::pin(f(args)));
        self.insert(name, Member::Callable(callable));
    }

    /// Declare the contract carried by this namespace. Only contract units
    /// set this; the validator reads it back off the loaded module.
    pub fn set_contract(&mut self, contract: Contract) {
        self.contract = Some(Arc::new(contract));
    }

    pub fn contract(&self) -> Option<Arc<Contract>> {
        self.contract.clone()
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .field("contract", &self.contract.is_some())
            .finish()
    }
}

/// Immutable result of resolving one executable resource: the adapter
/// name, the normalized logical path, the (possibly filtered) namespace,
/// and the contract attached after validation.
#[derive(Clone)]
pub struct Module {
    name: String,
    path: String,
    namespace: Namespace,
    contract: Option<Arc<Contract>>,
}

impl Module {
    pub fn new(name: impl Into<String>, path: impl Into<String>, namespace: Namespace) -> Self {
        Module {
            name: name.into(),
            path: path.into(),
            namespace,
            contract: None,
        }
    }

    pub fn with_contract(mut self, contract: Arc<Contract>) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Adapter name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.namespace.get(name)
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.namespace.names().collect()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Contract the validator attached to this (filtered) module.
    pub fn contract(&self) -> Option<Arc<Contract>> {
        self.contract.clone()
    }

    /// Contract declaration embedded in the namespace itself; present only
    /// on loaded contract units.
    pub fn declared_contract(&self) -> Option<Arc<Contract>> {
        self.namespace.contract()
    }

    /// Invoke a callable member. Missing or non-callable members are the
    /// caller's problem, surfaced at the point of use.
    pub async fn call(&self, name: &str, args: CallArgs) -> anyhow::Result<Value> {
        match self.member(name) {
            Some(Member::Callable(f)) => f(args).await,
            Some(other) => bail!(
                "member '{name}' of '{}' is {} rather than callable",
                self.path,
                other.kind()
            ),
            None => bail!("module '{}' has no member '{name}'", self.path),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("members", &self.namespace.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn call_dispatches_to_callable_members() {
        let mut ns = Namespace::new();
        ns.insert_value("greeting", json!("hello"));
        ns.insert_fn("echo", |call: CallArgs| async move {
            Ok(call.args.first().cloned().unwrap_or(Value::Null))
        });
        let module = Module::new("demo", "demo.unit", ns);

        let out = module
            .call("echo", CallArgs::new(vec![json!(42)]))
            .await
            .unwrap();
        assert_eq!(out, json!(42));

        let err = module
            .call("greeting", CallArgs::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rather than callable"));

        let err = module.call("absent", CallArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("no member 'absent'"));
    }

    #[test]
    fn namespace_preserves_insertion_order() {
        let mut ns = Namespace::new();
        ns.insert_value("b", json!(1));
        ns.insert_value("a", json!(2));
        let names: Vec<_> = ns.names().collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
