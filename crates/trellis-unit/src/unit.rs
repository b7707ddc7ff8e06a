use std::future::Future;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::LoadError;
use crate::module::{Module, Namespace};

/// Declared dependency map of a unit: binding name to logical path.
/// Iteration order is resolution order.
pub type DependencyMap = IndexMap<String, String>;

/// Outcome of resolving a logical path: an executed module for unit paths,
/// a decoded value for structured-data paths.
#[derive(Debug, Clone)]
pub enum Resolved {
    Module(Arc<Module>),
    Data(Value),
}

impl Resolved {
    pub fn into_module(self, path: &str) -> Result<Arc<Module>, LoadError> {
        match self {
            Resolved::Module(module) => Ok(module),
            Resolved::Data(_) => Err(LoadError::execution(
                "loader",
                path,
                "expected an executable unit but resolved structured data",
            )),
        }
    }

    pub fn into_data(self, path: &str) -> Result<Value, LoadError> {
        match self {
            Resolved::Data(value) => Ok(value),
            Resolved::Module(_) => Err(LoadError::execution(
                "loader",
                path,
                "expected structured data but resolved an executable unit",
            )),
        }
    }
}

/// Back-reference handed to executing units so they can request further
/// resources through the loader that is executing them. Requests carry the
/// current resolution chain so reentrant paths are still caught as cycles.
#[async_trait]
pub trait ResourceHost: Send + Sync {
    async fn resource(&self, path: &str, chain: &[String]) -> Result<Resolved, LoadError>;
}

/// One loadable unit: a statically declared dependency map read without
/// executing anything, and an async `load` that builds the namespace once
/// every declared dependency has been resolved.
#[async_trait]
pub trait Unit: Send + Sync {
    fn dependencies(&self) -> DependencyMap {
        DependencyMap::new()
    }

    async fn load(&self, ctx: UnitContext) -> anyhow::Result<Namespace>;
}

/// Execution context for [`Unit::load`]: resolved dependencies bound under
/// their declared names, the loader back-reference, and the resolution
/// chain that led here.
#[derive(Clone)]
pub struct UnitContext {
    deps: IndexMap<String, Resolved>,
    host: Arc<dyn ResourceHost>,
    chain: Vec<String>,
}

impl UnitContext {
    pub fn new(
        deps: IndexMap<String, Resolved>,
        host: Arc<dyn ResourceHost>,
        chain: Vec<String>,
    ) -> Self {
        UnitContext { deps, host, chain }
    }

    /// A dependency resolved under its declared name. Units only see names
    /// from their own dependency map, so a miss is a programming error in
    /// the unit itself.
    pub fn dependency(&self, name: &str) -> anyhow::Result<Resolved> {
        match self.deps.get(name) {
            Some(resolved) => Ok(resolved.clone()),
            None => bail!("unit did not declare a dependency named '{name}'"),
        }
    }

    /// A dependency that must be an executable module.
    pub fn dependency_module(&self, name: &str) -> anyhow::Result<Arc<Module>> {
        match self.dependency(name)? {
            Resolved::Module(module) => Ok(module),
            Resolved::Data(_) => bail!("dependency '{name}' is structured data, not a module"),
        }
    }

    /// A dependency that must be a structured-data resource.
    pub fn dependency_data(&self, name: &str) -> anyhow::Result<Value> {
        match self.dependency(name)? {
            Resolved::Data(value) => Ok(value),
            Resolved::Module(_) => bail!("dependency '{name}' is a module, not structured data"),
        }
    }

    pub fn dependencies(&self) -> &IndexMap<String, Resolved> {
        &self.deps
    }

    /// Resolve a further resource through the owning loader, preserving the
    /// current resolution chain. Runs in skip-validation mode, matching how
    /// declared dependencies are resolved.
    pub async fn resource(&self, path: &str) -> Result<Resolved, LoadError> {
        self.host.resource(path, &self.chain).await
    }

    pub fn host(&self) -> Arc<dyn ResourceHost> {
        self.host.clone()
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }
}

type BuildFn =
    Arc<dyn Fn(UnitContext) -> BoxFuture<'static, anyhow::Result<Namespace>> + Send + Sync>;

/// Unit built from a closure; the registration-friendly way to define
/// units without a dedicated type.
pub struct FnUnit {
    deps: DependencyMap,
    build: BuildFn,
}

impl FnUnit {
    pub fn new<F, Fut>(build: F) -> Self
    where
        F: Fn(UnitContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Namespace>> + Send + 'static,
    {
        FnUnit {
            deps: DependencyMap::new(),
            build: Arc::new(move |ctx| Box::pin(build(ctx))),
        }
    }

    /// Declare a dependency to resolve before `load` runs.
    pub fn depends_on(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.deps.insert(name.into(), path.into());
        self
    }
}

#[async_trait]
impl Unit for FnUnit {
    fn dependencies(&self) -> DependencyMap {
        self.deps.clone()
    }

    async fn load(&self, ctx: UnitContext) -> anyhow::Result<Namespace> {
        (self.build)(ctx).await
    }
}
