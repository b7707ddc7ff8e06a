use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::oneshot;

use trellis_unit::path::{is_data_path, normalize_path};
use trellis_unit::{
    CallArgs, LoadError, Member, Module, Registry, Resolved, ResourceHost, Unit, UnitContext,
};

use crate::backend::Backend;
use crate::contract::validate;
use crate::units::UnitRegistry;

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Module>, LoadError>>>;

/// One cache table entry. `Ready` holds the raw (unfiltered) module;
/// `Pending` lets racing callers await the owner's in-flight load instead
/// of being misreported as a cycle.
enum Slot {
    Ready(Arc<Module>),
    Pending(SharedLoad),
}

enum Role {
    Owner(oneshot::Sender<Result<Arc<Module>, LoadError>>),
    Waiter(SharedLoad),
    Hit(Arc<Module>),
}

/// Per-call knobs for [`Loader::resolve`].
#[derive(Clone, Default)]
pub struct ResolveOptions {
    /// Return the raw module without contract filtering. Used internally
    /// for dependency resolution, where filtering would hide symbols a
    /// dependent unit needs directly.
    pub skip_validation: bool,
    /// Execute the contract's self-checks during validation.
    pub run_checks: bool,
    /// Adapter name for diagnostics; defaults to the normalized path.
    pub adapter: Option<String>,
    /// Override for resolving this unit's declared dependencies. Nested
    /// loads always use the default resolution.
    pub resolver: Option<Arc<dyn DependencyResolver>>,
}

impl ResolveOptions {
    pub fn validated() -> Self {
        ResolveOptions::default()
    }

    pub fn raw() -> Self {
        ResolveOptions {
            skip_validation: true,
            ..ResolveOptions::default()
        }
    }

    pub fn with_checks(mut self) -> Self {
        self.run_checks = true;
        self
    }

    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

/// Caller-supplied override for dependency resolution.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn resolve_dependency(
        &self,
        loader: &Loader,
        path: &str,
        chain: &[String],
    ) -> Result<Resolved, LoadError>;
}

struct Inner {
    backend: Arc<dyn Backend>,
    units: UnitRegistry,
    registry: Arc<Registry>,
    cache: Mutex<HashMap<String, Slot>>,
    filtered: Mutex<HashMap<String, Arc<Module>>>,
    /// Wait-for edges between in-flight loads: each path a parked task is
    /// currently executing, mapped to the path the task is blocked on.
    /// Consulted before a caller parks on another caller's pending load,
    /// so a cycle split across tasks fails fast instead of deadlocking.
    waiting: Mutex<HashMap<String, String>>,
}

/// Removes a task's wait-for edges when it is done parking (or dropped
/// mid-await).
struct WaitGuard<'a> {
    table: &'a Mutex<HashMap<String, String>>,
    owners: Vec<String>,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        let mut waiting = self.table.lock().unwrap();
        for owner in &self.owners {
            waiting.remove(owner);
        }
    }
}

/// Resolves logical paths into modules or decoded data values. Owns the
/// module cache, the in-flight table, and the collaborator registry; cheap
/// to clone, so executing units can hold a back-reference.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<Inner>,
}

pub struct LoaderBuilder {
    backend: Arc<dyn Backend>,
    registry: Option<Arc<Registry>>,
}

impl LoaderBuilder {
    /// Share a collaborator registry with other components instead of
    /// creating a fresh one.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Loader {
        Loader {
            inner: Arc::new(Inner {
                backend: self.backend,
                units: UnitRegistry::new(),
                registry: self.registry.unwrap_or_default(),
                cache: Mutex::new(HashMap::new()),
                filtered: Mutex::new(HashMap::new()),
                waiting: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl Loader {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Loader::builder(backend).build()
    }

    pub fn builder(backend: Arc<dyn Backend>) -> LoaderBuilder {
        LoaderBuilder {
            backend,
            registry: None,
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.inner.registry.clone()
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.inner.units
    }

    /// Register a unit under a logical path.
    pub fn register_unit(&self, path: impl AsRef<str>, unit: Arc<dyn Unit>) {
        self.inner.units.register(path, unit);
    }

    /// Resolve one logical path end to end: fetch or look up, resolve
    /// declared dependencies first, execute, cache, validate, filter.
    pub async fn resolve(&self, path: &str, opts: ResolveOptions) -> Result<Resolved, LoadError> {
        self.resolve_with_chain(path.to_string(), opts, Vec::new())
            .await
    }

    /// Resolve a path that must be an executable unit, contract-validated.
    pub async fn resolve_module(&self, path: &str) -> Result<Arc<Module>, LoadError> {
        self.resolve(path, ResolveOptions::validated())
            .await?
            .into_module(path)
    }

    /// Resolve a structured-data path to its decoded value.
    pub async fn resolve_data(&self, path: &str) -> Result<Value, LoadError> {
        self.resolve(path, ResolveOptions::raw()).await?.into_data(path)
    }

    /// Resolve a path, register the filtered module as the collaborator
    /// named `name`.
    pub async fn load_manager(&self, name: &str, path: &str) -> Result<Arc<Module>, LoadError> {
        let module = self.resolve_module(path).await?;
        self.inner.registry.insert_manager(name, module.clone());
        log::debug!("manager '{name}' loaded from '{path}'");
        Ok(module)
    }

    /// Resolve a raw module, run its `setup` member with `payload` when it
    /// has one, and append it to the provider list for `service`.
    pub async fn load_provider(
        &self,
        service: &str,
        path: &str,
        payload: Value,
    ) -> Result<Arc<Module>, LoadError> {
        let module = self
            .resolve(path, ResolveOptions::raw())
            .await?
            .into_module(path)?;
        if let Some(Member::Callable(_)) = module.member("setup") {
            module
                .call("setup", CallArgs::new(vec![payload]))
                .await
                .map_err(|err| {
                    LoadError::execution(module.name(), path, format!("provider setup failed: {err}"))
                })?;
        }
        self.inner.registry.add_provider(service, module.clone());
        log::debug!("provider for '{service}' loaded from '{path}'");
        Ok(module)
    }

    pub(crate) fn resolve_with_chain(
        &self,
        path: String,
        opts: ResolveOptions,
        chain: Vec<String>,
    ) -> BoxFuture<'_, Result<Resolved, LoadError>> {
        async move {
            let path = normalize_path(&path);
            if path.is_empty() {
                return Err(LoadError::not_found("loader", path, "empty logical path"));
            }
            let adapter = opts.adapter.clone().unwrap_or_else(|| path.clone());

            if is_data_path(&path) {
                let text = self.inner.backend.fetch(&path).await?;
                let value: Value = serde_json::from_str(&text).map_err(|err| {
                    LoadError::execution(&adapter, &path, format!("data decode failed: {err}"))
                })?;
                return Ok(Resolved::Data(value));
            }

            if !opts.skip_validation && !opts.run_checks {
                if let Some(module) = self.inner.filtered.lock().unwrap().get(&path) {
                    return Ok(Resolved::Module(module.clone()));
                }
            }

            let module = self.load_unit(&path, &adapter, &opts, &chain).await?;
            if opts.skip_validation {
                return Ok(Resolved::Module(module));
            }
            let filtered = validate(self, module, &path, &chain, opts.run_checks).await?;
            if !opts.run_checks {
                self.inner
                    .filtered
                    .lock()
                    .unwrap()
                    .insert(path.clone(), filtered.clone());
            }
            Ok(Resolved::Module(filtered))
        }
        .boxed()
    }

    /// Obtain the raw module for `path`: cache hit, await of another
    /// caller's in-flight load, or an owned load. A path already on the
    /// current resolution chain is a dependency cycle and fails fast.
    async fn load_unit(
        &self,
        path: &str,
        adapter: &str,
        opts: &ResolveOptions,
        chain: &[String],
    ) -> Result<Arc<Module>, LoadError> {
        if chain.iter().any(|entry| entry == path) {
            return Err(LoadError::cycle(
                adapter,
                path,
                "resource is already being resolved on this call chain",
            ));
        }

        let role = {
            let mut cache = self.inner.cache.lock().unwrap();
            match cache.get(path) {
                Some(Slot::Ready(module)) => Role::Hit(module.clone()),
                Some(Slot::Pending(shared)) => Role::Waiter(shared.clone()),
                None => {
                    let (tx, rx) = oneshot::channel::<Result<Arc<Module>, LoadError>>();
                    let owner_path = path.to_string();
                    let waiter: BoxFuture<'static, Result<Arc<Module>, LoadError>> =
                        async move {
                            match rx.await {
                                Ok(outcome) => outcome,
                                Err(_) => Err(LoadError::execution(
                                    "loader",
                                    owner_path,
                                    "in-flight load dropped before completion",
                                )),
                            }
                        }
                        .boxed();
                    cache.insert(path.to_string(), Slot::Pending(waiter.shared()));
                    Role::Owner(tx)
                }
            }
        };

        match role {
            Role::Hit(module) => {
                log::debug!("cache hit for '{path}'");
                Ok(module)
            }
            Role::Waiter(shared) => {
                let _guard = self.park_on(path, adapter, chain)?;
                shared.await
            }
            Role::Owner(tx) => {
                let outcome = self.execute_unit(path, adapter, opts, chain).await;
                {
                    let mut cache = self.inner.cache.lock().unwrap();
                    match &outcome {
                        Ok(module) => {
                            cache.insert(path.to_string(), Slot::Ready(module.clone()));
                        }
                        Err(_) => {
                            cache.remove(path);
                        }
                    }
                }
                // Waiters may all have gone away; that is fine.
                let _ = tx.send(outcome.clone());
                outcome
            }
        }
    }

    /// Record that this caller is about to block on another caller's
    /// in-flight load of `path`. Walking the wait-for edges from `path`
    /// must not reach a path this caller is itself executing; when it
    /// does, the two tasks hold the two halves of one dependency cycle
    /// and waiting would deadlock. The check and the edge insertion are
    /// atomic under the table lock.
    fn park_on(
        &self,
        path: &str,
        adapter: &str,
        chain: &[String],
    ) -> Result<Option<WaitGuard<'_>>, LoadError> {
        if chain.is_empty() {
            // A top-level caller executes nothing others could wait on.
            return Ok(None);
        }
        let mut waiting = self.inner.waiting.lock().unwrap();
        let mut cursor = path.to_string();
        loop {
            if chain.iter().any(|entry| entry == &cursor) {
                return Err(LoadError::cycle(
                    adapter,
                    path,
                    format!("waiting on this load would deadlock: its resolution is blocked on '{cursor}'"),
                ));
            }
            match waiting.get(&cursor) {
                Some(next) => cursor = next.clone(),
                None => break,
            }
        }
        for owner in chain {
            waiting.insert(owner.clone(), path.to_string());
        }
        Ok(Some(WaitGuard {
            table: &self.inner.waiting,
            owners: chain.to_vec(),
        }))
    }

    /// Resolve declared dependencies in order, then run the unit against a
    /// context carrying them. Runs exactly once per path for the cache.
    async fn execute_unit(
        &self,
        path: &str,
        adapter: &str,
        opts: &ResolveOptions,
        chain: &[String],
    ) -> Result<Arc<Module>, LoadError> {
        let unit = self.inner.units.get(path).ok_or_else(|| {
            LoadError::not_found("registry", path, "no unit registered under this path")
        })?;

        let mut child_chain = chain.to_vec();
        child_chain.push(path.to_string());

        let mut deps: IndexMap<String, Resolved> = IndexMap::new();
        for (name, dep_path) in unit.dependencies() {
            let resolved = match &opts.resolver {
                Some(resolver) => {
                    resolver
                        .resolve_dependency(self, &dep_path, &child_chain)
                        .await
                }
                None => {
                    self.resolve_with_chain(
                        dep_path.clone(),
                        ResolveOptions::raw(),
                        child_chain.clone(),
                    )
                    .await
                }
            };
            let resolved = resolved.map_err(|err| match err {
                cycle @ LoadError::Cycle { .. } => cycle,
                other => LoadError::execution(
                    adapter,
                    path,
                    format!("dependency '{dep_path}' failed to load: {other}"),
                ),
            })?;
            deps.insert(name, resolved);
        }

        let ctx = UnitContext::new(deps, Arc::new(self.clone()), child_chain);
        let namespace = unit
            .load(ctx)
            .await
            .map_err(|err| LoadError::execution(adapter, path, err.to_string()))?;
        Ok(Arc::new(Module::new(adapter, path, namespace)))
    }
}

#[async_trait]
impl ResourceHost for Loader {
    async fn resource(&self, path: &str, chain: &[String]) -> Result<Resolved, LoadError> {
        self.resolve_with_chain(path.to_string(), ResolveOptions::raw(), chain.to_vec())
            .await
    }
}
