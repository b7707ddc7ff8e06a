//! Call-wrapping decorator ("flow"): wraps unit-level operations so that
//! named collaborators are injected from the registry and any failure is
//! captured into a structured report instead of propagating. The call
//! contract is best-effort with observability: callers that care about
//! failure inspect the returned [`FlowOutcome`] rather than relying on an
//! error path.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use trellis_unit::{CallArgs, Module, Registry, UnitFn};

/// Identity and injection list for one wrapped operation.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    module: String,
    function: String,
    file: &'static str,
    line: u32,
    managers: Vec<String>,
}

impl FlowConfig {
    /// Captures the construction site, so failure reports can point back
    /// at the code that wrapped the operation.
    #[track_caller]
    pub fn new(module: impl Into<String>, function: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        FlowConfig {
            module: module.into(),
            function: function.into(),
            file: location.file(),
            line: location.line(),
            managers: Vec::new(),
        }
    }

    /// Name a collaborator to inject, in declared order, after the
    /// caller-supplied positional arguments.
    pub fn manager(mut self, name: impl Into<String>) -> Self {
        self.managers.push(name.into());
        self
    }
}

/// Structured record of a failed wrapped call. `file` and `line` locate
/// the site that built the [`FlowConfig`].
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub module: String,
    pub function: String,
    pub file: &'static str,
    pub line: u32,
    pub error: String,
    pub args: Vec<Value>,
}

/// Result of a wrapped call: the operation's value, or the captured
/// failure report. The report was already logged when the outcome is
/// produced.
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    Done(Value),
    Failed(FlowReport),
}

impl FlowOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, FlowOutcome::Done(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            FlowOutcome::Done(value) => Some(value),
            FlowOutcome::Failed(_) => None,
        }
    }

    pub fn report(&self) -> Option<&FlowReport> {
        match self {
            FlowOutcome::Done(_) => None,
            FlowOutcome::Failed(report) => Some(report),
        }
    }
}

/// Wrapped asynchronous operation.
pub type FlowFn = Arc<dyn Fn(CallArgs) -> BoxFuture<'static, FlowOutcome> + Send + Sync>;

/// Synchronous operation subject to injection only.
pub type SyncFn = Arc<dyn Fn(CallArgs) -> anyhow::Result<Value> + Send + Sync>;

/// Wrap an async operation: inject the configured collaborators, invoke,
/// and capture any failure into a [`FlowReport`] without re-raising.
pub fn asynchronous(config: FlowConfig, registry: Arc<Registry>, operation: UnitFn) -> FlowFn {
    Arc::new(move |call: CallArgs| {
        let config = config.clone();
        let registry = registry.clone();
        let operation = operation.clone();
        Box::pin(async move {
            let managers = match lookup_managers(&registry, &config.managers) {
                Ok(managers) => managers,
                Err(err) => return fail(&config, &call.args, err.to_string()),
            };
            let args = call.args.clone();
            let injected = CallArgs {
                args: call.args,
                managers: [call.managers, managers].concat(),
            };
            match operation(injected).await {
                Ok(value) => FlowOutcome::Done(value),
                Err(err) => fail(&config, &args, err.to_string()),
            }
        })
    })
}

/// Injection-only variant for synchronous operations: errors propagate to
/// the caller unchanged.
pub fn synchronous(config: FlowConfig, registry: Arc<Registry>, operation: SyncFn) -> SyncFn {
    Arc::new(move |call: CallArgs| {
        let managers = lookup_managers(&registry, &config.managers)?;
        operation(CallArgs {
            args: call.args,
            managers: [call.managers, managers].concat(),
        })
    })
}

fn lookup_managers(
    registry: &Registry,
    names: &[String],
) -> Result<Vec<Arc<Module>>, trellis_unit::RegistryError> {
    names.iter().map(|name| registry.manager(name)).collect()
}

fn fail(config: &FlowConfig, args: &[Value], error: String) -> FlowOutcome {
    let report = FlowReport {
        module: config.module.clone(),
        function: config.function.clone(),
        file: config.file,
        line: config.line,
        error,
        args: args.to_vec(),
    };
    match serde_json::to_string(&report) {
        Ok(encoded) => log::error!("flow call failed: {encoded}"),
        Err(_) => log::error!(
            "flow call failed: {}::{}: {}",
            report.module,
            report.function,
            report.error
        ),
    }
    FlowOutcome::Failed(report)
}
