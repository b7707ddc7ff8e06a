use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value;

use crate::module::Module;

/// Callable member of a namespace. Collaborators injected by the flow
/// wrapper arrive through [`CallArgs::managers`], after the caller-supplied
/// positional arguments.
pub type UnitFn =
    Arc<dyn Fn(CallArgs) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Arguments handed to a callable member.
#[derive(Clone, Default)]
pub struct CallArgs {
    /// Caller-supplied positional arguments.
    pub args: Vec<Value>,
    /// Injected collaborators, in declared order.
    pub managers: Vec<Arc<Module>>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>) -> Self {
        CallArgs {
            args,
            managers: Vec::new(),
        }
    }

    pub fn with_managers(mut self, managers: Vec<Arc<Module>>) -> Self {
        self.managers = managers;
        self
    }
}

/// Expected kind of a contract-declared member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Callable,
    Map,
    Value,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MemberKind::Callable => "callable",
            MemberKind::Map => "map",
            MemberKind::Value => "value",
        };
        f.write_str(label)
    }
}

/// One binding inside an executed unit's namespace.
#[derive(Clone)]
pub enum Member {
    Value(Value),
    Map(IndexMap<String, Member>),
    Callable(UnitFn),
}

impl Member {
    pub fn kind(&self) -> MemberKind {
        match self {
            Member::Value(_) => MemberKind::Value,
            Member::Map(_) => MemberKind::Map,
            Member::Callable(_) => MemberKind::Callable,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Member::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Member::Map(map) => f.debug_tuple("Map").field(&map.keys().collect::<Vec<_>>()).finish(),
            Member::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// Acceptance rule shared with the executor's race primitive: `null`,
/// `false`, empty strings, arrays and objects are falsy.
pub fn value_is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}
