//! Core data model for the trellis resource framework: logical paths,
//! namespaces and modules, unit contracts, the `Unit` plugin trait, the
//! collaborator registry, and the shared load-error taxonomy.

mod contract;
mod error;
mod member;
mod module;
pub mod path;
mod registry;
mod unit;

pub use contract::{CheckFn, Contract, ContractMember, ExportFn, SelfCheck};
pub use error::LoadError;
pub use member::{CallArgs, Member, MemberKind, UnitFn, value_is_truthy};
pub use module::{Module, Namespace};
pub use registry::{Registry, RegistryError};
pub use unit::{DependencyMap, FnUnit, Resolved, ResourceHost, Unit, UnitContext};
