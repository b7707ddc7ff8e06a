//! Resource loader for the trellis framework: backend I/O, the unit
//! registry, recursive dependency resolution with caching and cycle
//! detection, and contract validation with export filtering.

mod backend;
mod contract;
mod loader;
mod units;

pub use backend::{Backend, FsBackend, MemBackend};
pub use loader::{DependencyResolver, Loader, LoaderBuilder, ResolveOptions};
pub use units::UnitRegistry;
