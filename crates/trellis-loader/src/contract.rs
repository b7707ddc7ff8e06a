//! Contract validation and export filtering. A unit's contract lives in a
//! sibling unit at a fixed derived path; the contract is resolved raw
//! (contracts cannot require contracts), its surface list is checked
//! against the executed namespace, and only sanctioned members survive
//! into the returned module.

use std::sync::Arc;

use trellis_unit::path::contract_path;
use trellis_unit::{Contract, LoadError, Module, Namespace};

use crate::loader::{Loader, ResolveOptions};

pub(crate) async fn validate(
    loader: &Loader,
    module: Arc<Module>,
    path: &str,
    chain: &[String],
    run_checks: bool,
) -> Result<Arc<Module>, LoadError> {
    let cpath = contract_path(path);
    let adapter = format!("{}.test", module.name());

    let contract = match loader
        .resolve_with_chain(cpath.clone(), ResolveOptions::raw(), chain.to_vec())
        .await
    {
        Ok(resolved) => {
            let contract_module = resolved
                .into_module(&cpath)
                .map_err(|err| LoadError::contract(&adapter, &cpath, err.message().to_string()))?;
            match contract_module.declared_contract() {
                Some(contract) => contract,
                None => {
                    log::warn!(
                        "contract unit '{cpath}' declares no surface; exposing nothing for '{path}'"
                    );
                    return Ok(empty_filtered(&module, path));
                }
            }
        }
        Err(err) if err.is_not_found() => {
            log::warn!("no contract found for '{path}'; exposing nothing");
            return Ok(empty_filtered(&module, path));
        }
        Err(err) => {
            return Err(LoadError::contract(
                &adapter,
                &cpath,
                format!("contract load failed: {err}"),
            ));
        }
    };

    for (name, decl) in contract.surface() {
        match module.member(name) {
            Some(member) if member.kind() != decl.kind => {
                return Err(LoadError::contract(
                    module.name(),
                    path,
                    format!(
                        "member '{name}' is {} but the contract expects {}",
                        member.kind(),
                        decl.kind
                    ),
                ));
            }
            Some(_) => {}
            None if decl.required => {
                return Err(LoadError::contract(
                    module.name(),
                    path,
                    format!("required member '{name}' is missing"),
                ));
            }
            None => {}
        }
    }

    if run_checks {
        for check in contract.checks() {
            (check.run)(module.clone()).await.map_err(|err| {
                LoadError::contract(
                    &adapter,
                    &cpath,
                    format!("self-check '{}' failed: {err}", check.name),
                )
            })?;
        }
    }

    let namespace = match contract.export_fn() {
        Some(export) => export(&module),
        None => surface_filter(&module, &contract),
    };
    log::debug!(
        "contract for '{path}' approved {} of {} members",
        namespace.len(),
        module.member_names().len()
    );
    Ok(Arc::new(
        Module::new(module.name(), path, namespace).with_contract(contract),
    ))
}

/// Default export: the namespace restricted to surface-listed members that
/// the unit actually defines.
fn surface_filter(module: &Module, contract: &Contract) -> Namespace {
    let mut namespace = Namespace::new();
    for name in contract.surface().keys() {
        if let Some(member) = module.member(name) {
            namespace.insert(name.clone(), member.clone());
        }
    }
    namespace
}

/// A load with no usable contract exposes nothing; callers that need
/// members fail at the point of use, not at load time.
fn empty_filtered(module: &Module, path: &str) -> Arc<Module> {
    Arc::new(Module::new(module.name(), path, Namespace::new()))
}
