//! Capability scanning.
//!
//! Reads each loaded module's type catalog and keeps the concrete types that
//! are assignable to the requested capability.

use std::panic;
use std::sync::Arc;

use capload_sdk::guard::panic_message;
use capload_sdk::{Capability, TypeDescriptor, TypeKind};
use tracing::{debug, info};

use crate::diagnostics::{Diagnostic, Staged};
use crate::loader::{LoadedModule, ModuleImage};

/// A concrete type that can be instantiated for a capability.
#[derive(Debug)]
pub struct CandidateType {
    /// Name of the module that defines the type
    pub module: String,
    /// Qualified type name
    pub type_name: String,
    // The descriptor's closures live in the module, so it never leaves the
    // candidate. Declared before the image so it is dropped first.
    pub(crate) descriptor: TypeDescriptor,
    image: Arc<ModuleImage>,
}

impl CandidateType {
    /// Handle keeping the defining module mapped
    pub fn image(&self) -> &Arc<ModuleImage> {
        &self.image
    }

    /// Whether the type declares a no-argument constructor.
    pub fn has_default_constructor(&self) -> bool {
        self.descriptor.has_default_constructor()
    }

    /// Every capability the type declares.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> + '_ {
        self.descriptor.capabilities()
    }
}

/// Scan modules for implementations of `C`.
pub fn scan<C: Capability>(modules: &[LoadedModule]) -> Staged<CandidateType> {
    scan_named(modules, C::NAME)
}

/// Scan modules for types assignable to the named capability.
///
/// Modules are scanned in order and each catalog keeps its own order. A
/// module whose catalog cannot be read contributes nothing and is reported.
pub fn scan_named(modules: &[LoadedModule], capability: &str) -> Staged<CandidateType> {
    let mut candidates = Vec::new();
    let mut diagnostics = Vec::new();

    for module in modules {
        attach_dependencies(module);

        let catalog = match panic::catch_unwind(module.entry.catalog) {
            Ok(Ok(catalog)) => catalog,
            Ok(Err(e)) => {
                diagnostics.push(
                    Diagnostic::CapabilityScanFailure {
                        module: module.name.clone(),
                        capability: capability.to_string(),
                        message: e.message.clone(),
                        nested: e.loader_errors().to_vec(),
                    }
                    .emitted(),
                );
                continue;
            }
            Err(payload) => {
                diagnostics.push(
                    Diagnostic::CapabilityScanFailure {
                        module: module.name.clone(),
                        capability: capability.to_string(),
                        message: format!("catalog panicked: {}", panic_message(payload.as_ref())),
                        nested: Vec::new(),
                    }
                    .emitted(),
                );
                continue;
            }
        };

        let before = candidates.len();
        for descriptor in catalog.into_types() {
            if descriptor.kind() != TypeKind::Concrete || !descriptor.is_assignable_to(capability) {
                continue;
            }
            candidates.push(CandidateType {
                module: module.name.clone(),
                type_name: descriptor.name().to_string(),
                descriptor,
                image: Arc::clone(module.image()),
            });
        }
        debug!(
            category = "plugin",
            module = %module.name,
            capability = %capability,
            candidates = candidates.len() - before,
            "Module scanned"
        );
    }

    info!(
        category = "plugin",
        capability = %capability,
        modules = modules.len(),
        candidates = candidates.len(),
        "Capability scan complete"
    );
    (candidates, diagnostics)
}

/// Run the module's attach hook, if any. The outcome never affects scanning.
fn attach_dependencies(module: &LoadedModule) {
    let Some(attach) = module.entry.attach else {
        return;
    };
    match panic::catch_unwind(attach) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(
                category = "plugin",
                module = %module.name,
                error = %e,
                "Dependency attach failed"
            );
        }
        Err(payload) => {
            debug!(
                category = "plugin",
                module = %module.name,
                error = %panic_message(payload.as_ref()),
                "Dependency attach panicked"
            );
        }
    }
}
