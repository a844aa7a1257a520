//! Module loading.
//!
//! The [`ModuleLoader`] turns resolved locations into loaded modules. How a
//! single module is actually opened is delegated to a [`ModuleOpener`];
//! [`NativeOpener`] is the platform implementation.

pub mod module;
pub mod native;

use std::path::Path;

use tracing::{debug, info};

pub use module::{
    CatalogSummary, HostModule, LoadedModule, ModuleEntryPoints, ModuleImage, ModuleOrigin,
    TypeSummary,
};
pub use native::NativeOpener;

use crate::config::{LoadSemantics, LoadStrategy};
use crate::diagnostics::{Diagnostic, Staged};
use crate::error::ModuleLoadError;
use crate::source::ModuleLocation;

/// Opens a single module.
pub trait ModuleOpener {
    /// Open a module file with the given loading semantics.
    fn open_path(&self, path: &Path, semantics: LoadSemantics)
        -> Result<LoadedModule, ModuleLoadError>;

    /// Open a module from raw bytes.
    fn open_bytes(&self, name: &str, bytes: &[u8]) -> Result<LoadedModule, ModuleLoadError>;
}

/// Loads every module of a resolved location list.
#[derive(Debug)]
pub struct ModuleLoader<'a, O> {
    opener: &'a O,
    host: &'a HostModule,
    collapse_host_module: bool,
}

impl<'a, O: ModuleOpener> ModuleLoader<'a, O> {
    /// Create a loader.
    pub fn new(opener: &'a O, host: &'a HostModule) -> Self {
        Self {
            opener,
            host,
            collapse_host_module: false,
        }
    }

    /// Load the host module only once under merged strategies.
    pub fn collapse_host_module(mut self, collapse: bool) -> Self {
        self.collapse_host_module = collapse;
        self
    }

    /// Load every location in order.
    ///
    /// Merged strategies append the host module after the resolved
    /// locations. Because the resolver already lists the host, it ends up
    /// loaded twice unless host collapsing is enabled. A location that fails
    /// to load is skipped and reported; the rest still load.
    pub fn load(
        &self,
        locations: &[ModuleLocation],
        strategy: LoadStrategy,
    ) -> Staged<LoadedModule> {
        let semantics = strategy.semantics();
        let mut modules = Vec::with_capacity(locations.len() + 1);
        let mut diagnostics = Vec::new();

        for location in locations {
            match self.load_one(location, semantics) {
                Ok(module) => {
                    debug!(category = "plugin", module = %module.name, "Module loaded");
                    modules.push(module);
                }
                Err(e) => diagnostics.push(
                    Diagnostic::ModuleLoadFailure {
                        module: location.display_name().into_owned(),
                        message: e.to_string(),
                    }
                    .emitted(),
                ),
            }
        }

        if strategy.is_merged() {
            let already_listed = locations.contains(&ModuleLocation::Host);
            if !(self.collapse_host_module && already_listed) {
                modules.push(self.host.load());
            }
        }

        info!(
            category = "plugin",
            strategy = %strategy,
            loaded = modules.len(),
            failed = diagnostics.len(),
            "Modules loaded"
        );
        (modules, diagnostics)
    }

    fn load_one(
        &self,
        location: &ModuleLocation,
        semantics: LoadSemantics,
    ) -> Result<LoadedModule, ModuleLoadError> {
        match location {
            ModuleLocation::Path(path) => self.opener.open_path(path, semantics),
            ModuleLocation::Embedded { name, bytes } => self.opener.open_bytes(name, bytes),
            ModuleLocation::Host => Ok(self.host.load()),
        }
    }
}
