//! Loaded module handles.

use std::fmt;
use std::panic;
use std::sync::Arc;

use capload_sdk::guard::panic_message;
use capload_sdk::{AttachFn, CatalogError, CatalogFn, CatalogResult, ModuleCatalog, TypeKind};
use chrono::{DateTime, Utc};
use libloading::Library;
use serde::Serialize;

/// Entry points resolved from a module.
#[derive(Debug, Clone, Copy)]
pub struct ModuleEntryPoints {
    /// Returns the module's type catalog
    pub catalog: CatalogFn,
    /// Resolves the module's own dependencies before its types are used
    pub attach: Option<AttachFn>,
}

impl ModuleEntryPoints {
    /// Entry points with no attach hook.
    pub fn new(catalog: CatalogFn) -> Self {
        Self {
            catalog,
            attach: None,
        }
    }

    /// Set the attach hook.
    pub fn with_attach(mut self, attach: AttachFn) -> Self {
        self.attach = Some(attach);
        self
    }
}

/// Where a loaded module came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// A file on disk
    File(std::path::PathBuf),
    /// Bytes embedded in the host binary
    Embedded(String),
    /// The host's own module
    Host,
}

impl fmt::Display for ModuleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleOrigin::File(path) => write!(f, "file:{}", path.display()),
            ModuleOrigin::Embedded(name) => write!(f, "embedded:{}", name),
            ModuleOrigin::Host => f.write_str("host"),
        }
    }
}

/// Keeps a module's code mapped.
///
/// Every candidate type and plugin instance holds an `Arc` to the image of
/// the module that defined it, so the library is unloaded only after the
/// last object built from it is dropped.
pub struct ModuleImage {
    _library: Option<Library>,
}

impl ModuleImage {
    pub(crate) fn library(library: Library) -> Arc<Self> {
        Arc::new(Self {
            _library: Some(library),
        })
    }

    /// An image for code that is already part of the process.
    pub fn in_process() -> Arc<Self> {
        Arc::new(Self { _library: None })
    }

    /// Whether this image owns a dynamically loaded library.
    pub fn is_dynamic(&self) -> bool {
        self._library.is_some()
    }
}

impl fmt::Debug for ModuleImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleImage")
            .field("dynamic", &self.is_dynamic())
            .finish()
    }
}

/// A module that has been loaded into the process.
///
/// The entry points are not exposed: code and data reached through them are
/// only valid while the image is alive, so callers get owned copies through
/// [`LoadedModule::describe_catalog`] instead.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    /// Display name used in diagnostics
    pub name: String,
    /// Where the module came from
    pub origin: ModuleOrigin,
    pub(crate) entry: ModuleEntryPoints,
    image: Arc<ModuleImage>,
    /// When the module was loaded
    pub loaded_at: DateTime<Utc>,
}

/// Owned description of one catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSummary {
    /// Qualified type name
    pub name: String,
    /// Type kind
    pub kind: TypeKind,
    /// Whether the type can be default-constructed
    pub default_constructor: bool,
    /// Every capability the type declares
    pub capabilities: Vec<String>,
}

/// Owned description of a module's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    /// Name the module gives itself
    pub module: String,
    /// Exported types, in catalog order
    pub types: Vec<TypeSummary>,
}

impl LoadedModule {
    /// A module whose code is already linked into the process.
    pub fn in_process(
        name: impl Into<String>,
        origin: ModuleOrigin,
        entry: ModuleEntryPoints,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            entry,
            image: ModuleImage::in_process(),
            loaded_at: Utc::now(),
        }
    }

    pub(crate) fn from_library(
        name: impl Into<String>,
        origin: ModuleOrigin,
        entry: ModuleEntryPoints,
        library: Library,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            entry,
            image: ModuleImage::library(library),
            loaded_at: Utc::now(),
        }
    }

    /// Handle keeping the module mapped
    pub fn image(&self) -> &Arc<ModuleImage> {
        &self.image
    }

    /// Whether the module exports a dependency attach hook.
    pub fn has_attach_hook(&self) -> bool {
        self.entry.attach.is_some()
    }

    /// Read the module's catalog into owned summaries.
    ///
    /// Nothing returned refers to the module's code or data.
    pub fn describe_catalog(&self) -> Result<CatalogSummary, CatalogError> {
        let catalog = panic::catch_unwind(self.entry.catalog).unwrap_or_else(|payload| {
            Err(CatalogError::new(format!(
                "catalog panicked: {}",
                panic_message(payload.as_ref())
            )))
        })?;

        Ok(CatalogSummary {
            module: catalog.module().to_string(),
            types: catalog
                .types()
                .iter()
                .map(|t| TypeSummary {
                    name: t.name().to_string(),
                    kind: t.kind(),
                    default_constructor: t.has_default_constructor(),
                    capabilities: t.capabilities().map(str::to_string).collect(),
                })
                .collect(),
        })
    }
}

/// The host program's own module.
///
/// Merged load strategies scan the host for capability implementations the
/// same way they scan embedded modules. By default the host exposes an
/// empty catalog.
#[derive(Debug, Clone)]
pub struct HostModule {
    name: String,
    entry: ModuleEntryPoints,
}

impl HostModule {
    /// Host module exposing the given catalog.
    pub fn new(name: impl Into<String>, catalog: CatalogFn) -> Self {
        Self {
            name: name.into(),
            entry: ModuleEntryPoints::new(catalog),
        }
    }

    /// Set the host's attach hook.
    pub fn with_attach(mut self, attach: AttachFn) -> Self {
        self.entry.attach = Some(attach);
        self
    }

    /// Host module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce a loaded module for the host.
    pub fn load(&self) -> LoadedModule {
        LoadedModule::in_process(self.name.clone(), ModuleOrigin::Host, self.entry)
    }
}

impl Default for HostModule {
    fn default() -> Self {
        Self::new("<host>", empty_catalog)
    }
}

fn empty_catalog() -> CatalogResult {
    Ok(ModuleCatalog::new("<host>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_host_module_is_empty() {
        let host = HostModule::default();
        let module = host.load();

        assert_eq!(module.name, "<host>");
        assert_eq!(module.origin, ModuleOrigin::Host);
        assert!(!module.image().is_dynamic());
        assert!(!module.has_attach_hook());

        let summary = module.describe_catalog().unwrap();
        assert_eq!(summary.module, "<host>");
        assert!(summary.types.is_empty());
    }

    #[test]
    fn test_host_module_with_attach() {
        fn attach() -> Result<(), String> {
            Err("no dependencies".into())
        }

        let module = HostModule::default().with_attach(attach).load();
        assert!(module.has_attach_hook());
        let hook = module.entry.attach.unwrap();
        assert_eq!(hook(), Err("no dependencies".to_string()));
    }

    #[test]
    fn test_describe_catalog_copies_entries() {
        trait Gauge {}
        capload_sdk::declare_capability!(GaugeCapability, "test.gauge", dyn Gauge);

        #[derive(Default)]
        struct Sensor;
        impl Gauge for Sensor {}

        fn catalog() -> CatalogResult {
            Ok(ModuleCatalog::new("sensors")
                .with_type(
                    capload_sdk::TypeDescriptor::interface("sensors::Gauge")
                        .assignable_to::<GaugeCapability>(),
                )
                .with_type(
                    capload_sdk::TypeDescriptor::concrete::<Sensor>("sensors::Sensor")
                        .implements::<GaugeCapability>(|s| s as Box<dyn Gauge>),
                ))
        }

        let summary = HostModule::new("sensors", catalog)
            .load()
            .describe_catalog()
            .unwrap();
        assert_eq!(summary.module, "sensors");
        assert_eq!(
            summary.types[1],
            TypeSummary {
                name: "sensors::Sensor".to_string(),
                kind: TypeKind::Concrete,
                default_constructor: true,
                capabilities: vec!["test.gauge".to_string()],
            }
        );
        assert!(!summary.types[0].default_constructor);
    }

    #[test]
    fn test_describe_catalog_contains_panics() {
        fn exploding() -> CatalogResult {
            panic!("catalog on fire")
        }

        let err = HostModule::new("host", exploding)
            .load()
            .describe_catalog()
            .unwrap_err();
        assert_eq!(err.to_string(), "catalog panicked: catalog on fire");
    }
}
