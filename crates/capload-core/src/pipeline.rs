//! Pipeline coordinator.
//!
//! [`PluginHost`] is the public entry point. One call resolves module
//! locations, loads the modules, scans them for a capability and
//! instantiates every candidate, each stage finishing before the next
//! starts. Nothing is cached between calls.

use std::path::{Path, PathBuf};

use capload_sdk::Capability;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::{LoadStrategy, LoaderConfig};
use crate::diagnostics::Diagnostic;
use crate::error::{ConfigError, Result};
use crate::instantiate::{instantiate, PluginInstance};
use crate::loader::{HostModule, LoadedModule, ModuleLoader, ModuleOpener, NativeOpener};
use crate::scanner::{scan, scan_named};
use crate::source::{EmbeddedResource, SourceResolver};

/// Anything that names a load strategy.
///
/// Implemented for [`LoadStrategy`] itself and for the textual and numeric
/// forms accepted in configuration.
pub trait StrategySelector {
    /// Resolve the selector to a strategy.
    fn to_strategy(&self) -> std::result::Result<LoadStrategy, ConfigError>;
}

impl StrategySelector for LoadStrategy {
    fn to_strategy(&self) -> std::result::Result<LoadStrategy, ConfigError> {
        Ok(*self)
    }
}

impl StrategySelector for &str {
    fn to_strategy(&self) -> std::result::Result<LoadStrategy, ConfigError> {
        self.parse()
    }
}

impl StrategySelector for String {
    fn to_strategy(&self) -> std::result::Result<LoadStrategy, ConfigError> {
        self.parse()
    }
}

impl StrategySelector for u8 {
    fn to_strategy(&self) -> std::result::Result<LoadStrategy, ConfigError> {
        LoadStrategy::try_from(*self)
    }
}

/// Outcome of one pipeline call.
#[derive(Debug)]
pub struct LoadReport<C: Capability> {
    /// Strategy the call ran with
    pub strategy: LoadStrategy,
    /// Number of modules that loaded
    pub modules_loaded: usize,
    /// Number of candidate types found
    pub candidates: usize,
    /// Live instances, in module then catalog order
    pub instances: Vec<PluginInstance<C>>,
    /// Every failure recovered from along the way
    pub diagnostics: Vec<Diagnostic>,
}

impl<C: Capability> LoadReport<C> {
    /// Diagnostics that record actual failures.
    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_failure())
    }

    /// Take the instances, dropping the diagnostics.
    pub fn into_instances(self) -> Vec<PluginInstance<C>> {
        self.instances
    }
}

/// A module as seen by [`PluginHost::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    /// Module name
    pub name: String,
    /// Where the module came from
    pub origin: String,
    /// When the module was loaded
    pub loaded_at: DateTime<Utc>,
}

impl From<&LoadedModule> for ModuleSummary {
    fn from(module: &LoadedModule) -> Self {
        Self {
            name: module.name.clone(),
            origin: module.origin.to_string(),
            loaded_at: module.loaded_at,
        }
    }
}

/// A candidate type as seen by [`PluginHost::inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    /// Module that defines the type
    pub module: String,
    /// Qualified type name
    pub type_name: String,
    /// Whether the type can be default-constructed
    pub default_constructor: bool,
    /// Every capability the type declares
    pub capabilities: Vec<String>,
}

/// What a strategy would find for a capability, without constructing anything.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Strategy used
    pub strategy: LoadStrategy,
    /// Capability name scanned for
    pub capability: String,
    /// Modules that loaded
    pub modules: Vec<ModuleSummary>,
    /// Candidate types found
    pub candidates: Vec<CandidateSummary>,
    /// Failures recovered from
    pub diagnostics: Vec<Diagnostic>,
}

/// Configured entry point for loading plugins.
#[derive(Debug)]
pub struct PluginHost<O = NativeOpener> {
    plugin_dir: PathBuf,
    embedded: Vec<EmbeddedResource>,
    host: HostModule,
    opener: O,
    module_extension: String,
    collapse_host_module: bool,
}

impl PluginHost<NativeOpener> {
    /// Host loading from `plugin_dir` with default settings.
    pub fn new(plugin_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(&LoaderConfig {
            plugin_dir: plugin_dir.into(),
            ..LoaderConfig::default()
        })
    }

    /// Host built from a loader configuration.
    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            plugin_dir: config.plugin_dir.clone(),
            embedded: Vec::new(),
            host: HostModule::default(),
            opener: NativeOpener::new(config.trust.clone())
                .with_extension(config.module_extension.clone()),
            module_extension: config.module_extension.clone(),
            collapse_host_module: config.collapse_host_module,
        }
    }
}

impl<O: ModuleOpener> PluginHost<O> {
    /// Replace the module opener.
    pub fn with_opener<P: ModuleOpener>(self, opener: P) -> PluginHost<P> {
        PluginHost {
            plugin_dir: self.plugin_dir,
            embedded: self.embedded,
            host: self.host,
            opener,
            module_extension: self.module_extension,
            collapse_host_module: self.collapse_host_module,
        }
    }

    /// Register an embedded resource.
    pub fn with_embedded_resource(mut self, resource: EmbeddedResource) -> Self {
        self.embedded.push(resource);
        self
    }

    /// Register several embedded resources.
    pub fn with_embedded_resources<I>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = EmbeddedResource>,
    {
        self.embedded.extend(resources);
        self
    }

    /// Set the host module scanned by merged strategies.
    pub fn with_host_module(mut self, host: HostModule) -> Self {
        self.host = host;
        self
    }

    /// Set the module file extension used for discovery.
    pub fn with_module_extension(mut self, extension: impl Into<String>) -> Self {
        self.module_extension = extension.into();
        self
    }

    /// Load the host module only once under merged strategies.
    pub fn collapse_host_module(mut self, collapse: bool) -> Self {
        self.collapse_host_module = collapse;
        self
    }

    /// Plugin directory
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Module opener
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Run the whole pipeline and keep the diagnostics.
    pub fn load_report<C: Capability>(&self, strategy: LoadStrategy) -> LoadReport<C> {
        let (modules, mut diagnostics) = self.load_modules(strategy);
        let (candidates, scan_diagnostics) = scan::<C>(&modules);
        diagnostics.extend(scan_diagnostics);

        let candidate_count = candidates.len();
        let (instances, instance_diagnostics) = instantiate::<C>(candidates);
        diagnostics.extend(instance_diagnostics);

        info!(
            category = "plugin",
            strategy = %strategy,
            capability = C::NAME,
            modules = modules.len(),
            candidates = candidate_count,
            instances = instances.len(),
            diagnostics = diagnostics.len(),
            "Plugin load complete"
        );

        LoadReport {
            strategy,
            modules_loaded: modules.len(),
            candidates: candidate_count,
            instances,
            diagnostics,
        }
    }

    /// Run the whole pipeline.
    pub fn load<C: Capability>(&self, strategy: LoadStrategy) -> Vec<PluginInstance<C>> {
        self.load_report::<C>(strategy).into_instances()
    }

    /// Run the whole pipeline for a selector given in any accepted form.
    ///
    /// An unrecognized selector is the only error.
    pub fn load_selector<C: Capability>(
        &self,
        selector: impl StrategySelector,
    ) -> Result<Vec<PluginInstance<C>>> {
        let strategy = selector.to_strategy()?;
        Ok(self.load::<C>(strategy))
    }

    /// Resolve, load and scan for a capability name without constructing
    /// anything.
    pub fn inspect(&self, strategy: LoadStrategy, capability: &str) -> InspectReport {
        let (modules, mut diagnostics) = self.load_modules(strategy);
        let (candidates, scan_diagnostics) = scan_named(&modules, capability);
        diagnostics.extend(scan_diagnostics);

        InspectReport {
            strategy,
            capability: capability.to_string(),
            modules: modules.iter().map(ModuleSummary::from).collect(),
            candidates: candidates
                .iter()
                .map(|candidate| CandidateSummary {
                    module: candidate.module.clone(),
                    type_name: candidate.type_name.clone(),
                    default_constructor: candidate.has_default_constructor(),
                    capabilities: candidate.capabilities().map(str::to_string).collect(),
                })
                .collect(),
            diagnostics,
        }
    }

    fn load_modules(&self, strategy: LoadStrategy) -> (Vec<LoadedModule>, Vec<Diagnostic>) {
        let resolver =
            SourceResolver::new(&self.plugin_dir, &self.embedded, &self.module_extension);
        let locations = resolver.resolve(strategy.source());
        ModuleLoader::new(&self.opener, &self.host)
            .collapse_host_module(self.collapse_host_module)
            .load(&locations, strategy)
    }
}

/// Load every implementation of `C` from `directory`.
///
/// Uses the native opener with default trust settings. Only an unrecognized
/// selector fails; everything else degrades to fewer instances.
pub fn load_plugins<C: Capability>(
    directory: impl Into<PathBuf>,
    selector: impl StrategySelector,
) -> Result<Vec<PluginInstance<C>>> {
    PluginHost::new(directory).load_selector::<C>(selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use capload_sdk::{declare_capability, CatalogResult, ModuleCatalog, TypeDescriptor};

    trait Named {
        fn name(&self) -> &'static str;
    }

    #[derive(Default)]
    struct Builtin;

    impl Named for Builtin {
        fn name(&self) -> &'static str {
            "builtin"
        }
    }

    declare_capability!(NamedCapability, "test.named", dyn Named);

    fn host_catalog() -> CatalogResult {
        Ok(ModuleCatalog::new("host").with_type(
            TypeDescriptor::concrete::<Builtin>("host::Builtin")
                .implements::<NamedCapability>(|b| b as Box<dyn Named>),
        ))
    }

    #[test]
    fn test_selectors() {
        assert_eq!("raw-file".to_strategy().unwrap(), LoadStrategy::RawFile);
        assert_eq!(
            String::from("RELAXED_MERGED").to_strategy().unwrap(),
            LoadStrategy::RelaxedMerged
        );
        assert_eq!(1u8.to_strategy().unwrap(), LoadStrategy::StandardMerged);
        assert!(9u8.to_strategy().is_err());
    }

    #[test]
    fn test_unknown_selector_is_configuration_error() {
        let result = load_plugins::<NamedCapability>("/nonexistent", "fastest");
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::UnknownStrategy(_)))
        ));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        for strategy in [LoadStrategy::Standard, LoadStrategy::RawFile, LoadStrategy::Relaxed] {
            let instances =
                load_plugins::<NamedCapability>("/nonexistent/capload", strategy).unwrap();
            assert!(instances.is_empty());
        }
    }

    #[test]
    fn test_merged_host_duplicated() {
        let host = PluginHost::new("/nonexistent/capload")
            .with_host_module(HostModule::new("host", host_catalog));

        let report = host.load_report::<NamedCapability>(LoadStrategy::StandardMerged);
        assert_eq!(report.modules_loaded, 2);
        assert_eq!(report.instances.len(), 2);
        assert!(report.instances.iter().all(|i| i.name() == "builtin"));
        assert_eq!(report.failures().count(), 0);

        let host = host.collapse_host_module(true);
        assert_eq!(host.load::<NamedCapability>(LoadStrategy::RelaxedMerged).len(), 1);
    }

    #[test]
    fn test_inspect_does_not_construct() {
        let host = PluginHost::new("/nonexistent/capload")
            .with_host_module(HostModule::new("host", host_catalog))
            .collapse_host_module(true);

        let report = host.inspect(LoadStrategy::StandardMerged, "test.named");
        assert_eq!(report.modules.len(), 1);
        assert_eq!(report.modules[0].origin, "host");
        assert_eq!(report.candidates.len(), 1);
        assert_eq!(report.candidates[0].type_name, "host::Builtin");
        assert!(report.candidates[0].default_constructor);
        assert_eq!(report.candidates[0].capabilities, ["test.named"]);
    }
}
