//! Loader configuration.
//!
//! Configuration sources, in priority order:
//! 1. Environment variables (see [`env_vars`])
//! 2. A TOML file (`capload.toml` unless a path is given)
//! 3. Built-in defaults (see [`defaults`])

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, Error};
use crate::security::TrustPolicy;

/// Default values
pub mod defaults {
    /// Plugin directory, relative to the working directory
    pub const PLUGIN_DIR: &str = "plugins";
    /// Configuration file looked up in the working directory
    pub const CONFIG_FILE: &str = "capload.toml";
    /// Largest module file accepted by the trust checks (100 MiB)
    pub const MAX_MODULE_SIZE: u64 = 100 * 1024 * 1024;

    /// Platform shared-library extension, without the leading dot
    pub fn module_extension() -> &'static str {
        std::env::consts::DLL_EXTENSION
    }
}

/// Environment variable names
pub mod env_vars {
    pub const PLUGIN_DIR: &str = "CAPLOAD_PLUGIN_DIR";
    pub const LOAD_STRATEGY: &str = "CAPLOAD_LOAD_STRATEGY";
    pub const MODULE_EXTENSION: &str = "CAPLOAD_MODULE_EXTENSION";
    pub const MAX_MODULE_SIZE: &str = "CAPLOAD_MAX_MODULE_SIZE";
    /// Read by the CLI to switch log output to JSON
    pub const LOG_JSON: &str = "CAPLOAD_LOG_JSON";
}

/// How a module file is handed to the platform loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadSemantics {
    /// Trust checks, then load from the module's own path.
    Standard,
    /// Trust checks, then load a private copy of the file so modules with
    /// identical identity can coexist.
    RawFile,
    /// Load from the module's own path without any trust checks.
    Relaxed,
}

/// Where modules are discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleSourceKind {
    /// Module files found recursively under the plugin directory.
    Directory,
    /// Modules embedded in the host binary, plus the host module itself.
    Merged,
}

/// Load-strategy selector: one loading semantics and one module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoadStrategy {
    #[default]
    Standard,
    StandardMerged,
    RawFile,
    RawFileMerged,
    Relaxed,
    RelaxedMerged,
}

impl LoadStrategy {
    /// All strategies, in numeric-code order.
    pub const ALL: [LoadStrategy; 6] = [
        LoadStrategy::Standard,
        LoadStrategy::StandardMerged,
        LoadStrategy::RawFile,
        LoadStrategy::RawFileMerged,
        LoadStrategy::Relaxed,
        LoadStrategy::RelaxedMerged,
    ];

    /// Compose a strategy from its two axes.
    pub fn from_parts(semantics: LoadSemantics, source: ModuleSourceKind) -> Self {
        use LoadSemantics as S;
        use ModuleSourceKind as M;
        match (semantics, source) {
            (S::Standard, M::Directory) => LoadStrategy::Standard,
            (S::Standard, M::Merged) => LoadStrategy::StandardMerged,
            (S::RawFile, M::Directory) => LoadStrategy::RawFile,
            (S::RawFile, M::Merged) => LoadStrategy::RawFileMerged,
            (S::Relaxed, M::Directory) => LoadStrategy::Relaxed,
            (S::Relaxed, M::Merged) => LoadStrategy::RelaxedMerged,
        }
    }

    /// Loading semantics axis
    pub fn semantics(self) -> LoadSemantics {
        match self {
            LoadStrategy::Standard | LoadStrategy::StandardMerged => LoadSemantics::Standard,
            LoadStrategy::RawFile | LoadStrategy::RawFileMerged => LoadSemantics::RawFile,
            LoadStrategy::Relaxed | LoadStrategy::RelaxedMerged => LoadSemantics::Relaxed,
        }
    }

    /// Module source axis
    pub fn source(self) -> ModuleSourceKind {
        match self {
            LoadStrategy::Standard | LoadStrategy::RawFile | LoadStrategy::Relaxed => {
                ModuleSourceKind::Directory
            }
            LoadStrategy::StandardMerged
            | LoadStrategy::RawFileMerged
            | LoadStrategy::RelaxedMerged => ModuleSourceKind::Merged,
        }
    }

    /// Whether the host module takes part in loading.
    pub fn is_merged(self) -> bool {
        self.source() == ModuleSourceKind::Merged
    }

    /// Canonical name used in configuration files
    pub fn as_str(self) -> &'static str {
        match self {
            LoadStrategy::Standard => "standard",
            LoadStrategy::StandardMerged => "standard-merged",
            LoadStrategy::RawFile => "raw-file",
            LoadStrategy::RawFileMerged => "raw-file-merged",
            LoadStrategy::Relaxed => "relaxed",
            LoadStrategy::RelaxedMerged => "relaxed-merged",
        }
    }

    /// Numeric code, stable across releases
    pub fn code(self) -> u8 {
        match self {
            LoadStrategy::Standard => 0,
            LoadStrategy::StandardMerged => 1,
            LoadStrategy::RawFile => 2,
            LoadStrategy::RawFileMerged => 3,
            LoadStrategy::Relaxed => 4,
            LoadStrategy::RelaxedMerged => 5,
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for LoadStrategy {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        LoadStrategy::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| ConfigError::UnknownStrategy(code.to_string()))
    }
}

impl FromStr for LoadStrategy {
    type Err = ConfigError;

    /// Accepts canonical names (any case, `_` or `-` separated) and numeric codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        if let Ok(code) = normalized.parse::<u8>() {
            return LoadStrategy::try_from(code);
        }
        LoadStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

impl TryFrom<String> for LoadStrategy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LoadStrategy> for String {
    fn from(strategy: LoadStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

/// Host-side loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory scanned for module files
    pub plugin_dir: PathBuf,
    /// Load strategy used when the caller does not pass one
    pub strategy: LoadStrategy,
    /// Module file extension, without the leading dot
    pub module_extension: String,
    /// Load the host module once even for merged strategies
    pub collapse_host_module: bool,
    /// Trust checks applied by the standard and raw-file semantics
    pub trust: TrustPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            plugin_dir: PathBuf::from(defaults::PLUGIN_DIR),
            strategy: LoadStrategy::default(),
            module_extension: defaults::module_extension().to_string(),
            collapse_host_module: false,
            trust: TrustPolicy::default(),
        }
    }
}

impl LoaderConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        info!(category = "config", path = %path.display(), "Loading loader config");
        Ok(Self::from_toml_str(&content)?)
    }

    /// Resolve the effective configuration.
    ///
    /// Uses `path` if given, otherwise `capload.toml` in the working
    /// directory when present, otherwise defaults; environment variables
    /// override whatever was loaded.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(defaults::CONFIG_FILE).is_file() => {
                Self::from_file(defaults::CONFIG_FILE)?
            }
            None => {
                debug!(category = "config", "No config file, using defaults");
                Self::default()
            }
        };
        Ok(base.apply_env()?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(env_vars::PLUGIN_DIR) {
            self.plugin_dir = PathBuf::from(dir);
        }
        if let Some(strategy) = lookup(env_vars::LOAD_STRATEGY) {
            self.strategy = strategy.parse()?;
        }
        if let Some(extension) = lookup(env_vars::MODULE_EXTENSION) {
            self.module_extension = normalize_extension(&extension);
        }
        if let Some(size) = lookup(env_vars::MAX_MODULE_SIZE) {
            self.trust.max_file_size =
                size.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: env_vars::MAX_MODULE_SIZE.to_string(),
                    value: size.clone(),
                })?;
        }
        Ok(self)
    }
}

/// Strip a leading dot and surrounding whitespace from an extension.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_string()
}
