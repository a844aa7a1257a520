//! Error types for capload.
//!
//! Only [`Error`] ever reaches the caller of the pipeline. The per-module and
//! per-type errors below are caught by the stage that produced them, logged,
//! and turned into [`Diagnostic`](crate::diagnostics::Diagnostic) records.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use capload_sdk::{CatalogError, ConstructError};

/// Result type alias using capload's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a pipeline call.
#[derive(Debug, Error)]
pub enum Error {
    /// The load strategy or loader configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A budgeted load did not finish in time.
    #[error("plugin loading exceeded its time budget of {0:?}")]
    Timeout(Duration),

    /// The background loading task died.
    #[error("plugin loading task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The selector does not name one of the six load strategies.
    #[error("unrecognized load strategy: '{0}'")]
    UnknownStrategy(String),

    /// A configuration value could not be interpreted.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Setting or environment variable name
        key: String,
        /// Rejected value
        value: String,
    },

    /// The configuration file is malformed.
    #[error("invalid configuration file: {0}")]
    Parse(String),
}

/// A single module failed to load.
#[derive(Debug, Error)]
pub enum ModuleLoadError {
    /// The module file does not exist.
    #[error("module not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The module failed a trust check.
    #[error("module rejected by trust policy: {0}")]
    Untrusted(String),

    /// The platform loader refused the library.
    #[error("failed to load library: {0}")]
    LoadFailed(String),

    /// The library does not export a required entry point.
    #[error("missing module entry point: {0}")]
    MissingEntryPoint(&'static str),

    /// The module was built against a different SDK.
    #[error("ABI version mismatch: expected {expected}, got {actual}")]
    AbiMismatch {
        /// ABI version of the host's SDK
        expected: u32,
        /// ABI version reported by the module
        actual: u32,
    },

    /// Module bytes could not be read or staged to a temporary file.
    #[error("failed to stage module bytes: {0}")]
    Staging(#[source] std::io::Error),
}

/// A candidate type could not be instantiated.
#[derive(Debug, Clone, Error)]
pub enum InstantiationError {
    /// The descriptor refused or failed construction.
    #[error(transparent)]
    Construct(#[from] ConstructError),

    /// The constructor panicked.
    #[error("constructor panicked: {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: Error = ConfigError::UnknownStrategy("fastest".into()).into();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: unrecognized load strategy: 'fastest'"
        );
    }

    #[test]
    fn test_module_load_error_display() {
        let err = ModuleLoadError::AbiMismatch {
            expected: 1,
            actual: 7,
        };
        assert_eq!(err.to_string(), "ABI version mismatch: expected 1, got 7");

        let err = ModuleLoadError::NotFound(PathBuf::from("/plugins/missing.so"));
        assert_eq!(err.to_string(), "module not found: /plugins/missing.so");
    }

    #[test]
    fn test_instantiation_error_is_transparent() {
        let err: InstantiationError = ConstructError::NoDefaultConstructor.into();
        assert_eq!(err.to_string(), "type has no default constructor");
    }
}
