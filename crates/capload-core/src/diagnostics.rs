//! Per-module and per-type failure records.
//!
//! Every stage of the pipeline recovers from item-level failures locally.
//! Each recovered failure becomes a [`Diagnostic`], which is logged through
//! `tracing` as soon as it is created and handed back to the caller in the
//! load report. Nothing depends on a subscriber being installed.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

/// Items produced by a stage, plus the failures it recovered from.
pub type Staged<T> = (Vec<T>, Vec<Diagnostic>);

/// A recovered failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A module could not be loaded.
    ModuleLoadFailure {
        /// Module path or logical name
        module: String,
        /// Failure message
        message: String,
    },

    /// A module's type catalog could not be enumerated.
    CapabilityScanFailure {
        /// Module path or logical name
        module: String,
        /// Capability being scanned for
        capability: String,
        /// Failure message
        message: String,
        /// Per-type causes reported by the module
        nested: Vec<String>,
    },

    /// A candidate type failed to construct.
    InstantiationFailure {
        /// Module the type came from
        module: String,
        /// Qualified type name
        type_name: String,
        /// Capability being instantiated
        capability: String,
        /// Failure message
        message: String,
    },

    /// A candidate type constructed successfully but produced no instance.
    InstanceAbsent {
        /// Module the type came from
        module: String,
        /// Qualified type name
        type_name: String,
    },
}

impl Diagnostic {
    /// Module the diagnostic refers to
    pub fn module(&self) -> &str {
        match self {
            Diagnostic::ModuleLoadFailure { module, .. }
            | Diagnostic::CapabilityScanFailure { module, .. }
            | Diagnostic::InstantiationFailure { module, .. }
            | Diagnostic::InstanceAbsent { module, .. } => module,
        }
    }

    /// Whether this records an actual failure rather than an empty result.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Diagnostic::InstanceAbsent { .. })
    }

    /// Log the diagnostic.
    pub fn emit(&self) {
        match self {
            Diagnostic::ModuleLoadFailure { module, message } => {
                warn!(
                    category = "plugin",
                    module = %module,
                    error = %message,
                    "Failed to load module"
                );
            }
            Diagnostic::CapabilityScanFailure {
                module,
                capability,
                message,
                nested,
            } => {
                warn!(
                    category = "plugin",
                    module = %module,
                    capability = %capability,
                    error = %message,
                    "Failed to enumerate module types"
                );
                for cause in nested {
                    warn!(
                        category = "plugin",
                        module = %module,
                        cause = %cause,
                        "Type load failure"
                    );
                }
            }
            Diagnostic::InstantiationFailure {
                module,
                type_name,
                capability,
                message,
            } => {
                warn!(
                    category = "plugin",
                    module = %module,
                    type_name = %type_name,
                    capability = %capability,
                    error = %message,
                    "Failed to instantiate plugin type"
                );
            }
            Diagnostic::InstanceAbsent { module, type_name } => {
                debug!(
                    category = "plugin",
                    module = %module,
                    type_name = %type_name,
                    "Constructor produced no instance"
                );
            }
        }
    }

    /// Log the diagnostic and return it.
    pub(crate) fn emitted(self) -> Self {
        self.emit();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ModuleLoadFailure { module, message } => {
                write!(f, "{}: load failed: {}", module, message)
            }
            Diagnostic::CapabilityScanFailure {
                module,
                capability,
                message,
                nested,
            } => {
                write!(f, "{}: scan for '{}' failed: {}", module, capability, message)?;
                for cause in nested {
                    write!(f, "\n  caused by: {}", cause)?;
                }
                Ok(())
            }
            Diagnostic::InstantiationFailure {
                module,
                type_name,
                message,
                ..
            } => write!(f, "{}: {} not instantiated: {}", module, type_name, message),
            Diagnostic::InstanceAbsent { module, type_name } => {
                write!(f, "{}: {} produced no instance", module, type_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_failure_display_lists_causes() {
        let diag = Diagnostic::CapabilityScanFailure {
            module: "plugins/a.so".into(),
            capability: "demo.greeter".into(),
            message: "partial enumeration".into(),
            nested: vec!["missing libfoo".into(), "bad layout".into()],
        };

        assert_eq!(
            diag.to_string(),
            "plugins/a.so: scan for 'demo.greeter' failed: partial enumeration\n  \
             caused by: missing libfoo\n  \
             caused by: bad layout"
        );
        assert_eq!(diag.module(), "plugins/a.so");
        assert!(diag.is_failure());
    }

    #[test]
    fn test_absent_instance_is_not_a_failure() {
        let diag = Diagnostic::InstanceAbsent {
            module: "host".into(),
            type_name: "demo::Lazy".into(),
        };
        assert!(!diag.is_failure());
    }
}
