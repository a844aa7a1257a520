//! Capability plugin loading for capload hosts.
//!
//! A host names a capability (a [`Capability`] marker from `capload-sdk`) and
//! a [`LoadStrategy`]; the pipeline finds every module, loads it, scans its
//! type catalog and returns one live instance per concrete implementation.
//!
//! ```rust,no_run
//! use capload_core::prelude::*;
//!
//! pub trait Greeter {
//!     fn greet(&self) -> String;
//! }
//!
//! capload_sdk::declare_capability!(pub GreeterCapability, "demo.greeter", dyn Greeter);
//!
//! # fn main() -> capload_core::Result<()> {
//! let greeters = load_plugins::<GreeterCapability>("plugins", "standard")?;
//! for greeter in &greeters {
//!     println!("{}: {}", greeter.type_name(), greeter.greet());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Failures below the pipeline level (a module that will not load, a catalog
//! that cannot be read, a constructor that panics) never abort a call. They
//! are logged through `tracing` and returned as [`Diagnostic`]s by
//! [`PluginHost::load_report`].

pub mod budget;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod instantiate;
pub mod loader;
pub mod pipeline;
pub mod scanner;
pub mod security;
pub mod source;

pub use capload_sdk::Capability;

pub use config::{LoadSemantics, LoadStrategy, LoaderConfig, ModuleSourceKind};
pub use diagnostics::{Diagnostic, Staged};
pub use error::{ConfigError, Error, InstantiationError, ModuleLoadError, Result};
pub use instantiate::PluginInstance;
pub use loader::{
    CatalogSummary, HostModule, LoadedModule, ModuleLoader, ModuleOpener, NativeOpener, TypeSummary,
};
pub use pipeline::{load_plugins, InspectReport, LoadReport, PluginHost, StrategySelector};
pub use scanner::CandidateType;
pub use security::TrustPolicy;
pub use source::{EmbeddedResource, ModuleLocation, SourceResolver};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{LoadStrategy, LoaderConfig};
    pub use crate::diagnostics::Diagnostic;
    pub use crate::error::{Error, Result};
    pub use crate::instantiate::PluginInstance;
    pub use crate::pipeline::{load_plugins, LoadReport, PluginHost};
    pub use crate::source::EmbeddedResource;
    pub use capload_sdk::Capability;
}
