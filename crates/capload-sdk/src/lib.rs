//! capload Module SDK
//!
//! This SDK provides the contract shared between a capload host and the
//! modules it loads: capability markers, the type catalog a module exports,
//! and macros that generate the exported entry points.
//!
//! # Quick Start
//!
//! ```rust
//! use capload_sdk::prelude::*;
//!
//! pub trait Greeter {
//!     fn greet(&self) -> String;
//! }
//!
//! declare_capability!(pub GreeterCapability, "demo.greeter", dyn Greeter);
//!
//! #[derive(Default)]
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! fn catalog() -> CatalogResult {
//!     Ok(ModuleCatalog::new("demo").with_type(
//!         TypeDescriptor::concrete::<English>("demo::English")
//!             .implements::<GreeterCapability>(|g| g as Box<dyn Greeter>),
//!     ))
//! }
//!
//! # fn main() {
//! let catalog = catalog().unwrap();
//! assert_eq!(catalog.len(), 1);
//! # }
//! ```
//!
//! A shared library becomes a loadable module by invoking
//! [`export_module!`] once:
//!
//! ```rust,ignore
//! capload_sdk::export_module!(catalog: catalog);
//! ```
//!
//! # ABI
//!
//! Modules exchange Rust types with the host, so a module must be built with
//! the same toolchain and the same SDK release as the host. The exported
//! `capload_abi_version` symbol lets the host reject modules built against a
//! different SDK before any catalog is read.

pub mod capability;
pub mod descriptor;
pub mod error;
pub mod guard;
#[macro_use]
pub mod macros;

pub use capability::Capability;
pub use descriptor::{ErasedObject, ModuleCatalog, TypeBuilder, TypeDescriptor, TypeKind};
pub use error::{CatalogError, ConstructError};

/// Module ABI version (must match the host's copy of this SDK)
pub const ABI_VERSION: u32 = 1;

/// Result returned by a module's catalog entry point.
pub type CatalogResult = Result<ModuleCatalog, CatalogError>;

/// Signature of the exported `capload_abi_version` symbol.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature of the exported `capload_module_catalog` symbol.
pub type CatalogFn = fn() -> CatalogResult;

/// Signature of the optional `capload_attach_dependencies` symbol.
pub type AttachFn = fn() -> Result<(), String>;

/// Names of the symbols a module exports, NUL-terminated for symbol lookup.
pub mod symbols {
    /// Required. Returns [`ABI_VERSION`](crate::ABI_VERSION).
    pub const ABI_VERSION: &[u8] = b"capload_abi_version\0";
    /// Required. Returns the module's type catalog.
    pub const CATALOG: &[u8] = b"capload_module_catalog\0";
    /// Optional. Invoked before the catalog is read; its result is ignored.
    pub const ATTACH_DEPENDENCIES: &[u8] = b"capload_attach_dependencies\0";

    /// Human-readable symbol name without the trailing NUL.
    pub fn display(symbol: &[u8]) -> &str {
        let trimmed = symbol.strip_suffix(b"\0").unwrap_or(symbol);
        std::str::from_utf8(trimmed).unwrap_or("<invalid symbol>")
    }
}

/// Prelude module with common imports
pub mod prelude {
    pub use crate::capability::Capability;
    pub use crate::descriptor::{ModuleCatalog, TypeDescriptor, TypeKind};
    pub use crate::error::{CatalogError, ConstructError};
    pub use crate::{declare_capability, export_module, CatalogResult, ABI_VERSION};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_display() {
        assert_eq!(symbols::display(symbols::CATALOG), "capload_module_catalog");
        assert_eq!(
            symbols::display(symbols::ATTACH_DEPENDENCIES),
            "capload_attach_dependencies"
        );
    }

    #[test]
    fn test_symbols_are_nul_terminated() {
        for symbol in [symbols::ABI_VERSION, symbols::CATALOG, symbols::ATTACH_DEPENDENCIES] {
            assert_eq!(symbol.last(), Some(&0));
        }
    }
}
