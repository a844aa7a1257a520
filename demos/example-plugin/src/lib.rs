//! Example capload module
//!
//! Demonstrates how a module publishes implementations of a capability with
//! the capload SDK.
//!
//! # Types
//!
//! - `Echo`: returns the input as-is
//! - `Reverse`: reverses the input string
//! - `Uppercase`: converts input to uppercase
//! - `Prefix`: built by a factory because it carries state
//!
//! Build with `cargo build --release` and drop the resulting library into a
//! plugin directory, then:
//!
//! ```text
//! capload inspect --capability demo.transform --dir target/release
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use capload_sdk::prelude::*;

/// Text transformation published by this module.
pub trait Transform: Send + Sync {
    /// Short name shown to users
    fn name(&self) -> &str;

    fn apply(&self, input: &str) -> String;
}

declare_capability!(
    /// Capability for [`Transform`] implementations.
    pub TransformCapability, "demo.transform", dyn Transform
);

static PREFIXES_BUILT: AtomicU64 = AtomicU64::new(0);

#[derive(Default)]
pub struct Echo;

impl Transform for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn apply(&self, input: &str) -> String {
        input.to_string()
    }
}

#[derive(Default)]
pub struct Reverse;

impl Transform for Reverse {
    fn name(&self) -> &str {
        "reverse"
    }

    fn apply(&self, input: &str) -> String {
        input.chars().rev().collect()
    }
}

#[derive(Default)]
pub struct Uppercase;

impl Transform for Uppercase {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn apply(&self, input: &str) -> String {
        input.to_uppercase()
    }
}

/// Prepends a numbered tag.
pub struct Prefix {
    tag: String,
}

impl Transform for Prefix {
    fn name(&self) -> &str {
        "prefix"
    }

    fn apply(&self, input: &str) -> String {
        format!("{} {}", self.tag, input)
    }
}

fn build_prefix() -> Result<Option<Prefix>, ConstructError> {
    let n = PREFIXES_BUILT.fetch_add(1, Ordering::Relaxed);
    Ok(Some(Prefix {
        tag: format!("[{}]", n),
    }))
}

/// The module's type catalog.
pub fn catalog() -> CatalogResult {
    Ok(ModuleCatalog::new("capload-example-plugin")
        .with_type(
            TypeDescriptor::concrete::<Echo>("capload_example_plugin::Echo")
                .implements::<TransformCapability>(|t| t as Box<dyn Transform>),
        )
        .with_type(
            TypeDescriptor::concrete::<Reverse>("capload_example_plugin::Reverse")
                .implements::<TransformCapability>(|t| t as Box<dyn Transform>),
        )
        .with_type(
            TypeDescriptor::concrete::<Uppercase>("capload_example_plugin::Uppercase")
                .implements::<TransformCapability>(|t| t as Box<dyn Transform>),
        )
        .with_type(
            TypeDescriptor::with_factory("capload_example_plugin::Prefix", build_prefix)
                .implements::<TransformCapability>(|t| t as Box<dyn Transform>),
        ))
}

export_module!(catalog: catalog);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lists_transforms() {
        let catalog = catalog().unwrap();
        assert_eq!(catalog.len(), 4);
        assert!(catalog
            .types()
            .iter()
            .all(|t| t.is_assignable_to(TransformCapability::NAME)));
    }

    #[test]
    fn test_transforms() {
        assert_eq!(Reverse.apply("abc"), "cba");
        assert_eq!(Uppercase.apply("abc"), "ABC");
        assert_eq!(Echo.apply("abc"), "abc");
    }
}
