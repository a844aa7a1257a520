//! Fixture module for capload tests.
//!
//! Built both as an `rlib`, so tests can call its catalogs in-process, and as
//! a `cdylib`, so the native loader has a real module to open. The exported
//! catalog deliberately mixes working types with every kind of type the
//! pipeline must skip.

use std::sync::atomic::{AtomicUsize, Ordering};

use capload_sdk::prelude::*;

/// Capability exercised by most tests.
pub trait Greeter: Send + Sync {
    /// Greet someone
    fn greet(&self, name: &str) -> String;

    /// Language of the greeting
    fn language(&self) -> &'static str;
}

declare_capability!(
    /// Marker for [`Greeter`] implementations.
    pub GreeterCapability,
    "capload.testing.greeter",
    dyn Greeter
);

/// A second capability, implemented by only some types.
pub trait Farewell: Send + Sync {
    /// Say goodbye
    fn farewell(&self) -> String;
}

declare_capability!(
    /// Marker for [`Farewell`] implementations.
    pub FarewellCapability,
    "capload.testing.farewell",
    dyn Farewell
);

/// Module name reported by every catalog in this crate.
pub const MODULE_NAME: &str = "capload-testing";

/// Greets in English.
#[derive(Debug, Default)]
pub struct English;

impl Greeter for English {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {}!", name)
    }

    fn language(&self) -> &'static str {
        "en"
    }
}

/// Greets and says goodbye in French.
#[derive(Debug, Default)]
pub struct French;

impl Greeter for French {
    fn greet(&self, name: &str) -> String {
        format!("Bonjour, {} !", name)
    }

    fn language(&self) -> &'static str {
        "fr"
    }
}

impl Farewell for French {
    fn farewell(&self) -> String {
        "Au revoir".to_string()
    }
}

/// Construction always fails.
#[derive(Debug)]
pub struct Pirate;

impl Greeter for Pirate {
    fn greet(&self, name: &str) -> String {
        format!("Ahoy, {}!", name)
    }

    fn language(&self) -> &'static str {
        "pirate"
    }
}

/// Construction succeeds without producing an instance.
#[derive(Debug)]
pub struct Shy;

impl Greeter for Shy {
    fn greet(&self, _name: &str) -> String {
        String::new()
    }

    fn language(&self) -> &'static str {
        "none"
    }
}

/// Panics when constructed.
#[derive(Debug)]
pub struct Grumpy;

impl Default for Grumpy {
    fn default() -> Self {
        panic!("grumpy refuses to be constructed")
    }
}

impl Greeter for Grumpy {
    fn greet(&self, _name: &str) -> String {
        "Go away.".to_string()
    }

    fn language(&self) -> &'static str {
        "en"
    }
}

/// Needs arguments, so it has no default constructor.
#[derive(Debug)]
pub struct Formal {
    /// Title used in greetings
    pub title: String,
}

impl Greeter for Formal {
    fn greet(&self, name: &str) -> String {
        format!("Good day, {} {}.", self.title, name)
    }

    fn language(&self) -> &'static str {
        "en"
    }
}

/// Says goodbye only.
#[derive(Debug, Default)]
pub struct Goodbye;

impl Farewell for Goodbye {
    fn farewell(&self) -> String {
        "Goodbye".to_string()
    }
}

/// Type names of the greeters the full catalog can instantiate, in order.
pub const INSTANTIABLE_GREETERS: [&str; 2] =
    ["capload_testing::English", "capload_testing::French"];

/// Full catalog.
///
/// Greeter candidates, in order: English, French, Pirate, Shy, Grumpy and
/// Formal. Only English and French instantiate.
pub fn catalog() -> CatalogResult {
    Ok(ModuleCatalog::new(MODULE_NAME)
        .with_type(
            TypeDescriptor::abstract_type("capload_testing::BaseGreeter")
                .assignable_to::<GreeterCapability>(),
        )
        .with_type(
            TypeDescriptor::interface("capload_testing::Greeter")
                .assignable_to::<GreeterCapability>(),
        )
        .with_type(
            TypeDescriptor::concrete::<English>("capload_testing::English")
                .implements::<GreeterCapability>(|g| g as Box<dyn Greeter>),
        )
        .with_type(
            TypeDescriptor::concrete::<French>("capload_testing::French")
                .implements::<GreeterCapability>(|g| g as Box<dyn Greeter>)
                .implements::<FarewellCapability>(|f| f as Box<dyn Farewell>),
        )
        .with_type(
            TypeDescriptor::with_factory("capload_testing::Pirate", || {
                Err::<Option<Pirate>, _>(ConstructError::failed("the pirate is at sea"))
            })
            .implements::<GreeterCapability>(|g| g as Box<dyn Greeter>),
        )
        .with_type(
            TypeDescriptor::with_factory("capload_testing::Shy", || Ok(None::<Shy>))
                .implements::<GreeterCapability>(|g| g as Box<dyn Greeter>),
        )
        .with_type(
            TypeDescriptor::concrete::<Grumpy>("capload_testing::Grumpy")
                .implements::<GreeterCapability>(|g| g as Box<dyn Greeter>),
        )
        .with_type(
            TypeDescriptor::without_default_constructor::<Formal>("capload_testing::Formal")
                .implements::<GreeterCapability>(|g| g as Box<dyn Greeter>),
        ))
}

/// Catalog with only a [`Farewell`] implementation.
pub fn farewell_only_catalog() -> CatalogResult {
    Ok(ModuleCatalog::new("capload-testing-farewell").with_type(
        TypeDescriptor::concrete::<Goodbye>("capload_testing::Goodbye")
            .implements::<FarewellCapability>(|f| f as Box<dyn Farewell>),
    ))
}

/// Catalog that exports nothing.
pub fn empty_catalog() -> CatalogResult {
    Ok(ModuleCatalog::new("capload-testing-empty"))
}

/// Catalog whose enumeration partially fails.
pub fn broken_catalog() -> CatalogResult {
    Err(CatalogError::new("2 types could not be loaded")
        .with_loader_error("capload_testing::Klingon: missing dependency libtlh")
        .with_loader_error("capload_testing::Elvish: unresolved symbol"))
}

/// Catalog that panics.
pub fn panicking_catalog() -> CatalogResult {
    panic!("catalog enumeration panicked")
}

static ATTACH_CALLS: AtomicUsize = AtomicUsize::new(0);

/// Attach hook that counts its calls and reports an error.
pub fn attach() -> Result<(), String> {
    ATTACH_CALLS.fetch_add(1, Ordering::SeqCst);
    Err("no bundled dependencies to attach".to_string())
}

/// Number of times [`attach`] has run in this process.
pub fn attach_calls() -> usize {
    ATTACH_CALLS.load(Ordering::SeqCst)
}

export_module!(catalog: catalog, attach: attach);
