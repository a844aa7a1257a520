//! Capability markers.
//!
//! A capability is the abstract contract a plugin type satisfies. In Rust the
//! contract is a trait object type (`dyn Greeter`); the marker type ties that
//! object type to a stable name that both sides of the module boundary agree
//! on, since trait identity alone does not survive a catalog lookup by name.

/// Marker for an abstract contract that plugin types can be loaded for.
pub trait Capability: 'static {
    /// Stable name used to match catalog entries against this capability.
    const NAME: &'static str;

    /// The object type handed to the host, usually `dyn SomeTrait`.
    type Object: ?Sized + 'static;
}

/// Declare a capability marker type.
///
/// # Example
///
/// ```rust
/// use capload_sdk::{declare_capability, Capability};
///
/// pub trait Exporter {
///     fn export(&self) -> Vec<u8>;
/// }
///
/// declare_capability!(
///     /// Exports documents.
///     pub ExporterCapability, "docs.exporter", dyn Exporter
/// );
///
/// assert_eq!(ExporterCapability::NAME, "docs.exporter");
/// ```
#[macro_export]
macro_rules! declare_capability {
    (
        $(#[$meta:meta])*
        $vis:vis $marker:ident, $name:expr, $object:ty
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        $vis struct $marker;

        impl $crate::Capability for $marker {
            const NAME: &'static str = $name;
            type Object = $object;
        }
    };
}
