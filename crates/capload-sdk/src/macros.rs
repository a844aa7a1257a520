//! Declarative macros for module development.

/// Export a module's entry points.
///
/// This macro generates the symbols the host looks up after loading the
/// shared library: the ABI version, the catalog function and, optionally,
/// the dependency attach hook. Panics in the catalog function or the attach
/// hook are caught inside the module and reported as errors.
///
/// # Example
///
/// ```rust,ignore
/// use capload_sdk::prelude::*;
///
/// fn catalog() -> CatalogResult {
///     Ok(ModuleCatalog::new("my-module"))
/// }
///
/// fn attach() -> Result<(), String> {
///     // Resolve bundled dependencies before the host reads the catalog.
///     Ok(())
/// }
///
/// export_module!(catalog: catalog, attach: attach);
/// ```
#[macro_export]
macro_rules! export_module {
    (catalog: $catalog:path $(,)?) => {
        #[no_mangle]
        pub extern "C" fn capload_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        #[no_mangle]
        pub fn capload_module_catalog() -> $crate::CatalogResult {
            $crate::guard::catalog($catalog)
        }
    };
    (catalog: $catalog:path, attach: $attach:path $(,)?) => {
        $crate::export_module!(catalog: $catalog);

        #[no_mangle]
        pub fn capload_attach_dependencies() -> ::std::result::Result<(), ::std::string::String> {
            $crate::guard::attach($attach)
        }
    };
}

#[cfg(test)]
mod tests {
    mod exported {
        use crate::{CatalogResult, ModuleCatalog};

        fn catalog() -> CatalogResult {
            Ok(ModuleCatalog::new("macro-test"))
        }

        fn attach() -> Result<(), String> {
            Err("nothing to attach".to_string())
        }

        crate::export_module!(catalog: catalog, attach: attach);
    }

    #[test]
    fn test_export_module_generates_entry_points() {
        assert_eq!(exported::capload_abi_version(), crate::ABI_VERSION);
        assert_eq!(exported::capload_module_catalog().unwrap().module(), "macro-test");
        assert!(exported::capload_attach_dependencies().is_err());
    }

    #[test]
    fn test_entry_points_match_sdk_signatures() {
        let _: crate::AbiVersionFn = exported::capload_abi_version;
        let _: crate::CatalogFn = exported::capload_module_catalog;
        let _: crate::AttachFn = exported::capload_attach_dependencies;
    }
}
