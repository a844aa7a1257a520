//! Native module opener for .so/.dylib/.dll files.

use std::io::Write;
use std::path::{Path, PathBuf};

use capload_sdk::{symbols, AbiVersionFn, AttachFn, CatalogFn, ABI_VERSION};
use libloading::Library;
use tracing::{debug, warn};

use super::module::{LoadedModule, ModuleEntryPoints, ModuleOrigin};
use super::ModuleOpener;
use crate::config::{defaults, LoadSemantics};
use crate::error::ModuleLoadError;
use crate::security::TrustPolicy;
use crate::source::is_module_file;

/// Opens modules through the platform's dynamic loader.
#[derive(Debug, Clone)]
pub struct NativeOpener {
    trust: TrustPolicy,
    extension: String,
    staging_dir: Option<PathBuf>,
}

impl NativeOpener {
    /// Create an opener with the given trust policy.
    pub fn new(trust: TrustPolicy) -> Self {
        Self {
            trust,
            extension: defaults::module_extension().to_string(),
            staging_dir: None,
        }
    }

    /// Set the extension used for staged copies.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Stage module copies in `dir` instead of the system temp directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Trust policy applied to module files.
    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }

    fn check_trusted(&self, path: &Path) -> Result<(), ModuleLoadError> {
        self.trust.verify(path)?;
        if !is_module_file(path, &self.extension) {
            return Err(ModuleLoadError::Untrusted(format!(
                "not a .{} module: {}",
                self.extension,
                path.display()
            )));
        }
        Ok(())
    }

    /// Write bytes to a uniquely named temporary module file and open it.
    ///
    /// The file is removed once the platform loader has returned, whether
    /// or not it accepted the library; a mapping stays valid after the
    /// directory entry is gone.
    fn open_staged(
        &self,
        name: &str,
        origin: ModuleOrigin,
        bytes: &[u8],
    ) -> Result<LoadedModule, ModuleLoadError> {
        let suffix = format!(".{}", self.extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("capload-").suffix(&suffix);
        let mut file = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ModuleLoadError::Staging)?;
        file.write_all(bytes).map_err(ModuleLoadError::Staging)?;
        file.flush().map_err(ModuleLoadError::Staging)?;
        let staged = file.into_temp_path();

        debug!(
            category = "plugin",
            module = %name,
            staged = %staged.display(),
            "Staged module bytes"
        );
        let library = open_library(&staged)?;
        drop(staged);

        bind(name, origin, library)
    }
}

impl Default for NativeOpener {
    fn default() -> Self {
        Self::new(TrustPolicy::default())
    }
}

impl ModuleOpener for NativeOpener {
    fn open_path(
        &self,
        path: &Path,
        semantics: LoadSemantics,
    ) -> Result<LoadedModule, ModuleLoadError> {
        let name = path.display().to_string();
        let origin = ModuleOrigin::File(path.to_path_buf());

        match semantics {
            LoadSemantics::Standard => {
                self.check_trusted(path)?;
                bind(&name, origin, open_library(path)?)
            }
            LoadSemantics::RawFile => {
                self.check_trusted(path)?;
                let bytes = std::fs::read(path).map_err(ModuleLoadError::Staging)?;
                self.open_staged(&name, origin, &bytes)
            }
            LoadSemantics::Relaxed => {
                warn!(
                    category = "plugin",
                    module = %name,
                    "Loading module without trust checks"
                );
                if !path.exists() {
                    return Err(ModuleLoadError::NotFound(path.to_path_buf()));
                }
                bind(&name, origin, open_library(path)?)
            }
        }
    }

    fn open_bytes(&self, name: &str, bytes: &[u8]) -> Result<LoadedModule, ModuleLoadError> {
        self.open_staged(name, ModuleOrigin::Embedded(name.to_string()), bytes)
    }
}

fn open_library(path: &Path) -> Result<Library, ModuleLoadError> {
    // SAFETY: loading a library runs its initializers. Modules are trusted
    // to the extent the active load semantics require.
    unsafe { Library::new(path) }.map_err(|e| ModuleLoadError::LoadFailed(e.to_string()))
}

/// Check the ABI version and resolve the module's entry points.
fn bind(
    name: &str,
    origin: ModuleOrigin,
    library: Library,
) -> Result<LoadedModule, ModuleLoadError> {
    let entry = {
        // SAFETY: symbol types match the declarations emitted by
        // `capload_sdk::export_module!`, which also produced the ABI version
        // checked before any Rust-ABI function is called.
        let version = unsafe { library.get::<AbiVersionFn>(symbols::ABI_VERSION) }.map_err(|_| {
            ModuleLoadError::MissingEntryPoint(symbols::display(symbols::ABI_VERSION))
        })?;
        let actual = unsafe { version() };
        if actual != ABI_VERSION {
            return Err(ModuleLoadError::AbiMismatch {
                expected: ABI_VERSION,
                actual,
            });
        }

        let catalog = unsafe { library.get::<CatalogFn>(symbols::CATALOG) }
            .map_err(|_| ModuleLoadError::MissingEntryPoint(symbols::display(symbols::CATALOG)))?;
        let attach = unsafe { library.get::<AttachFn>(symbols::ATTACH_DEPENDENCIES) }.ok();

        ModuleEntryPoints {
            catalog: *catalog,
            attach: attach.map(|symbol| *symbol),
        }
    };

    debug!(
        category = "plugin",
        module = %name,
        attach_hook = entry.attach.is_some(),
        "Module entry points resolved"
    );
    Ok(LoadedModule::from_library(name, origin, entry, library))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rejects_missing_file() {
        let opener = NativeOpener::default();
        let err = opener
            .open_path(Path::new("/nonexistent/libmissing.so"), LoadSemantics::Standard)
            .unwrap_err();
        assert!(matches!(err, ModuleLoadError::NotFound(_)));
    }

    #[test]
    fn test_relaxed_rejects_missing_file() {
        let opener = NativeOpener::default();
        let err = opener
            .open_path(Path::new("/nonexistent/libmissing.so"), LoadSemantics::Relaxed)
            .unwrap_err();
        assert!(matches!(err, ModuleLoadError::NotFound(_)));
    }

    #[test]
    fn test_garbage_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("garbage.{}", defaults::module_extension()));
        std::fs::write(&path, b"definitely not a shared library").unwrap();

        let opener = NativeOpener::default();
        for semantics in [
            LoadSemantics::Standard,
            LoadSemantics::RawFile,
            LoadSemantics::Relaxed,
        ] {
            let err = opener.open_path(&path, semantics).unwrap_err();
            assert!(
                matches!(err, ModuleLoadError::LoadFailed(_)),
                "{:?}: {}",
                semantics,
                err
            );
        }
    }

    #[test]
    fn test_trust_policy_blocks_standard_but_not_relaxed_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("big.{}", defaults::module_extension()));
        std::fs::write(&path, [0u8; 32]).unwrap();

        let opener = NativeOpener::new(TrustPolicy::new().with_max_file_size(8));
        assert!(matches!(
            opener.open_path(&path, LoadSemantics::Standard),
            Err(ModuleLoadError::Untrusted(_))
        ));
        assert!(matches!(
            opener.open_path(&path, LoadSemantics::RawFile),
            Err(ModuleLoadError::Untrusted(_))
        ));
        // Relaxed gets past the policy and fails in the platform loader instead
        assert!(matches!(
            opener.open_path(&path, LoadSemantics::Relaxed),
            Err(ModuleLoadError::LoadFailed(_))
        ));
    }

    #[test]
    fn test_standard_rejects_foreign_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("module.txt");
        std::fs::write(&path, b"x").unwrap();

        let opener = NativeOpener::default();
        let err = opener.open_path(&path, LoadSemantics::Standard).unwrap_err();
        assert!(err.to_string().contains("not a ."));
    }

    #[test]
    fn test_embedded_garbage_fails_to_load() {
        let opener = NativeOpener::default();
        let err = opener.open_bytes("embedded/garbage.so", b"nope").unwrap_err();
        assert!(matches!(err, ModuleLoadError::LoadFailed(_)));
    }

    #[test]
    fn test_staged_copies_are_removed_after_failed_load() {
        let staging = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("garbage.{}", defaults::module_extension()));
        std::fs::write(&path, b"definitely not a shared library").unwrap();

        let opener = NativeOpener::default().with_staging_dir(staging.path());
        assert!(opener.open_bytes("embedded/garbage.so", b"nope").is_err());
        assert!(opener.open_path(&path, LoadSemantics::RawFile).is_err());

        let left: Vec<_> = std::fs::read_dir(staging.path()).unwrap().collect();
        assert!(left.is_empty(), "staged files left behind: {:?}", left);
    }
}
