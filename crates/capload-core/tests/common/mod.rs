//! Shared helpers for capload-core integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use capload_core::config::LoadSemantics;
use capload_core::loader::{LoadedModule, ModuleEntryPoints, ModuleOpener, ModuleOrigin};
use capload_core::{ModuleLoadError, NativeOpener, PluginHost};
use capload_sdk::CatalogFn;
use tempfile::TempDir;

/// Extension used for module files in stubbed plugin directories.
pub const STUB_EXTENSION: &str = "mod";

/// One call seen by [`StubOpener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenCall {
    Path(PathBuf, LoadSemantics),
    Bytes(String, usize),
}

/// Opener that serves in-process catalogs keyed by file stem.
///
/// Files whose stem is not registered fail to load, like a corrupt library.
#[derive(Default)]
pub struct StubOpener {
    modules: HashMap<String, ModuleEntryPoints>,
    calls: Mutex<Vec<OpenCall>>,
}

impl StubOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, stem: &str, catalog: CatalogFn) -> Self {
        self.with_entry(stem, ModuleEntryPoints::new(catalog))
    }

    pub fn with_entry(mut self, stem: &str, entry: ModuleEntryPoints) -> Self {
        self.modules.insert(stem.to_string(), entry);
        self
    }

    pub fn calls(&self) -> Vec<OpenCall> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, name: &str, origin: ModuleOrigin) -> Result<LoadedModule, ModuleLoadError> {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        match self.modules.get(stem) {
            Some(entry) => Ok(LoadedModule::in_process(name, origin, *entry)),
            None => Err(ModuleLoadError::LoadFailed(format!(
                "{}: invalid ELF header",
                name
            ))),
        }
    }
}

impl ModuleOpener for StubOpener {
    fn open_path(
        &self,
        path: &Path,
        semantics: LoadSemantics,
    ) -> Result<LoadedModule, ModuleLoadError> {
        self.calls
            .lock()
            .unwrap()
            .push(OpenCall::Path(path.to_path_buf(), semantics));
        self.lookup(
            &path.display().to_string(),
            ModuleOrigin::File(path.to_path_buf()),
        )
    }

    fn open_bytes(&self, name: &str, bytes: &[u8]) -> Result<LoadedModule, ModuleLoadError> {
        self.calls
            .lock()
            .unwrap()
            .push(OpenCall::Bytes(name.to_string(), bytes.len()));
        self.lookup(name, ModuleOrigin::Embedded(name.to_string()))
    }
}

/// Create a plugin directory containing empty module files.
pub fn plugin_dir(files: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        let path = dir.path().join(file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"").unwrap();
    }
    dir
}

/// Host over `dir` serving stubbed modules.
pub fn stub_host(dir: &Path, opener: StubOpener) -> PluginHost<StubOpener> {
    PluginHost::<NativeOpener>::new(dir)
        .with_opener(opener)
        .with_module_extension(STUB_EXTENSION)
}

/// Install a test subscriber so diagnostics show up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("capload=debug")
        .with_test_writer()
        .try_init();
}

/// Locate the fixture module built from `capload-testing`.
pub fn fixture_module() -> Option<PathBuf> {
    let target = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("../../target"));
    let file = format!(
        "{}capload_testing.{}",
        std::env::consts::DLL_PREFIX,
        std::env::consts::DLL_EXTENSION
    );

    ["debug", "debug/deps", "release", "release/deps"]
        .iter()
        .map(|profile| target.join(profile).join(&file))
        .find(|path| path.is_file())
}
