//! Module source resolution.
//!
//! Turns a load strategy's source axis into the list of module locations the
//! loader will try, in order.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ModuleSourceKind;

/// Where one module comes from. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleLocation {
    /// A module file on disk
    Path(PathBuf),
    /// Module bytes embedded in the host binary
    Embedded {
        /// Logical resource name
        name: String,
        /// Raw module bytes
        bytes: Cow<'static, [u8]>,
    },
    /// The host's own module
    Host,
}

impl ModuleLocation {
    /// Name used in diagnostics.
    pub fn display_name(&self) -> Cow<'_, str> {
        match self {
            ModuleLocation::Path(path) => path.to_string_lossy(),
            ModuleLocation::Embedded { name, .. } => Cow::Borrowed(name),
            ModuleLocation::Host => Cow::Borrowed("<host>"),
        }
    }
}

impl fmt::Display for ModuleLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// A named byte resource bundled into the host binary.
///
/// Resources whose name ends in the module extension are treated as modules
/// by merged load strategies. Use [`embedded_module!`](crate::embedded_module)
/// to bundle a file at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedResource {
    name: Cow<'static, str>,
    bytes: Cow<'static, [u8]>,
}

impl EmbeddedResource {
    /// Wrap a static resource.
    pub const fn from_static(name: &'static str, bytes: &'static [u8]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            bytes: Cow::Borrowed(bytes),
        }
    }

    /// Wrap an owned resource.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            bytes: Cow::Owned(bytes.into()),
        }
    }

    /// Logical resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn has_extension(&self, extension: &str) -> bool {
        let suffix = format!(".{}", extension);
        let name = self.name.as_bytes();
        name.len() > suffix.len()
            && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
    }
}

/// Bundle a module file into the host binary.
///
/// ```rust,ignore
/// static MODULES: &[EmbeddedResource] = &[
///     capload_core::embedded_module!("../plugins/libgreeters.so"),
/// ];
/// ```
#[macro_export]
macro_rules! embedded_module {
    ($path:literal) => {
        $crate::source::EmbeddedResource::from_static($path, include_bytes!($path))
    };
}

/// Resolves module locations for one pipeline call.
#[derive(Debug, Clone, Copy)]
pub struct SourceResolver<'a> {
    directory: &'a Path,
    embedded: &'a [EmbeddedResource],
    extension: &'a str,
}

impl<'a> SourceResolver<'a> {
    /// Create a resolver.
    pub fn new(directory: &'a Path, embedded: &'a [EmbeddedResource], extension: &'a str) -> Self {
        Self {
            directory,
            embedded,
            extension,
        }
    }

    /// Module locations for the given source.
    ///
    /// Merged sources yield every embedded module followed by the host
    /// module, exactly once. Directory sources yield every module file under
    /// the directory; a missing directory yields nothing.
    pub fn resolve(&self, source: ModuleSourceKind) -> Vec<ModuleLocation> {
        match source {
            ModuleSourceKind::Merged => {
                let mut locations: Vec<ModuleLocation> = self
                    .embedded
                    .iter()
                    .filter(|resource| resource.has_extension(self.extension))
                    .map(|resource| ModuleLocation::Embedded {
                        name: resource.name().to_string(),
                        bytes: resource.bytes.clone(),
                    })
                    .collect();
                debug!(
                    category = "plugin",
                    embedded = locations.len(),
                    "Resolved embedded modules"
                );
                locations.push(ModuleLocation::Host);
                locations
            }
            ModuleSourceKind::Directory => {
                if !self.directory.is_dir() {
                    debug!(
                        category = "plugin",
                        dir = %self.directory.display(),
                        "Plugin directory does not exist, no modules to load"
                    );
                    return Vec::new();
                }
                let mut paths = Vec::new();
                collect_module_files(self.directory, self.extension, &mut paths);
                debug!(
                    category = "plugin",
                    dir = %self.directory.display(),
                    files = paths.len(),
                    "Resolved module files"
                );
                paths.into_iter().map(ModuleLocation::Path).collect()
            }
        }
    }
}

/// Check if a file has the module extension.
pub fn is_module_file(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn collect_module_files(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                category = "plugin",
                dir = %dir.display(),
                error = %e,
                "Cannot read plugin directory"
            );
            return;
        }
    };

    let mut entries: Vec<_> = entries.flatten().collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        // Symlinked directories are not followed, so cycles cannot occur
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            collect_module_files(&path, extension, out);
        } else if path.is_file() && is_module_file(&path, extension) {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_is_module_file() {
        assert!(is_module_file(Path::new("a/libgreet.so"), "so"));
        assert!(is_module_file(Path::new("GREET.DLL"), "dll"));
        assert!(!is_module_file(Path::new("greet.so.txt"), "so"));
        assert!(!is_module_file(Path::new("greet"), "so"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let resolver = SourceResolver::new(Path::new("/nonexistent/capload/plugins"), &[], "so");
        assert!(resolver.resolve(ModuleSourceKind::Directory).is_empty());
    }

    #[test]
    fn test_directory_scan_is_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.so"));
        touch(&dir.path().join("a.so"));
        touch(&dir.path().join("nested/deeper/c.so"));
        touch(&dir.path().join("nested/readme.md"));

        let resolver = SourceResolver::new(dir.path(), &[], "so");
        let locations = resolver.resolve(ModuleSourceKind::Directory);

        assert_eq!(
            locations,
            vec![
                ModuleLocation::Path(dir.path().join("a.so")),
                ModuleLocation::Path(dir.path().join("b.so")),
                ModuleLocation::Path(dir.path().join("nested/deeper/c.so")),
            ]
        );
    }

    #[test]
    fn test_merged_always_includes_host_once() {
        let resolver = SourceResolver::new(Path::new("/unused"), &[], "so");
        assert_eq!(
            resolver.resolve(ModuleSourceKind::Merged),
            vec![ModuleLocation::Host]
        );
    }

    #[test]
    fn test_merged_filters_embedded_by_extension() {
        let embedded = [
            EmbeddedResource::from_static("plugins/greet.so", b"\x7fELF"),
            EmbeddedResource::from_static("plugins/readme.txt", b"hello"),
            EmbeddedResource::new("PLUGINS/OTHER.SO", vec![1, 2, 3]),
            EmbeddedResource::from_static(".so", b""),
        ];
        let resolver = SourceResolver::new(Path::new("/unused"), &embedded, "so");

        let names: Vec<String> = resolver
            .resolve(ModuleSourceKind::Merged)
            .iter()
            .map(|l| l.display_name().into_owned())
            .collect();
        assert_eq!(names, ["plugins/greet.so", "PLUGINS/OTHER.SO", "<host>"]);
    }

    #[test]
    fn test_merged_accepts_non_ascii_names() {
        let embedded = [
            EmbeddedResource::new("x\u{e9}\u{e9}", vec![1]),
            EmbeddedResource::new("modules/gr\u{fc}\u{df}e.so", vec![2]),
            EmbeddedResource::new("\u{1f600}", vec![3]),
        ];
        let resolver = SourceResolver::new(Path::new("/unused"), &embedded, "so");

        let names: Vec<String> = resolver
            .resolve(ModuleSourceKind::Merged)
            .iter()
            .map(|l| l.display_name().into_owned())
            .collect();
        assert_eq!(names, ["modules/gr\u{fc}\u{df}e.so", "<host>"]);
    }

    #[test]
    fn test_merged_ignores_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.so"));

        let resolver = SourceResolver::new(dir.path(), &[], "so");
        assert_eq!(
            resolver.resolve(ModuleSourceKind::Merged),
            vec![ModuleLocation::Host]
        );
    }
}
