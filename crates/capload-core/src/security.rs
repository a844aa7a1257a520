//! Trust checks for module files.
//!
//! The standard and raw-file loading semantics run every module file through
//! a [`TrustPolicy`] before handing it to the platform loader. The relaxed
//! semantics skip it entirely.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::defaults;
use crate::error::ModuleLoadError;

/// Checks a module file must pass before it is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustPolicy {
    /// If non-empty, modules must live under one of these directories
    pub allowed_roots: Vec<PathBuf>,

    /// Maximum module file size (in bytes)
    pub max_file_size: u64,

    /// If non-empty, the module's SHA-256 digest (hex, any case) must be listed
    pub trusted_digests: Vec<String>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            allowed_roots: Vec::new(),
            max_file_size: defaults::MAX_MODULE_SIZE,
            trusted_digests: Vec::new(),
        }
    }
}

impl TrustPolicy {
    /// Create a policy with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an allowed root directory.
    pub fn with_allowed_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.allowed_roots.push(root.into());
        self
    }

    /// Set maximum module file size.
    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    /// Trust a module by its SHA-256 digest.
    pub fn with_trusted_digest(mut self, digest: impl Into<String>) -> Self {
        self.trusted_digests.push(digest.into().to_ascii_lowercase());
        self
    }

    /// Validate a module file.
    pub fn verify(&self, path: &Path) -> Result<(), ModuleLoadError> {
        if !path.exists() {
            return Err(ModuleLoadError::NotFound(path.to_path_buf()));
        }

        let metadata = std::fs::metadata(path).map_err(ModuleLoadError::Staging)?;
        if !metadata.is_file() {
            return Err(ModuleLoadError::Untrusted(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        if metadata.len() > self.max_file_size {
            return Err(ModuleLoadError::Untrusted(format!(
                "file too large: {} bytes (max: {})",
                metadata.len(),
                self.max_file_size
            )));
        }

        if !self.allowed_roots.is_empty() {
            let canonical = path.canonicalize().map_err(ModuleLoadError::Staging)?;
            let allowed = self.allowed_roots.iter().any(|root| {
                root.canonicalize()
                    .map(|root| canonical.starts_with(root))
                    .unwrap_or(false)
            });
            if !allowed {
                return Err(ModuleLoadError::Untrusted(format!(
                    "outside allowed directories: {}",
                    path.display()
                )));
            }
        }

        if !self.trusted_digests.is_empty() {
            let digest = file_digest(path).map_err(ModuleLoadError::Staging)?;
            let trusted = self
                .trusted_digests
                .iter()
                .any(|t| t.trim().eq_ignore_ascii_case(&digest));
            if !trusted {
                return Err(ModuleLoadError::Untrusted(format!(
                    "digest {} is not trusted: {}",
                    digest,
                    path.display()
                )));
            }
        }

        Ok(())
    }
}

/// SHA-256 digest of a file, as lowercase hex.
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn module_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_policy_default() {
        let policy = TrustPolicy::default();
        assert!(policy.allowed_roots.is_empty());
        assert!(policy.trusted_digests.is_empty());
        assert_eq!(policy.max_file_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_verify_missing_file() {
        let policy = TrustPolicy::new();
        let err = policy.verify(Path::new("/nonexistent/module.so")).unwrap_err();
        assert!(matches!(err, ModuleLoadError::NotFound(_)));
    }

    #[test]
    fn test_verify_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = TrustPolicy::new().verify(dir.path()).unwrap_err();
        assert!(matches!(err, ModuleLoadError::Untrusted(_)));
    }

    #[test]
    fn test_verify_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = module_file(dir.path(), "big.so", &[0u8; 64]);

        assert!(TrustPolicy::new().with_max_file_size(64).verify(&path).is_ok());
        let err = TrustPolicy::new()
            .with_max_file_size(63)
            .verify(&path)
            .unwrap_err();
        assert!(err.to_string().contains("file too large"));
    }

    #[test]
    fn test_verify_allowed_roots() {
        let allowed = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let inside = module_file(allowed.path(), "inside.so", b"x");
        let outside = module_file(other.path(), "outside.so", b"x");

        let policy = TrustPolicy::new().with_allowed_root(allowed.path());
        assert!(policy.verify(&inside).is_ok());
        assert!(matches!(
            policy.verify(&outside),
            Err(ModuleLoadError::Untrusted(_))
        ));
    }

    #[test]
    fn test_verify_trusted_digests() {
        let dir = tempfile::tempdir().unwrap();
        let path = module_file(dir.path(), "signed.so", b"abc");
        // SHA-256 of "abc"
        let digest = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";

        assert_eq!(file_digest(&path).unwrap(), digest.to_ascii_lowercase());
        assert!(TrustPolicy::new()
            .with_trusted_digest(digest)
            .verify(&path)
            .is_ok());
        assert!(TrustPolicy::new()
            .with_trusted_digest("00")
            .verify(&path)
            .is_err());
    }

    #[test]
    fn test_configured_digests_ignore_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = module_file(dir.path(), "signed.so", b"abc");

        let config = crate::config::LoaderConfig::from_toml_str(
            r#"
            [trust]
            trusted_digests = ["BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"]
            "#,
        )
        .unwrap();
        assert!(config.trust.verify(&path).is_ok());
    }
}
