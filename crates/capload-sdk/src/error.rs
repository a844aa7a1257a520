//! Module-side error types.

use thiserror::Error;

/// A module could not enumerate its type catalog.
///
/// Enumeration may fail partially: some types resolve while others do not.
/// Each per-type cause is kept in `loader_errors` so the host can report it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CatalogError {
    /// Summary of the failure
    pub message: String,
    /// Nested per-type failure messages
    pub loader_errors: Vec<String>,
}

impl CatalogError {
    /// Create a catalog error without nested causes.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            loader_errors: Vec::new(),
        }
    }

    /// Attach a nested per-type failure message.
    pub fn with_loader_error(mut self, error: impl Into<String>) -> Self {
        self.loader_errors.push(error.into());
        self
    }

    /// Nested per-type failure messages.
    pub fn loader_errors(&self) -> &[String] {
        &self.loader_errors
    }
}

/// A type could not produce an instance for a capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructError {
    /// The type declares no no-argument constructor.
    #[error("type has no default constructor")]
    NoDefaultConstructor,

    /// The constructor ran and reported a failure.
    #[error("construction failed: {0}")]
    Failed(String),

    /// The type does not declare the requested capability.
    #[error("type is not assignable to capability '{0}'")]
    NotAssignable(String),

    /// The constructor panicked inside the module.
    #[error("constructor panicked: {0}")]
    Panicked(String),

    /// The constructed object does not have the shape the capability expects.
    #[error("instance does not match the contract of capability '{0}'")]
    IncompatibleShape(String),
}

impl ConstructError {
    /// Shorthand for [`ConstructError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        ConstructError::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_error_display() {
        let err = CatalogError::new("could not enumerate types")
            .with_loader_error("missing dependency: libfoo")
            .with_loader_error("bad layout: Bar");

        assert_eq!(err.to_string(), "could not enumerate types");
        assert_eq!(err.loader_errors().len(), 2);
    }

    #[test]
    fn test_construct_error_display() {
        let err = ConstructError::failed("out of tokens");
        assert_eq!(err.to_string(), "construction failed: out of tokens");

        let err = ConstructError::NotAssignable("demo.greeter".into());
        assert_eq!(
            err.to_string(),
            "type is not assignable to capability 'demo.greeter'"
        );
    }
}
