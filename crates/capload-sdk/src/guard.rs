//! Panic containment on the module side of the boundary.
//!
//! A module links its own copy of the standard library. A panic that unwinds
//! out of module code into the host is a foreign exception to the host's
//! runtime and aborts the process, so every function the host calls into is
//! wrapped here, in code compiled into the module.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::CatalogError;
use crate::CatalogResult;

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `f`, turning a panic into its message.
pub fn contain<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Catalog entry point wrapper used by [`export_module!`](crate::export_module).
#[doc(hidden)]
pub fn catalog(catalog: fn() -> CatalogResult) -> CatalogResult {
    contain(catalog)
        .unwrap_or_else(|message| Err(CatalogError::new(format!("catalog panicked: {}", message))))
}

/// Attach hook wrapper used by [`export_module!`](crate::export_module).
#[doc(hidden)]
pub fn attach(attach: fn() -> Result<(), String>) -> Result<(), String> {
    contain(attach).unwrap_or_else(|message| Err(format!("attach hook panicked: {}", message)))
}
