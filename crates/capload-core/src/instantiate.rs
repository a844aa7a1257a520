//! Instantiation of candidate types.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use capload_sdk::guard::panic_message;
use capload_sdk::{Capability, ConstructError};
use tracing::info;

use crate::diagnostics::{Diagnostic, Staged};
use crate::error::InstantiationError;
use crate::loader::ModuleImage;
use crate::scanner::CandidateType;

/// A live implementation of capability `C`.
///
/// Owns the object and keeps the module that defined it loaded. Dereferences
/// to `C::Object`.
pub struct PluginInstance<C: Capability> {
    // Dropped before the image
    object: Box<C::Object>,
    type_name: String,
    module: String,
    _image: Arc<ModuleImage>,
}

impl<C: Capability> PluginInstance<C> {
    /// Qualified name of the instantiated type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Module the type came from
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Borrow the capability object.
    pub fn get(&self) -> &C::Object {
        &self.object
    }

    /// Mutably borrow the capability object.
    pub fn get_mut(&mut self) -> &mut C::Object {
        &mut self.object
    }
}

impl<C: Capability> Deref for PluginInstance<C> {
    type Target = C::Object;

    fn deref(&self) -> &Self::Target {
        &self.object
    }
}

impl<C: Capability> DerefMut for PluginInstance<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.object
    }
}

impl<C: Capability> fmt::Debug for PluginInstance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("capability", &C::NAME)
            .field("type_name", &self.type_name)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

/// Default-construct one instance of `C` per candidate.
///
/// Output keeps candidate order. Candidates that fail, panic, or produce no
/// instance are skipped and reported.
pub fn instantiate<C: Capability>(candidates: Vec<CandidateType>) -> Staged<PluginInstance<C>> {
    let mut instances = Vec::with_capacity(candidates.len());
    let mut diagnostics = Vec::new();

    for candidate in candidates {
        match construct::<C>(&candidate) {
            Ok(Some(object)) => instances.push(PluginInstance {
                object,
                type_name: candidate.type_name.clone(),
                module: candidate.module.clone(),
                _image: Arc::clone(candidate.image()),
            }),
            Ok(None) => diagnostics.push(
                Diagnostic::InstanceAbsent {
                    module: candidate.module.clone(),
                    type_name: candidate.type_name.clone(),
                }
                .emitted(),
            ),
            Err(e) => diagnostics.push(
                Diagnostic::InstantiationFailure {
                    module: candidate.module.clone(),
                    type_name: candidate.type_name.clone(),
                    capability: C::NAME.to_string(),
                    message: e.to_string(),
                }
                .emitted(),
            ),
        }
    }

    info!(
        category = "plugin",
        capability = C::NAME,
        instances = instances.len(),
        skipped = diagnostics.len(),
        "Plugins instantiated"
    );
    (instances, diagnostics)
}

fn construct<C: Capability>(
    candidate: &CandidateType,
) -> Result<Option<Box<C::Object>>, InstantiationError> {
    let erased = panic::catch_unwind(AssertUnwindSafe(|| {
        candidate.descriptor.construct_as(C::NAME)
    }))
    .map_err(|payload| InstantiationError::Panicked(panic_message(payload.as_ref())))??;

    match erased {
        Some(erased) => erased
            .downcast::<Box<C::Object>>()
            .map(|object| Some(*object))
            .map_err(|_| ConstructError::IncompatibleShape(C::NAME.to_string()).into()),
        None => Ok(None),
    }
}
