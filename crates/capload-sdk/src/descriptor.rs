//! Type catalog definitions.
//!
//! A module describes the types it exports with one [`TypeDescriptor`] each.
//! The host filters the catalog down to concrete types assignable to the
//! capability it is loading, then calls each descriptor's factory.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::ConstructError;
use crate::guard;

/// A constructed object with its concrete type erased.
pub type ErasedObject = Box<dyn Any>;

type Factory = Box<dyn Fn() -> Result<Option<ErasedObject>, ConstructError> + Send + Sync>;
type Upcast = Box<dyn Fn(ErasedObject) -> Option<ErasedObject> + Send + Sync>;

/// Kind of an exported type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Can be instantiated
    Concrete,
    /// Partial implementation meant to be specialised by other types
    Abstract,
    /// Pure contract with no implementation
    Interface,
}

impl TypeKind {
    /// Get the string representation of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Concrete => "concrete",
            TypeKind::Abstract => "abstract",
            TypeKind::Interface => "interface",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Assignability {
    capability: &'static str,
    upcast: Option<Upcast>,
}

impl Assignability {
    fn name(&self) -> &str {
        self.capability
    }
}

/// Description of one exported type.
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    assignable: Vec<Assignability>,
    factory: Option<Factory>,
}

impl TypeDescriptor {
    /// Describe a concrete type constructed through [`Default`].
    pub fn concrete<T: Default + 'static>(name: impl Into<String>) -> TypeBuilder<T> {
        Self::with_factory(name, || Ok(Some(T::default())))
    }

    /// Describe a concrete type with a fallible no-argument factory.
    ///
    /// The factory may return `Ok(None)` when construction succeeds without
    /// producing a usable instance.
    pub fn with_factory<T, F>(name: impl Into<String>, factory: F) -> TypeBuilder<T>
    where
        T: 'static,
        F: Fn() -> Result<Option<T>, ConstructError> + Send + Sync + 'static,
    {
        let factory: Factory = Box::new(move || {
            let result = guard::contain(&factory).map_err(ConstructError::Panicked)?;
            result.map(|instance| instance.map(|value| Box::new(value) as ErasedObject))
        });
        TypeBuilder::new(name.into(), TypeKind::Concrete, Some(factory))
    }

    /// Describe a concrete type that has no no-argument constructor.
    pub fn without_default_constructor<T: 'static>(name: impl Into<String>) -> TypeBuilder<T> {
        TypeBuilder::new(name.into(), TypeKind::Concrete, None)
    }

    /// Describe an abstract type.
    pub fn abstract_type(name: impl Into<String>) -> TypeBuilder<()> {
        TypeBuilder::new(name.into(), TypeKind::Abstract, None)
    }

    /// Describe an interface type.
    pub fn interface(name: impl Into<String>) -> TypeBuilder<()> {
        TypeBuilder::new(name.into(), TypeKind::Interface, None)
    }

    /// Qualified type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type kind
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Whether the type is neither abstract nor an interface.
    pub fn is_concrete(&self) -> bool {
        self.kind == TypeKind::Concrete
    }

    /// Whether the type declares a no-argument constructor.
    pub fn has_default_constructor(&self) -> bool {
        self.factory.is_some()
    }

    /// Whether the type is assignable to the named capability.
    pub fn is_assignable_to(&self, capability: &str) -> bool {
        self.assignable.iter().any(|a| a.capability == capability)
    }

    /// Names of all capabilities the type is assignable to.
    ///
    /// The names may live in the module's static data, so they are only
    /// borrowed for as long as the descriptor.
    pub fn capabilities(&self) -> impl Iterator<Item = &str> + '_ {
        self.assignable.iter().map(Assignability::name)
    }

    /// Construct an instance viewed as the named capability.
    ///
    /// On success the erased object holds a `Box<C::Object>` for the
    /// capability `C` whose name was passed.
    pub fn construct_as(&self, capability: &str) -> Result<Option<ErasedObject>, ConstructError> {
        let entry = self
            .assignable
            .iter()
            .find(|a| a.capability == capability)
            .ok_or_else(|| ConstructError::NotAssignable(capability.to_string()))?;
        let upcast = entry
            .upcast
            .as_ref()
            .ok_or_else(|| ConstructError::IncompatibleShape(capability.to_string()))?;
        let factory = self
            .factory
            .as_ref()
            .ok_or(ConstructError::NoDefaultConstructor)?;

        match factory()? {
            Some(object) => upcast(object)
                .map(Some)
                .ok_or_else(|| ConstructError::IncompatibleShape(capability.to_string())),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities().collect::<Vec<_>>())
            .field("default_constructor", &self.factory.is_some())
            .finish()
    }
}

/// Builder returned by the [`TypeDescriptor`] constructors.
pub struct TypeBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> TypeBuilder<T> {
    fn new(name: String, kind: TypeKind, factory: Option<Factory>) -> Self {
        Self {
            descriptor: TypeDescriptor {
                name,
                kind,
                assignable: Vec::new(),
                factory,
            },
            _marker: PhantomData,
        }
    }

    /// Declare that the type satisfies capability `C`.
    ///
    /// `cast` converts a boxed instance into the capability's object type,
    /// usually `|value| value as Box<dyn Trait>`.
    pub fn implements<C: Capability>(mut self, cast: fn(Box<T>) -> Box<C::Object>) -> Self {
        let upcast: Upcast = Box::new(move |object: ErasedObject| {
            object
                .downcast::<T>()
                .ok()
                .map(|value| Box::new(cast(value)) as ErasedObject)
        });
        self.descriptor.assignable.push(Assignability {
            capability: C::NAME,
            upcast: Some(upcast),
        });
        self
    }

    /// Declare assignability to `C` without a conversion.
    ///
    /// Used for abstract and interface types, which are never instantiated.
    pub fn assignable_to<C: Capability>(mut self) -> Self {
        self.descriptor.assignable.push(Assignability {
            capability: C::NAME,
            upcast: None,
        });
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

impl<T: 'static> From<TypeBuilder<T>> for TypeDescriptor {
    fn from(builder: TypeBuilder<T>) -> Self {
        builder.build()
    }
}

/// The set of types a module exports.
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    module: String,
    types: Vec<TypeDescriptor>,
}

impl ModuleCatalog {
    /// Create an empty catalog for the named module.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            types: Vec::new(),
        }
    }

    /// Add a type to the catalog
    pub fn with_type(mut self, descriptor: impl Into<TypeDescriptor>) -> Self {
        self.push(descriptor);
        self
    }

    /// Add a type to the catalog
    pub fn push(&mut self, descriptor: impl Into<TypeDescriptor>) {
        self.types.push(descriptor.into());
    }

    /// Module name as declared by the module itself
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Exported types in declaration order
    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    /// Take ownership of the exported types
    pub fn into_types(self) -> Vec<TypeDescriptor> {
        self.types
    }

    /// Number of exported types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the catalog exports no types
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
