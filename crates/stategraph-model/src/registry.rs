//! Process-wide registry of type descriptors
//!
//! Provides [`TypeRegistry`], the lookup that resolves [`TypeRef::Named`]
//! references. Concurrent reads and registrations go through a `DashMap`.

use crate::error::ModelError;
use crate::types::{TypeDescriptor, TypeRef};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

static GLOBAL: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// Registry of type descriptors keyed by name
///
/// Types are never unregistered; the registry lives for the whole process.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: DashMap<Arc<str>, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// The process-wide registry
    #[inline]
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Register a descriptor
    ///
    /// # Errors
    /// Returns error if a type with the same name is already registered
    pub fn register(&self, descriptor: TypeDescriptor) -> Result<Arc<TypeDescriptor>, ModelError> {
        match self.types.entry(descriptor.name().clone()) {
            Entry::Occupied(e) => Err(ModelError::DuplicateType(e.key().clone())),
            Entry::Vacant(e) => {
                let descriptor = Arc::new(descriptor);
                e.insert(descriptor.clone());
                Ok(descriptor)
            }
        }
    }

    /// Lookup descriptor by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types.get(name).map(|d| d.value().clone())
    }

    /// Resolve a named type reference
    #[must_use]
    pub fn resolve(&self, ty: &TypeRef) -> Option<Arc<TypeDescriptor>> {
        ty.name().and_then(|name| self.get(name))
    }

    /// Check if name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Number of registered types
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> TypeDescriptor {
        TypeDescriptor::record("Point")
            .property("x", TypeRef::INT)
            .property("y", TypeRef::INT)
            .build()
            .unwrap()
    }

    #[test]
    fn registry_new_empty() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.contains("Point"));
    }

    #[test]
    fn registry_register_and_resolve() {
        let registry = TypeRegistry::new();
        let registered = registry.register(point()).unwrap();

        let resolved = registry.resolve(&TypeRef::named("Point")).unwrap();
        assert!(Arc::ptr_eq(&registered, &resolved));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let registry = TypeRegistry::new();
        registry.register(point()).unwrap();
        let result = registry.register(point());
        assert!(matches!(result, Err(ModelError::DuplicateType(_))));
    }

    #[test]
    fn registry_resolve_non_named() {
        let registry = TypeRegistry::new();
        assert!(registry.resolve(&TypeRef::INT).is_none());
        assert!(registry.resolve(&TypeRef::named("Missing")).is_none());
    }
}
