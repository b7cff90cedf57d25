//! Type registry: the reflective-introspection collaborator
//!
//! Annotation type and class descriptors are registered up front; lookups
//! during scanning and mapping go through the registry. A referenced type
//! name that was never registered plays the role of an unresolvable class
//! and surfaces as an introspection failure, never a panic.

use crate::annotation::{AnnotationDecl, AnnotationTypeDef};
use crate::attributes::Attributes;
use crate::element::{ClassDef, Element, MethodDef};
use crate::error::{AnnotationError, RegistryError};
use crate::value::TypeName;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Registry of annotation types and classes
///
/// Concurrent maps throughout; compute-if-absent races on the attribute
/// table cache are idempotent.
#[derive(Debug)]
pub struct TypeRegistry {
    id: u64,
    annotation_types: DashMap<TypeName, Arc<AnnotationTypeDef>>,
    classes: DashMap<TypeName, Arc<ClassDef>>,
    attribute_tables: DashMap<TypeName, Arc<Attributes>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            annotation_types: DashMap::new(),
            classes: DashMap::new(),
            attribute_tables: DashMap::new(),
        }
    }

    /// Process-unique identity of this registry, used as a cache key
    /// component by scanners so entries from different registries never mix
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register an annotation type descriptor
    ///
    /// # Errors
    /// Returns an error if the name is taken or attribute names collide.
    pub fn register_annotation(&self, def: AnnotationTypeDef) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for attribute in &def.attributes {
            if !seen.insert(attribute.name.as_str()) {
                return Err(RegistryError::DuplicateAttribute {
                    annotation: def.name.clone(),
                    attribute: attribute.name.clone(),
                });
            }
        }
        if self.annotation_types.contains_key(&def.name) {
            return Err(RegistryError::DuplicateAnnotationType(def.name));
        }
        self.annotation_types.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Register a class descriptor
    ///
    /// # Errors
    /// Returns an error if a class with this name is already registered.
    pub fn register_class(&self, def: ClassDef) -> Result<(), RegistryError> {
        if self.classes.contains_key(&def.name) {
            return Err(RegistryError::DuplicateClass(def.name));
        }
        self.classes.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Look up an annotation type descriptor
    #[inline]
    #[must_use]
    pub fn annotation_type(&self, name: &TypeName) -> Option<Arc<AnnotationTypeDef>> {
        self.annotation_types.get(name).map(|e| Arc::clone(&e))
    }

    /// Look up a class descriptor
    #[inline]
    #[must_use]
    pub fn class(&self, name: &TypeName) -> Option<Arc<ClassDef>> {
        self.classes.get(name).map(|e| Arc::clone(&e))
    }

    /// Canonical attribute table for an annotation type, cached per type
    ///
    /// # Errors
    /// Introspection error if the annotation type is not registered.
    pub fn attributes(&self, name: &TypeName) -> Result<Arc<Attributes>, AnnotationError> {
        if let Some(table) = self.attribute_tables.get(name) {
            return Ok(Arc::clone(&table));
        }
        let def = self.annotation_type(name).ok_or_else(|| {
            AnnotationError::introspection(
                format!("@{name}"),
                "annotation type is not registered",
            )
        })?;
        let table = Attributes::of(&def);
        self.attribute_tables
            .insert(name.clone(), Arc::clone(&table));
        Ok(table)
    }

    /// Annotations declared directly on an element
    ///
    /// # Errors
    /// Introspection error if the element's class (or method) is unknown.
    pub fn declared_annotations(
        &self,
        element: &Element,
    ) -> Result<Vec<AnnotationDecl>, AnnotationError> {
        match element {
            Element::Class(name) => {
                let class = self.class(name).ok_or_else(|| {
                    AnnotationError::introspection(name.to_string(), "class is not registered")
                })?;
                Ok(class.annotations.clone())
            }
            Element::Method(_) => {
                let method = self.resolve_method(element)?;
                Ok(method.annotations.clone())
            }
        }
    }

    /// Resolve a method element to its declaration
    ///
    /// # Errors
    /// Introspection error if the class or the method is unknown.
    pub fn resolve_method(&self, element: &Element) -> Result<MethodDef, AnnotationError> {
        let Element::Method(method_ref) = element else {
            return Err(AnnotationError::introspection(
                element.to_string(),
                "element is not a method",
            ));
        };
        let class = self.class(&method_ref.class).ok_or_else(|| {
            AnnotationError::introspection(
                method_ref.class.to_string(),
                "class is not registered",
            )
        })?;
        class
            .find_method(&method_ref.name, &method_ref.param_types)
            .cloned()
            .ok_or_else(|| {
                AnnotationError::introspection(
                    element.to_string(),
                    "method is not declared on the class",
                )
            })
    }

    /// Number of registered annotation types
    #[inline]
    #[must_use]
    pub fn annotation_type_count(&self) -> usize {
        self.annotation_types.len()
    }

    /// Drop derived caches (attribute tables). Registered descriptors stay.
    pub fn clear_caches(&self) {
        self.attribute_tables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AttributeDef;
    use crate::value::ValueKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn register_and_lookup_annotation() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(AnnotationTypeDef::new("t.Marker"))
            .unwrap();

        assert!(registry.annotation_type(&TypeName::new("t.Marker")).is_some());
        assert!(registry.annotation_type(&TypeName::new("t.Other")).is_none());
        assert_eq!(registry.annotation_type_count(), 1);
    }

    #[test]
    fn duplicate_annotation_type_rejected() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(AnnotationTypeDef::new("t.Marker"))
            .unwrap();
        let result = registry.register_annotation(AnnotationTypeDef::new("t.Marker"));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateAnnotationType(_))
        ));
    }

    #[test]
    fn duplicate_attribute_rejected() {
        let registry = TypeRegistry::new();
        let def = AnnotationTypeDef::new("t.Bad")
            .attribute(AttributeDef::new("value", ValueKind::Str))
            .attribute(AttributeDef::new("value", ValueKind::Int));
        let result = registry.register_annotation(def);
        assert!(matches!(
            result,
            Err(RegistryError::DuplicateAttribute { .. })
        ));
    }

    #[test]
    fn attributes_are_cached_per_type() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.A").attribute(AttributeDef::new("value", ValueKind::Str)),
            )
            .unwrap();

        let name = TypeName::new("t.A");
        let first = registry.attributes(&name).unwrap();
        let second = registry.attributes(&name).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry.clear_caches();
        let third = registry.attributes(&name).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn unknown_annotation_type_is_introspection_failure() {
        let registry = TypeRegistry::new();
        let err = registry.attributes(&TypeName::new("t.Missing")).unwrap_err();
        assert!(matches!(err, AnnotationError::Introspection { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn declared_annotations_for_class_and_method() {
        let registry = TypeRegistry::new();
        registry
            .register_class(
                ClassDef::new("app.Controller")
                    .annotated(AnnotationDecl::new("t.Marker"))
                    .method(MethodDef::new("handle").annotated(AnnotationDecl::new("t.Marker"))),
            )
            .unwrap();

        let on_class = registry
            .declared_annotations(&Element::class("app.Controller"))
            .unwrap();
        assert_eq!(on_class.len(), 1);

        let on_method = registry
            .declared_annotations(&Element::method("app.Controller", "handle"))
            .unwrap();
        assert_eq!(on_method.len(), 1);

        let missing = registry.declared_annotations(&Element::method("app.Controller", "nope"));
        assert!(missing.is_err());
    }
}
