//! Canonical attribute tables
//!
//! [`Attributes`] fixes a canonical order for an annotation type's
//! attributes (`value` first, lexicographic otherwise) so that index-based
//! cross-referencing between type mappings stays stable regardless of
//! declaration order. Built once per annotation type and cached by the
//! registry; immutable after construction.

use crate::annotation::{AnnotationDecl, AnnotationTypeDef, AttributeDef};
use crate::registry::TypeRegistry;
use crate::value::{TypeName, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the conventional `value` attribute
pub const VALUE: &str = "value";

/// Ordered, index-addressable view of an annotation type's attributes
#[derive(Debug)]
pub struct Attributes {
    type_name: TypeName,
    attributes: Vec<AttributeDef>,
    by_name: HashMap<String, usize>,
}

impl Attributes {
    /// Build the canonical table for an annotation type
    #[must_use]
    pub fn of(def: &AnnotationTypeDef) -> Arc<Self> {
        let mut attributes = def.attributes.clone();
        attributes.sort_by(|a, b| match (a.name == VALUE, b.name == VALUE) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });
        let by_name = attributes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i))
            .collect();
        Arc::new(Self {
            type_name: def.name.clone(),
            attributes,
            by_name,
        })
    }

    /// The annotation type this table describes
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// Number of attributes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the type declares no attributes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attribute at a canonical index
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> &AttributeDef {
        &self.attributes[index]
    }

    /// Canonical index of an attribute name
    #[inline]
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Canonical index of the conventional `value` attribute
    #[inline]
    #[must_use]
    pub fn value_attribute(&self) -> Option<usize> {
        self.index_of(VALUE)
    }

    /// Iterate attributes in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.iter()
    }

    /// Whether an occurrence is safely introspectable against this table.
    ///
    /// False when the occurrence sets an unknown attribute, sets a value of
    /// the wrong kind, or references a nested annotation type that is not
    /// registered. Scanners replace such occurrences with `None`
    /// placeholders rather than failing the walk.
    #[must_use]
    pub fn is_valid(&self, decl: &AnnotationDecl, registry: &TypeRegistry) -> bool {
        if decl.type_name != self.type_name {
            return false;
        }
        decl.values.iter().all(|(name, value)| {
            let Some(index) = self.index_of(name) else {
                return false;
            };
            let attribute = self.get(index);
            value.matches_kind(&attribute.kind) && nested_types_resolve(value, registry)
        })
    }
}

fn nested_types_resolve(value: &Value, registry: &TypeRegistry) -> bool {
    match value {
        Value::Annotation(decl) => {
            registry.annotation_type(&decl.type_name).is_some()
                && decl
                    .values
                    .values()
                    .all(|v| nested_types_resolve(v, registry))
        }
        Value::Array(values) => values.iter().all(|v| nested_types_resolve(v, registry)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;
    use pretty_assertions::assert_eq;

    fn mapping_def() -> AnnotationTypeDef {
        AnnotationTypeDef::new("web.Mapping")
            .attribute(AttributeDef::new("path", ValueKind::Str).with_default(Value::string("")))
            .attribute(AttributeDef::new("value", ValueKind::Str).with_default(Value::string("")))
            .attribute(AttributeDef::new("method", ValueKind::Str).with_default(Value::string("")))
    }

    #[test]
    fn canonical_order_puts_value_first() {
        let attributes = Attributes::of(&mapping_def());
        let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["value", "method", "path"]);
    }

    #[test]
    fn index_lookups() {
        let attributes = Attributes::of(&mapping_def());
        assert_eq!(attributes.index_of("value"), Some(0));
        assert_eq!(attributes.index_of("path"), Some(2));
        assert_eq!(attributes.index_of("missing"), None);
        assert_eq!(attributes.value_attribute(), Some(0));
        assert_eq!(attributes.len(), 3);
    }

    #[test]
    fn validity_checks_kinds_and_names() {
        let registry = TypeRegistry::new();
        registry.register_annotation(mapping_def()).unwrap();
        let attributes = registry.attributes(&TypeName::new("web.Mapping")).unwrap();

        let ok = AnnotationDecl::new("web.Mapping").set("path", Value::string("/x"));
        assert!(attributes.is_valid(&ok, &registry));

        let wrong_kind = AnnotationDecl::new("web.Mapping").set("path", Value::Int(1));
        assert!(!attributes.is_valid(&wrong_kind, &registry));

        let unknown_attr = AnnotationDecl::new("web.Mapping").set("nope", Value::string("x"));
        assert!(!attributes.is_valid(&unknown_attr, &registry));
    }

    #[test]
    fn validity_requires_nested_annotation_types_to_resolve() {
        let registry = TypeRegistry::new();
        let def = AnnotationTypeDef::new("t.Outer").attribute(AttributeDef::new(
            "inner",
            ValueKind::Annotation(TypeName::new("t.Inner")),
        ));
        registry.register_annotation(def).unwrap();
        let attributes = registry.attributes(&TypeName::new("t.Outer")).unwrap();

        let decl = AnnotationDecl::new("t.Outer")
            .set("inner", Value::annotation(AnnotationDecl::new("t.Inner")));
        // t.Inner is not registered: the occurrence is not introspectable.
        assert!(!attributes.is_valid(&decl, &registry));

        registry
            .register_annotation(AnnotationTypeDef::new("t.Inner"))
            .unwrap();
        assert!(attributes.is_valid(&decl, &registry));
    }
}
