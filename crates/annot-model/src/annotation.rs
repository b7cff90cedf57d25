//! Annotation type descriptors and annotation occurrences
//!
//! An [`AnnotationTypeDef`] describes one annotation type: its attributes
//! with declared kinds, defaults and alias declarations, and the
//! meta-annotations declared on the type itself. An [`AnnotationDecl`] is a
//! single occurrence of an annotation with its explicitly set attribute
//! values; unset attributes fall back to the declared defaults.

use crate::value::{TypeName, Value, ValueKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Alias declaration on an attribute
///
/// With no explicit `annotation` the alias targets an attribute of the same
/// annotation type (explicit same-type pairs must be declared mutually).
/// With no explicit `attribute` the target attribute shares the declaring
/// attribute's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AliasFor {
    /// Target annotation type; `None` means the declaring type itself
    pub annotation: Option<TypeName>,

    /// Target attribute name; `None` means the declaring attribute's name
    pub attribute: Option<String>,
}

impl AliasFor {
    /// Alias to another attribute of the same annotation type
    #[inline]
    #[must_use]
    pub fn same_type(attribute: impl Into<String>) -> Self {
        Self {
            annotation: None,
            attribute: Some(attribute.into()),
        }
    }

    /// Alias to a named attribute of a meta-annotation
    #[inline]
    #[must_use]
    pub fn meta(annotation: impl Into<TypeName>, attribute: impl Into<String>) -> Self {
        Self {
            annotation: Some(annotation.into()),
            attribute: Some(attribute.into()),
        }
    }

    /// Alias to the same-named attribute of a meta-annotation
    #[inline]
    #[must_use]
    pub fn meta_same_name(annotation: impl Into<TypeName>) -> Self {
        Self {
            annotation: Some(annotation.into()),
            attribute: None,
        }
    }

    /// Target attribute name, defaulting to the declaring attribute's name
    #[inline]
    #[must_use]
    pub fn target_attribute<'a>(&'a self, declaring: &'a str) -> &'a str {
        self.attribute.as_deref().unwrap_or(declaring)
    }
}

/// One attribute of an annotation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name, unique within the annotation type
    pub name: String,

    /// Declared kind
    pub kind: ValueKind,

    /// Default value, if the attribute declares one
    pub default_value: Option<Value>,

    /// Alias declaration, if any
    pub alias: Option<AliasFor>,
}

impl AttributeDef {
    /// Create an attribute with no default and no alias
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default_value: None,
            alias: None,
        }
    }

    /// Set the default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the alias declaration
    #[inline]
    #[must_use]
    pub fn with_alias(mut self, alias: AliasFor) -> Self {
        self.alias = Some(alias);
        self
    }
}

/// Descriptor of one annotation type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationTypeDef {
    /// Qualified type name, unique within a registry
    pub name: TypeName,

    /// Declared attributes, in declaration order
    pub attributes: Vec<AttributeDef>,

    /// Meta-annotations declared on this annotation type
    pub meta_annotations: Vec<AnnotationDecl>,

    /// Whether occurrences propagate from superclasses to subclasses
    pub inherited: bool,

    /// Container type that may wrap repeated occurrences of this type
    pub repeatable: Option<TypeName>,
}

impl AnnotationTypeDef {
    /// Create an annotation type with no attributes or meta-annotations
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            meta_annotations: Vec::new(),
            inherited: false,
            repeatable: None,
        }
    }

    /// Add an attribute
    #[inline]
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a meta-annotation occurrence
    #[inline]
    #[must_use]
    pub fn meta(mut self, decl: AnnotationDecl) -> Self {
        self.meta_annotations.push(decl);
        self
    }

    /// Mark occurrences as inherited along the superclass chain
    #[inline]
    #[must_use]
    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// Declare the container type for repeated occurrences
    #[inline]
    #[must_use]
    pub fn repeatable(mut self, container: impl Into<TypeName>) -> Self {
        self.repeatable = Some(container.into());
        self
    }

    /// Look up an attribute by name (declaration order, not canonical order)
    #[inline]
    #[must_use]
    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// One annotation occurrence: type plus explicitly set attribute values
///
/// Keys absent from `values` take the attribute's declared default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDecl {
    /// The annotation type
    pub type_name: TypeName,

    /// Explicitly set values, in declaration order
    pub values: IndexMap<String, Value>,
}

impl AnnotationDecl {
    /// Create a marker occurrence with no explicit values
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Self {
            type_name: type_name.into(),
            values: IndexMap::new(),
        }
    }

    /// Set an attribute value
    #[inline]
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Explicitly set value for an attribute, if any
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether the attribute was explicitly set
    #[inline]
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl Hash for AnnotationDecl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // IndexMap equality ignores insertion order, so hash sorted by key
        // to keep Eq and Hash consistent.
        self.type_name.hash(state);
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        for key in keys {
            key.hash(state);
            self.values[key.as_str()].hash(state);
        }
    }
}

impl Display for AnnotationDecl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.type_name)?;
        if !self.values.is_empty() {
            f.write_str("(")?;
            for (i, (name, value)) in self.values.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}={value}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}
