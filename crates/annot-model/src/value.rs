//! Attribute values and their declared kinds
//!
//! Provides [`Value`], the closed sum of types an annotation attribute may
//! hold, and [`ValueKind`], the declared type of an attribute. Only
//! one-dimensional arrays are representable, matching what annotation
//! declarations allow.

use crate::annotation::AnnotationDecl;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a type (class, enum, or annotation type) by qualified name.
///
/// Cheap to clone; the backing string is shared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Create a type name from a qualified name string
    #[inline]
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The qualified name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Simple (unqualified) name: everything after the last `.`
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Package prefix check, segment-aware: `lang` matches `lang.Deprecated`
    /// but not `language.X`.
    #[must_use]
    pub fn in_package(&self, prefix: &str) -> bool {
        match self.0.strip_prefix(prefix) {
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared type of an annotation attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean
    Bool,

    /// Integer (covers all integral widths of the source model)
    Int,

    /// Floating point
    Float,

    /// String
    Str,

    /// Reference to a type, stored by name
    Type,

    /// Constant of the named enum type
    Enum(TypeName),

    /// Nested annotation of the named annotation type
    Annotation(TypeName),

    /// One-dimensional array of the element kind
    Array(Box<ValueKind>),
}

impl ValueKind {
    /// Array of this kind
    #[inline]
    #[must_use]
    pub fn array_of(self) -> Self {
        Self::Array(Box::new(self))
    }

    /// Element kind if this is an array kind
    #[inline]
    #[must_use]
    pub fn element(&self) -> Option<&ValueKind> {
        match self {
            Self::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Whether two declared kinds are interchangeable for aliasing purposes:
    /// equal, or one is the array form of the other.
    #[must_use]
    pub fn is_compatible(&self, other: &ValueKind) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Self::Array(elem), _) => elem.as_ref() == other,
            (_, Self::Array(elem)) => elem.as_ref() == self,
            _ => false,
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("string"),
            Self::Type => f.write_str("type"),
            Self::Enum(name) => write!(f, "enum {name}"),
            Self::Annotation(name) => write!(f, "@{name}"),
            Self::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

/// Constant of an enum type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    /// The enum type
    pub type_name: TypeName,

    /// Constant name within the enum
    pub constant: String,
}

impl EnumValue {
    /// Create an enum constant value
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<TypeName>, constant: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            constant: constant.into(),
        }
    }
}

impl Display for EnumValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.constant)
    }
}

/// An attribute value
///
/// Equality and hashing are array-aware (element-wise) and treat floats by
/// bit pattern, so synthesized annotations can be used as map keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value
    Bool(bool),

    /// Integer value
    Int(i64),

    /// Floating point value
    Float(f64),

    /// String value
    Str(String),

    /// Type reference, by name
    Type(TypeName),

    /// Enum constant
    Enum(EnumValue),

    /// Nested annotation occurrence
    Annotation(Box<AnnotationDecl>),

    /// One-dimensional array
    Array(Vec<Value>),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(v) => v.hash(state),
            Self::Type(v) => v.hash(state),
            Self::Enum(v) => v.hash(state),
            Self::Annotation(v) => v.hash(state),
            Self::Array(v) => v.hash(state),
        }
    }
}

impl Value {
    /// String value helper
    #[inline]
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Type reference helper
    #[inline]
    #[must_use]
    pub fn type_ref(name: impl Into<TypeName>) -> Self {
        Self::Type(name.into())
    }

    /// Nested annotation helper
    #[inline]
    #[must_use]
    pub fn annotation(decl: AnnotationDecl) -> Self {
        Self::Annotation(Box::new(decl))
    }

    /// Whether this value conforms to the declared kind.
    ///
    /// Arrays are checked element-wise; an empty array conforms to any
    /// array kind. Nested annotations and enums must name the declared type.
    #[must_use]
    pub fn matches_kind(&self, kind: &ValueKind) -> bool {
        match (self, kind) {
            (Self::Bool(_), ValueKind::Bool)
            | (Self::Int(_), ValueKind::Int)
            | (Self::Float(_), ValueKind::Float)
            | (Self::Str(_), ValueKind::Str)
            | (Self::Type(_), ValueKind::Type) => true,
            (Self::Enum(value), ValueKind::Enum(name)) => value.type_name == *name,
            (Self::Annotation(decl), ValueKind::Annotation(name)) => decl.type_name == *name,
            (Self::Array(values), ValueKind::Array(elem)) => {
                values.iter().all(|v| v.matches_kind(elem))
            }
            _ => false,
        }
    }

    /// The kind this value naturally carries, if determinable.
    ///
    /// Empty arrays have no determinable element kind and return `None`.
    #[must_use]
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Int(_) => Some(ValueKind::Int),
            Self::Float(_) => Some(ValueKind::Float),
            Self::Str(_) => Some(ValueKind::Str),
            Self::Type(_) => Some(ValueKind::Type),
            Self::Enum(value) => Some(ValueKind::Enum(value.type_name.clone())),
            Self::Annotation(decl) => Some(ValueKind::Annotation(decl.type_name.clone())),
            Self::Array(values) => values
                .first()
                .and_then(Value::kind)
                .map(|elem| ValueKind::Array(Box::new(elem))),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "\"{v}\""),
            Self::Type(v) => write!(f, "{v}"),
            Self::Enum(v) => write!(f, "{v}"),
            Self::Annotation(v) => write!(f, "{v}"),
            Self::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}
