//! Error taxonomy for the annotation model
//!
//! Three recovery scopes, kept as distinct variants so traversal code can
//! catch-and-continue on a typed condition rather than a broad failure:
//! - configuration errors abort only the offending type mapping,
//! - introspection errors make one annotation absent and the scan continues,
//! - attribute errors are hard failures local to the accessor call.

use crate::value::TypeName;

/// Errors raised by annotation lookup, mapping and value access
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnnotationError {
    /// Alias/mirror declarations on an annotation type are structurally
    /// invalid. Recoverable by treating the annotation type as absent.
    #[error("annotation configuration error on @{annotation}: {reason}")]
    Configuration {
        /// The annotation type whose declarations are invalid
        annotation: TypeName,
        /// Human-readable explanation
        reason: String,
    },

    /// A referenced type could not be resolved or an occurrence failed
    /// validation. Recoverable by treating the annotation as absent.
    #[error("introspection failure on {context}: {reason}")]
    Introspection {
        /// What was being introspected
        context: String,
        /// Why it failed
        reason: String,
    },

    /// A caller asked for an attribute that does not exist. Hard failure.
    #[error("no attribute `{attribute}` on @{annotation}")]
    NoSuchAttribute {
        /// The annotation type
        annotation: TypeName,
        /// The requested attribute name
        attribute: String,
    },

    /// A value could not be adapted to the requested type. Hard failure.
    #[error("attribute `{attribute}` on @{annotation}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The annotation type
        annotation: TypeName,
        /// The attribute name
        attribute: String,
        /// What the caller asked for
        expected: String,
        /// What the value actually is
        found: String,
    },

    /// A value accessor was called on the missing sentinel. Hard failure.
    #[error("annotation @{0} is not present")]
    Missing(TypeName),
}

impl AnnotationError {
    /// Configuration error helper
    #[inline]
    #[must_use]
    pub fn configuration(annotation: impl Into<TypeName>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            annotation: annotation.into(),
            reason: reason.into(),
        }
    }

    /// Introspection error helper
    #[inline]
    #[must_use]
    pub fn introspection(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Introspection {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a configuration error (invalid alias/mirror setup)
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Whether the scanner may recover by treating the annotation as absent
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Introspection { .. })
    }
}

/// Errors raised when registering descriptors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// An annotation type with this name is already registered
    #[error("annotation type already registered: {0}")]
    DuplicateAnnotationType(TypeName),

    /// A class with this name is already registered
    #[error("class already registered: {0}")]
    DuplicateClass(TypeName),

    /// Attribute names must be unique within one annotation type
    #[error("duplicate attribute `{attribute}` on @{annotation}")]
    DuplicateAttribute {
        /// The annotation type
        annotation: TypeName,
        /// The repeated attribute name
        attribute: String,
    },
}
