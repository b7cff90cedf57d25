//! Annot data model
//!
//! Descriptors for annotation types, their attributes, and the element
//! hierarchy they are declared on, plus the [`TypeRegistry`] that stands in
//! for reflective introspection.
//!
//! # Core concepts
//!
//! - [`AnnotationTypeDef`]: one annotation type with attributes, defaults,
//!   alias declarations and meta-annotations
//! - [`AnnotationDecl`]: one occurrence with explicitly set values
//! - [`Attributes`]: canonical, index-addressable attribute table
//! - [`ClassDef`] / [`MethodDef`] / [`Element`]: the annotated hierarchy
//! - [`TypeRegistry`]: concurrent lookup of all of the above
//!
//! # Example
//!
//! ```
//! use annot_model::{AnnotationDecl, AnnotationTypeDef, AttributeDef, TypeRegistry, Value, ValueKind};
//!
//! let registry = TypeRegistry::new();
//! registry
//!     .register_annotation(
//!         AnnotationTypeDef::new("web.Mapping")
//!             .attribute(AttributeDef::new("path", ValueKind::Str).with_default(Value::string(""))),
//!     )
//!     .unwrap();
//!
//! let decl = AnnotationDecl::new("web.Mapping").set("path", Value::string("/x"));
//! let table = registry.attributes(&decl.type_name).unwrap();
//! assert!(table.is_valid(&decl, &registry));
//! ```

#![warn(unreachable_pub)]

mod annotation;
mod attributes;
mod convert;
mod element;
mod error;
mod registry;
mod value;

pub use annotation::{AliasFor, AnnotationDecl, AnnotationTypeDef, AttributeDef};
pub use attributes::{Attributes, VALUE};
pub use convert::ValueConversion;
pub use element::{ClassDef, Element, MethodDef, MethodRef};
pub use error::{AnnotationError, RegistryError};
pub use registry::TypeRegistry;
pub use value::{EnumValue, TypeName, Value, ValueKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
