//! Hierarchy scanning for annotated elements
//!
//! This crate walks class and method hierarchies collecting declared
//! annotations. Three concerns live here:
//!
//! - [`AnnotationFilter`]: which annotation type names are excluded from
//!   traversal entirely
//! - [`RepeatableContainers`]: recognizing container annotations and
//!   unwrapping their repeated occurrences
//! - [`AnnotationsScanner`]: the strategy-driven walk itself, feeding each
//!   hierarchy level to a short-circuiting processor
//!
//! Declared annotations are cached per (registry, element) in a bounded
//! cache shared process-wide; [`clear_declared_cache`] drops it, for use
//! when descriptors are replaced wholesale.
//!
//! ```
//! use annot_model::{AnnotationDecl, AnnotationTypeDef, ClassDef, Element, TypeRegistry};
//! use annot_scan::{AnnotationsScanner, SearchStrategy};
//!
//! let registry = TypeRegistry::new();
//! registry
//!     .register_annotation(AnnotationTypeDef::new("app.Service"))
//!     .unwrap();
//! registry
//!     .register_class(ClassDef::new("app.Impl").annotated(AnnotationDecl::new("app.Service")))
//!     .unwrap();
//!
//! let scanner = AnnotationsScanner::new(&registry);
//! let found = scanner.scan(&Element::class("app.Impl"), SearchStrategy::Direct, |_, _, decls| {
//!     decls
//!         .iter()
//!         .flatten()
//!         .find(|d| d.type_name.as_str() == "app.Service")
//!         .cloned()
//! });
//! assert!(found.is_some());
//! ```

#![warn(unreachable_pub)]

mod filter;
mod repeatable;
mod scanner;

pub use filter::AnnotationFilter;
pub use repeatable::{ContainersCacheKey, RepeatableContainers};
pub use scanner::{
    clear_declared_cache, introspection_failure, AnnotationsScanner, EnclosingPredicate,
    SearchStrategy,
};
