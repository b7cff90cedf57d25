//! Merged-annotation views over meta-annotation graphs
//!
//! Builds on [`annot_model`] descriptors and the [`annot_scan`] hierarchy
//! walker to present each discovered annotation as a merged view: attribute
//! values resolved through explicit aliases, naming conventions and mirror
//! sets, across the whole meta-annotation chain.
//!
//! - [`AnnotationTypeMappings`]: per-type mapping arenas, breadth-first and
//!   cycle-guarded, cached process-wide
//! - [`MergedAnnotation`]: the per-occurrence view with typed getters,
//!   value adaptation and cached synthesis
//! - [`MergedAnnotations`]: the façade tying scanner, mappings and views
//!   together with ordered streaming and selector-driven lookup
//!
//! ```
//! use annot_model::{ClassDef, Element};
//! use annot_merge::MergedAnnotations;
//! use annot_scan::SearchStrategy;
//! use annot_test_utils::{post_decl, web_registry};
//!
//! let registry = web_registry();
//! registry
//!     .register_class(ClassDef::new("app.Handler").annotated(post_decl("/x")))
//!     .unwrap();
//!
//! let annotations = MergedAnnotations::search(SearchStrategy::Direct)
//!     .from(&registry, &Element::class("app.Handler"));
//! let mapping = annotations.get("web.Mapping");
//! assert_eq!(mapping.get_string("path").unwrap(), "/x");
//! assert_eq!(mapping.get_string("method").unwrap(), "POST");
//! ```

#![warn(unreachable_pub)]

mod annotations;
mod collection;
mod mapped;
mod mapping;
mod mappings;
mod selector;
mod synthesized;

pub use annotations::{MergedAnnotations, Search};
pub use mapped::{Adapt, MergedAnnotation};
pub use mapping::{AnnotationTypeMapping, MirrorSet};
pub use mappings::{clear_mappings_cache, AnnotationTypeMappings};
pub use selector::{AnnotationSelector, FirstDirectlyDeclared, Nearest};
pub use synthesized::SynthesizedAnnotation;

/// Drop every process-wide cache: type mappings and the scanner's declared
/// annotations. For class-reload scenarios; registered descriptors stay.
pub fn clear_caches() {
    clear_mappings_cache();
    annot_scan::clear_declared_cache();
}
