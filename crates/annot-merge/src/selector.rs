//! Selection policies for competing merged annotations
//!
//! When the same annotation type is found more than once in scope, a
//! selector decides which occurrence a `get` call returns.

use crate::mapped::MergedAnnotation;

/// Tie-break policy between an already-selected annotation and a new
/// candidate, both of the requested type
pub trait AnnotationSelector {
    /// Pick one of the two views; candidates arrive in scan order
    /// (aggregate ascending, distance ascending)
    fn select<'c, 'r>(
        &self,
        existing: &'c MergedAnnotation<'r>,
        candidate: &'c MergedAnnotation<'r>,
    ) -> &'c MergedAnnotation<'r>;
}

/// Default policy: lowest distance wins, earlier aggregate breaks ties
#[derive(Debug, Clone, Copy, Default)]
pub struct Nearest;

impl AnnotationSelector for Nearest {
    fn select<'c, 'r>(
        &self,
        existing: &'c MergedAnnotation<'r>,
        candidate: &'c MergedAnnotation<'r>,
    ) -> &'c MergedAnnotation<'r> {
        if candidate.distance() < existing.distance() {
            candidate
        } else {
            existing
        }
    }
}

/// Prefers the first directly declared occurrence, falling back to the
/// first seen when none is direct
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstDirectlyDeclared;

impl AnnotationSelector for FirstDirectlyDeclared {
    fn select<'c, 'r>(
        &self,
        existing: &'c MergedAnnotation<'r>,
        candidate: &'c MergedAnnotation<'r>,
    ) -> &'c MergedAnnotation<'r> {
        if !existing.is_direct_present() && candidate.is_direct_present() {
            candidate
        } else {
            existing
        }
    }
}
