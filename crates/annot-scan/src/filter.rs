//! Annotation type filters
//!
//! An [`AnnotationFilter`] decides which annotation type names are excluded
//! from traversal, bounding the search space. A match means "filtered out".
//! The built-in [`AnnotationFilter::plain`] excludes the `lang.`
//! infrastructure namespace that carries no mergeable semantics.

use annot_model::TypeName;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

type Predicate = dyn Fn(&str) -> bool + Send + Sync;

/// Predicate over annotation type names; matching names are excluded
#[derive(Clone)]
pub enum AnnotationFilter {
    /// Excludes the language infrastructure namespace (`lang.*`)
    Plain,

    /// Excludes nothing
    None,

    /// Excludes everything
    All,

    /// Excludes names under any of the given package prefixes
    Packages(Arc<[String]>),

    /// Custom predicate; compared and hashed by pointer identity
    Custom(Arc<Predicate>),
}

impl AnnotationFilter {
    /// The default filter: excludes `lang.*`
    #[inline]
    #[must_use]
    pub fn plain() -> Self {
        Self::Plain
    }

    /// Filter that excludes nothing
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::None
    }

    /// Filter that excludes everything
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::All
    }

    /// Filter excluding the given package prefixes (segment-aware)
    #[must_use]
    pub fn packages<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Packages(prefixes.into_iter().map(Into::into).collect())
    }

    /// Filter from a custom predicate over the qualified type name
    #[must_use]
    pub fn custom(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Whether the type name is filtered out
    #[must_use]
    pub fn matches(&self, type_name: &TypeName) -> bool {
        match self {
            Self::Plain => type_name.in_package("lang"),
            Self::None => false,
            Self::All => true,
            Self::Packages(prefixes) => prefixes
                .iter()
                .any(|p| type_name.in_package(p) || type_name.as_str() == p),
            Self::Custom(predicate) => predicate(type_name.as_str()),
        }
    }
}

impl Default for AnnotationFilter {
    fn default() -> Self {
        Self::Plain
    }
}

impl Debug for AnnotationFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("AnnotationFilter::Plain"),
            Self::None => f.write_str("AnnotationFilter::None"),
            Self::All => f.write_str("AnnotationFilter::All"),
            Self::Packages(prefixes) => write!(f, "AnnotationFilter::Packages({prefixes:?})"),
            Self::Custom(_) => f.write_str("AnnotationFilter::Custom(..)"),
        }
    }
}

impl PartialEq for AnnotationFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain, Self::Plain) | (Self::None, Self::None) | (Self::All, Self::All) => true,
            (Self::Packages(a), Self::Packages(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for AnnotationFilter {}

impl Hash for AnnotationFilter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Plain | Self::None | Self::All => {}
            Self::Packages(prefixes) => prefixes.hash(state),
            Self::Custom(predicate) => std::ptr::hash(Arc::as_ptr(predicate), state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_excludes_lang_namespace() {
        let filter = AnnotationFilter::plain();
        assert!(filter.matches(&TypeName::new("lang.Deprecated")));
        assert!(!filter.matches(&TypeName::new("web.Post")));
        assert!(!filter.matches(&TypeName::new("language.X")));
    }

    #[test]
    fn none_and_all() {
        assert!(!AnnotationFilter::none().matches(&TypeName::new("lang.Deprecated")));
        assert!(AnnotationFilter::all().matches(&TypeName::new("web.Post")));
    }

    #[test]
    fn packages_filter_is_segment_aware() {
        let filter = AnnotationFilter::packages(["web.bind"]);
        assert!(filter.matches(&TypeName::new("web.bind.Post")));
        assert!(!filter.matches(&TypeName::new("web.binding.Post")));
    }

    #[test]
    fn custom_filter_compares_by_identity() {
        let a = AnnotationFilter::custom(|name| name.ends_with("Internal"));
        let b = a.clone();
        let c = AnnotationFilter::custom(|name| name.ends_with("Internal"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.matches(&TypeName::new("app.SomethingInternal")));
    }

    #[test]
    fn filters_usable_as_map_keys() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(AnnotationFilter::plain(), 1);
        map.insert(AnnotationFilter::packages(["lang"]), 2);
        assert_eq!(map.get(&AnnotationFilter::plain()), Some(&1));
    }
}
