//! The merged-annotations façade
//!
//! [`MergedAnnotations`] drives the scanner and mapping pipeline over a
//! source element and exposes presence checks, selector-driven lookup and
//! ordered streaming. Searches are configured through the
//! [`MergedAnnotations::search`] builder; [`MergedAnnotations::of`] wraps a
//! pre-collected set of direct annotations instead of scanning.

use crate::collection::{Aggregate, MergedIter};
use crate::mapped::MergedAnnotation;
use crate::mappings::AnnotationTypeMappings;
use crate::selector::{AnnotationSelector, Nearest};
use annot_model::{AnnotationDecl, AnnotationError, Element, TypeName, TypeRegistry};
use annot_scan::{
    introspection_failure, AnnotationFilter, AnnotationsScanner, EnclosingPredicate,
    RepeatableContainers, SearchStrategy,
};

/// Search configuration builder
pub struct Search {
    strategy: SearchStrategy,
    containers: RepeatableContainers,
    filter: AnnotationFilter,
    enclosing: Option<EnclosingPredicate>,
}

impl Search {
    /// Use a repeatable-container strategy other than the standard one
    #[must_use]
    pub fn with_containers(mut self, containers: RepeatableContainers) -> Self {
        self.containers = containers;
        self
    }

    /// Use an annotation filter other than the plain default
    #[must_use]
    pub fn with_filter(mut self, filter: AnnotationFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Follow enclosing-class links matching the predicate (only meaningful
    /// with [`SearchStrategy::TypeHierarchy`])
    #[must_use]
    pub fn with_enclosing(mut self, predicate: EnclosingPredicate) -> Self {
        self.enclosing = Some(predicate);
        self
    }

    /// Run the configured search over an element
    #[must_use]
    pub fn from<'r>(self, registry: &'r TypeRegistry, element: &Element) -> MergedAnnotations<'r> {
        let mut scanner = AnnotationsScanner::new(registry);
        if let Some(predicate) = self.enclosing.clone() {
            scanner = scanner.with_enclosing(predicate);
        }
        if scanner.is_known_empty(element, self.strategy) {
            return MergedAnnotations {
                registry,
                aggregates: Vec::new(),
                failures: Vec::new(),
            };
        }

        let mut aggregates = Vec::new();
        let mut failures = Vec::new();
        scanner.scan::<(), _>(element, self.strategy, |aggregate, declaring, decls| {
            let mut expanded: Vec<AnnotationDecl> = Vec::new();
            for decl in decls.iter().flatten() {
                if self.filter.matches(&decl.type_name) {
                    continue;
                }
                expanded.push(decl.clone());
                match self.containers.find_repeated(decl, registry) {
                    Ok(Some(repeated)) => expanded.extend(repeated),
                    Ok(None) => {}
                    Err(error) => {
                        introspection_failure(&declaring.to_string(), &error, None);
                    }
                }
            }

            let mut entries = Vec::with_capacity(expanded.len());
            for decl in expanded {
                match AnnotationTypeMappings::for_type(
                    registry,
                    &decl.type_name,
                    &self.containers,
                    &self.filter,
                ) {
                    Ok(mappings) => entries.push((decl, mappings)),
                    Err(error) => {
                        introspection_failure(&declaring.to_string(), &error, None);
                        failures.push((decl.type_name, declaring.to_string(), error));
                    }
                }
            }
            if !entries.is_empty() {
                aggregates.push(Aggregate::new(aggregate, entries));
            }
            None
        });

        MergedAnnotations {
            registry,
            aggregates,
            failures,
        }
    }
}

/// All merged annotations discovered in one scan
pub struct MergedAnnotations<'r> {
    registry: &'r TypeRegistry,
    aggregates: Vec<Aggregate>,
    // Types whose mappings could not be built, kept so a later typed
    // lookup can report the failure at warn level.
    failures: Vec<(TypeName, String, AnnotationError)>,
}

impl<'r> MergedAnnotations<'r> {
    /// Direct-only scan of an element with default configuration
    #[must_use]
    pub fn from(registry: &'r TypeRegistry, element: &Element) -> Self {
        Self::search(SearchStrategy::Direct).from(registry, element)
    }

    /// Configure a search with the given strategy
    #[must_use]
    pub fn search(strategy: SearchStrategy) -> Search {
        Search {
            strategy,
            containers: RepeatableContainers::standard(),
            filter: AnnotationFilter::plain(),
            enclosing: None,
        }
    }

    /// Wrap a pre-collected set of direct annotations (one aggregate,
    /// index 0); containers are unwrapped, the plain filter applies
    #[must_use]
    pub fn of(
        registry: &'r TypeRegistry,
        decls: impl IntoIterator<Item = AnnotationDecl>,
    ) -> Self {
        let containers = RepeatableContainers::standard();
        let filter = AnnotationFilter::plain();
        let mut expanded: Vec<AnnotationDecl> = Vec::new();
        for decl in decls {
            if filter.matches(&decl.type_name) {
                continue;
            }
            expanded.push(decl.clone());
            match containers.find_repeated(&decl, registry) {
                Ok(Some(repeated)) => expanded.extend(repeated),
                Ok(None) => {}
                Err(error) => introspection_failure("collection", &error, None),
            }
        }
        let mut entries = Vec::with_capacity(expanded.len());
        let mut failures = Vec::new();
        for decl in expanded {
            match AnnotationTypeMappings::for_type(registry, &decl.type_name, &containers, &filter)
            {
                Ok(mappings) => entries.push((decl, mappings)),
                Err(error) => {
                    introspection_failure("collection", &error, None);
                    failures.push((decl.type_name, String::from("collection"), error));
                }
            }
        }
        let aggregates = if entries.is_empty() {
            Vec::new()
        } else {
            vec![Aggregate::new(0, entries)]
        };
        Self {
            registry,
            aggregates,
            failures,
        }
    }

    /// Whether no annotations were found at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    /// Whether the type is present, directly or as a meta-annotation
    #[must_use]
    pub fn is_present(&self, annotation_type: impl Into<TypeName>) -> bool {
        let requested = annotation_type.into();
        self.aggregates.iter().any(|agg| {
            agg.entries
                .iter()
                .any(|(_, mappings)| mappings.indices_of(&requested).next().is_some())
        })
    }

    /// Whether the type is directly declared somewhere in scope
    #[must_use]
    pub fn is_direct_present(&self, annotation_type: impl Into<TypeName>) -> bool {
        let requested = annotation_type.into();
        self.aggregates.iter().any(|agg| {
            agg.entries
                .iter()
                .any(|(decl, _)| decl.type_name == requested)
        })
    }

    /// The nearest merged view of the requested type, or the missing
    /// sentinel
    #[must_use]
    pub fn get(&self, annotation_type: impl Into<TypeName>) -> MergedAnnotation<'r> {
        self.get_with(annotation_type, None, &Nearest)
    }

    /// Lookup with an optional predicate and an explicit selection policy
    #[must_use]
    pub fn get_with(
        &self,
        annotation_type: impl Into<TypeName>,
        predicate: Option<&dyn Fn(&MergedAnnotation<'r>) -> bool>,
        selector: &dyn AnnotationSelector,
    ) -> MergedAnnotation<'r> {
        let requested = annotation_type.into();
        let mut selected: Option<MergedAnnotation<'r>> = None;
        for candidate in self.stream_of(requested.clone()) {
            if let Some(predicate) = predicate {
                if !predicate(&candidate) {
                    continue;
                }
            }
            selected = Some(match selected {
                None => candidate,
                Some(existing) => {
                    if std::ptr::eq(selector.select(&existing, &candidate), &candidate) {
                        candidate
                    } else {
                        existing
                    }
                }
            });
        }
        selected.unwrap_or_else(|| {
            for (failed, context, error) in &self.failures {
                if *failed == requested {
                    introspection_failure(context, error, Some(&requested));
                }
            }
            MergedAnnotation::missing(requested)
        })
    }

    /// All merged annotations, ordered by aggregate index then distance
    pub fn stream(&self) -> impl Iterator<Item = MergedAnnotation<'r>> + '_ {
        MergedIter::new(self.registry, &self.aggregates)
    }

    /// Merged annotations of one type, in stream order
    pub fn stream_of(
        &self,
        annotation_type: impl Into<TypeName>,
    ) -> impl Iterator<Item = MergedAnnotation<'r>> + '_ {
        let requested = annotation_type.into();
        self.stream()
            .filter(move |candidate| *candidate.annotation_type() == requested)
    }
}
