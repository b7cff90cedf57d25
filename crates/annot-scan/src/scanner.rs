//! Hierarchy scanner
//!
//! [`AnnotationsScanner`] walks an element's hierarchy according to a
//! [`SearchStrategy`] and feeds each visited aggregate (one level of the
//! hierarchy) to a caller-supplied processor that can short-circuit by
//! returning `Some`.
//!
//! Declared annotations are cached per (registry, element) after stripping
//! occurrences that are plain-filtered or not safely introspectable; the
//! stripped slots stay as `None` placeholders so indices remain stable.
//! Introspection failures are logged and the walk continues as if the
//! affected annotations were absent.

use crate::filter::AnnotationFilter;
use annot_model::{AnnotationDecl, AnnotationError, ClassDef, Element, TypeName, TypeRegistry};
use moka::sync::Cache;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;

/// How far a scan reaches into the element hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchStrategy {
    /// Only the element's own declared annotations
    Direct,

    /// Own annotations plus inherited superclass annotations (classes only),
    /// honoring subclass re-declaration shadowing
    InheritedAnnotations,

    /// Own plus all superclass declared annotations, no interfaces
    Superclass,

    /// Full walk: direct, interfaces (depth-first), superclass, and
    /// optionally enclosing classes
    TypeHierarchy,
}

type DeclaredSlots = Arc<Vec<Option<AnnotationDecl>>>;

/// Per-(registry, element) declared-annotations cache. Bounded; entries are
/// immutable so handing out the `Arc` is safe without defensive copying.
static DECLARED_CACHE: Lazy<Cache<(u64, Element), DeclaredSlots>> =
    Lazy::new(|| Cache::new(10_000));

/// Drop all cached declared annotations (all registries)
pub fn clear_declared_cache() {
    DECLARED_CACHE.invalidate_all();
}

/// Log an introspection failure and continue
///
/// Failures hit while searching for a specific named type are more visible
/// than failures during an unconstrained scan.
pub fn introspection_failure(context: &str, error: &AnnotationError, searching_for: Option<&TypeName>) {
    match searching_for {
        Some(type_name) => {
            tracing::warn!(context, %type_name, %error, "introspection failure while searching for annotation");
        }
        None => {
            tracing::debug!(context, %error, "introspection failure during annotation scan");
        }
    }
}

/// Predicate deciding whether to follow an enclosing-class link
pub type EnclosingPredicate = Arc<dyn Fn(&ClassDef) -> bool + Send + Sync>;

/// Strategy-driven walker over an element's hierarchy
pub struct AnnotationsScanner<'r> {
    registry: &'r TypeRegistry,
    enclosing: Option<EnclosingPredicate>,
}

impl<'r> AnnotationsScanner<'r> {
    /// Create a scanner over the given registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            enclosing: None,
        }
    }

    /// Follow enclosing-class links matching the predicate (only meaningful
    /// with [`SearchStrategy::TypeHierarchy`])
    #[must_use]
    pub fn with_enclosing(mut self, predicate: EnclosingPredicate) -> Self {
        self.enclosing = Some(predicate);
        self
    }

    /// Declared annotations for one element, cached, with plain-filtered and
    /// non-introspectable occurrences replaced by `None` placeholders.
    ///
    /// Bridge methods read through to their target, since their real
    /// annotations live on the bridged method.
    #[must_use]
    pub fn declared_annotations(&self, element: &Element) -> DeclaredSlots {
        let key = (self.registry.id(), element.clone());
        if let Some(cached) = DECLARED_CACHE.get(&key) {
            return cached;
        }
        // Unresolvable elements are not cached: a class registered after a
        // failed scan becomes visible to the next one.
        match self.compute_declared(element) {
            Some(slots) => {
                let computed = Arc::new(slots);
                DECLARED_CACHE.insert(key, Arc::clone(&computed));
                computed
            }
            None => Arc::new(Vec::new()),
        }
    }

    fn compute_declared(&self, element: &Element) -> Option<Vec<Option<AnnotationDecl>>> {
        let raw = match self.raw_declared(element) {
            Ok(raw) => raw,
            Err(error) => {
                introspection_failure(&element.to_string(), &error, None);
                return None;
            }
        };
        let plain = AnnotationFilter::plain();
        let slots = raw
            .into_iter()
            .map(|decl| {
                if plain.matches(&decl.type_name) {
                    return None;
                }
                match self.registry.attributes(&decl.type_name) {
                    Ok(table) if table.is_valid(&decl, self.registry) => Some(decl),
                    Ok(_) => {
                        let error = AnnotationError::introspection(
                            element.to_string(),
                            format!("occurrence of @{} is not introspectable", decl.type_name),
                        );
                        introspection_failure(&element.to_string(), &error, None);
                        None
                    }
                    Err(error) => {
                        introspection_failure(&element.to_string(), &error, None);
                        None
                    }
                }
            })
            .collect();
        Some(slots)
    }

    fn raw_declared(&self, element: &Element) -> Result<Vec<AnnotationDecl>, AnnotationError> {
        match element {
            Element::Class(_) => self.registry.declared_annotations(element),
            Element::Method(method_ref) => {
                let method = self.registry.resolve_method(element)?;
                match &method.bridge_target {
                    Some(target) => {
                        let class = self.registry.class(&method_ref.class).ok_or_else(|| {
                            AnnotationError::introspection(
                                method_ref.class.to_string(),
                                "class is not registered",
                            )
                        })?;
                        let bridged = class
                            .methods
                            .iter()
                            .find(|m| m.name == *target && !m.is_bridge());
                        Ok(bridged
                            .map(|m| m.annotations.clone())
                            .unwrap_or(method.annotations))
                    }
                    None => Ok(method.annotations),
                }
            }
        }
    }

    /// Early exit: true when scanning the element cannot yield anything.
    ///
    /// Bridge methods are never known-empty because their annotations live
    /// on the bridged target.
    #[must_use]
    pub fn is_known_empty(&self, element: &Element, strategy: SearchStrategy) -> bool {
        if let Element::Method(_) = element {
            if let Ok(method) = self.registry.resolve_method(element) {
                if method.is_bridge() {
                    return false;
                }
            }
        }
        let declared = self.declared_annotations(element);
        let no_annotations = declared.iter().all(Option::is_none);
        no_annotations
            && (strategy == SearchStrategy::Direct || self.is_without_hierarchy(element))
    }

    fn is_without_hierarchy(&self, element: &Element) -> bool {
        let Some(class) = self.registry.class(element.declaring_class()) else {
            return true;
        };
        class.superclass.is_none()
            && class.interfaces.is_empty()
            && (class.enclosing.is_none() || self.enclosing.is_none())
    }

    /// Walk the hierarchy, feeding each aggregate to `processor`; a `Some`
    /// return short-circuits the walk.
    pub fn scan<T, F>(&self, element: &Element, strategy: SearchStrategy, mut processor: F) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        match element {
            Element::Class(name) => self.scan_class(name, strategy, &mut processor),
            Element::Method(_) => self.scan_method(element, strategy, &mut processor),
        }
    }

    fn scan_class<T, F>(&self, name: &TypeName, strategy: SearchStrategy, processor: &mut F) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        match strategy {
            SearchStrategy::Direct => {
                let element = Element::Class(name.clone());
                let declared = self.declared_annotations(&element);
                processor(0, &element, &declared)
            }
            SearchStrategy::InheritedAnnotations => self.scan_inherited(name, processor),
            SearchStrategy::Superclass => self.scan_superclass_chain(name, processor),
            SearchStrategy::TypeHierarchy => {
                let mut aggregate = 0;
                let mut visited = HashSet::new();
                self.scan_type_hierarchy(name, &mut aggregate, true, &mut visited, processor)
            }
        }
    }

    /// Inherited-annotation walk: annotations re-declared on a subclass
    /// shadow the same type further up; superclass annotations only
    /// participate when their type is marked inherited.
    fn scan_inherited<T, F>(&self, name: &TypeName, processor: &mut F) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        let mut aggregate = 0;
        let mut shadowed: HashSet<TypeName> = HashSet::new();
        let mut current = Some(name.clone());

        while let Some(class_name) = current {
            if aggregate > 0 && is_plain_class(&class_name) {
                break;
            }
            let Some(class) = self.registry.class(&class_name) else {
                break;
            };
            let element = Element::Class(class_name.clone());
            let declared = self.declared_annotations(&element);

            let visible: Vec<Option<AnnotationDecl>> = declared
                .iter()
                .map(|slot| {
                    let decl = slot.as_ref()?;
                    if aggregate == 0 {
                        return Some(decl.clone());
                    }
                    if shadowed.contains(&decl.type_name) {
                        return None;
                    }
                    let inherited = self
                        .registry
                        .annotation_type(&decl.type_name)
                        .map(|def| def.inherited)
                        .unwrap_or(false);
                    inherited.then(|| decl.clone())
                })
                .collect();

            for decl in declared.iter().flatten() {
                shadowed.insert(decl.type_name.clone());
            }

            if let Some(result) = processor(aggregate, &element, &visible) {
                return Some(result);
            }
            aggregate += 1;
            current = class.superclass.clone();
        }
        None
    }

    fn scan_superclass_chain<T, F>(&self, name: &TypeName, processor: &mut F) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        let mut aggregate = 0;
        let mut current = Some(name.clone());
        while let Some(class_name) = current {
            if aggregate > 0 && is_plain_class(&class_name) {
                break;
            }
            let Some(class) = self.registry.class(&class_name) else {
                break;
            };
            let element = Element::Class(class_name.clone());
            let declared = self.declared_annotations(&element);
            if let Some(result) = processor(aggregate, &element, &declared) {
                return Some(result);
            }
            aggregate += 1;
            current = class.superclass.clone();
        }
        None
    }

    /// Full hierarchy walk: the element itself, then interfaces depth-first,
    /// then the superclass, then (when enabled) the enclosing class. The
    /// aggregate index increments once per level actually processed, not per
    /// interface branch.
    fn scan_type_hierarchy<T, F>(
        &self,
        name: &TypeName,
        aggregate: &mut usize,
        include_enclosing: bool,
        visited: &mut HashSet<TypeName>,
        processor: &mut F,
    ) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        if !visited.insert(name.clone()) || is_plain_class(name) {
            return None;
        }
        let Some(class) = self.registry.class(name) else {
            return None;
        };
        let element = Element::Class(name.clone());
        let declared = self.declared_annotations(&element);
        if let Some(result) = processor(*aggregate, &element, &declared) {
            return Some(result);
        }
        *aggregate += 1;

        for interface in &class.interfaces {
            if let Some(result) =
                self.scan_type_hierarchy(interface, aggregate, include_enclosing, visited, processor)
            {
                return Some(result);
            }
        }
        if let Some(superclass) = &class.superclass {
            if let Some(result) =
                self.scan_type_hierarchy(superclass, aggregate, include_enclosing, visited, processor)
            {
                return Some(result);
            }
        }
        if include_enclosing {
            if let (Some(enclosing), Some(predicate)) = (&class.enclosing, &self.enclosing) {
                if let Some(enclosing_class) = self.registry.class(enclosing) {
                    if predicate(&enclosing_class) {
                        if let Some(result) = self.scan_type_hierarchy(
                            enclosing,
                            aggregate,
                            include_enclosing,
                            visited,
                            processor,
                        ) {
                            return Some(result);
                        }
                    }
                }
            }
        }
        None
    }

    fn scan_method<T, F>(&self, element: &Element, strategy: SearchStrategy, processor: &mut F) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        let declared = self.declared_annotations(element);
        if let Some(result) = processor(0, element, &declared) {
            return Some(result);
        }
        if matches!(
            strategy,
            SearchStrategy::Direct | SearchStrategy::InheritedAnnotations
        ) {
            return None;
        }

        let method = match self.registry.resolve_method(element) {
            Ok(method) => method,
            Err(error) => {
                introspection_failure(&element.to_string(), &error, None);
                return None;
            }
        };
        // Private methods cannot be legally overridden.
        if method.private {
            return None;
        }

        let Element::Method(method_ref) = element else {
            return None;
        };
        let Some(root_class) = self.registry.class(&method_ref.class) else {
            return None;
        };

        let mut aggregate = 1;
        let mut visited = HashSet::new();
        visited.insert(method_ref.class.clone());
        match strategy {
            SearchStrategy::Superclass => {
                let mut current = root_class.superclass.clone();
                while let Some(class_name) = current {
                    if is_plain_class(&class_name) {
                        break;
                    }
                    let Some(class) = self.registry.class(&class_name) else {
                        break;
                    };
                    if let Some(result) = self.process_overridden(
                        &class,
                        method_ref,
                        &mut aggregate,
                        processor,
                    ) {
                        return Some(result);
                    }
                    current = class.superclass.clone();
                }
                None
            }
            SearchStrategy::TypeHierarchy => self.scan_method_hierarchy(
                &root_class,
                method_ref,
                &mut aggregate,
                &mut visited,
                processor,
            ),
            _ => None,
        }
    }

    fn scan_method_hierarchy<T, F>(
        &self,
        class: &ClassDef,
        method_ref: &annot_model::MethodRef,
        aggregate: &mut usize,
        visited: &mut HashSet<TypeName>,
        processor: &mut F,
    ) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        for interface in &class.interfaces {
            if let Some(result) =
                self.visit_method_level(interface, method_ref, aggregate, visited, processor)
            {
                return Some(result);
            }
        }
        if let Some(superclass) = &class.superclass {
            if let Some(result) =
                self.visit_method_level(superclass, method_ref, aggregate, visited, processor)
            {
                return Some(result);
            }
        }
        None
    }

    fn visit_method_level<T, F>(
        &self,
        class_name: &TypeName,
        method_ref: &annot_model::MethodRef,
        aggregate: &mut usize,
        visited: &mut HashSet<TypeName>,
        processor: &mut F,
    ) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        if !visited.insert(class_name.clone()) || is_plain_class(class_name) {
            return None;
        }
        let Some(class) = self.registry.class(class_name) else {
            return None;
        };
        if let Some(result) = self.process_overridden(&class, method_ref, aggregate, processor) {
            return Some(result);
        }
        self.scan_method_hierarchy(&class, method_ref, aggregate, visited, processor)
    }

    /// Overridden-method candidates on one ancestor class: matching name and
    /// parameter types contribute their annotations at this aggregate level.
    fn process_overridden<T, F>(
        &self,
        class: &ClassDef,
        method_ref: &annot_model::MethodRef,
        aggregate: &mut usize,
        processor: &mut F,
    ) -> Option<T>
    where
        F: FnMut(usize, &Element, &[Option<AnnotationDecl>]) -> Option<T>,
    {
        let matching: Vec<&annot_model::MethodDef> = class
            .methods
            .iter()
            .filter(|m| m.name == method_ref.name && m.param_types == method_ref.param_types)
            .collect();
        if matching.is_empty() {
            return None;
        }

        let mut combined: Vec<Option<AnnotationDecl>> = Vec::new();
        let mut level_element = None;
        for method in matching {
            let element = Element::Method(annot_model::MethodRef::new(
                class.name.clone(),
                method.name.clone(),
                method.param_types.clone(),
            ));
            let declared = self.declared_annotations(&element);
            combined.extend(declared.iter().cloned());
            level_element = Some(element);
        }
        let element = level_element?;
        let result = processor(*aggregate, &element, &combined);
        *aggregate += 1;
        result
    }
}

fn is_plain_class(name: &TypeName) -> bool {
    name.in_package("lang")
}
