//! Repeatable-container strategies
//!
//! A container annotation exists only to wrap an array of another
//! annotation type so that type can occur more than once on one element.
//! [`RepeatableContainers`] decides whether a given occurrence is such a
//! container and, if so, unwraps the repeated occurrences.

use annot_model::{AnnotationDecl, AnnotationError, TypeName, TypeRegistry, Value, ValueKind, VALUE};

/// Strategy for locating repeated annotations inside container annotations
///
/// `standard()` follows the declaration convention: the repeated type names
/// its container, and the container holds the array in its single `value`
/// attribute. Explicit pairs can be added with [`RepeatableContainers::and`]
/// and are consulted before the standard convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatableContainers {
    standard: bool,
    pairs: Vec<(TypeName, TypeName)>,
}

/// Cache-key form of the two shareable singleton strategies
///
/// Custom explicit strategies are not guaranteed stable and are never used
/// as cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainersCacheKey {
    /// The `standard()` strategy
    Standard,
    /// The `none()` strategy
    None,
}

impl RepeatableContainers {
    /// Standard `@Repeatable`-convention strategy
    #[inline]
    #[must_use]
    pub fn standard() -> Self {
        Self {
            standard: true,
            pairs: Vec::new(),
        }
    }

    /// Strategy that never unwraps containers
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            standard: false,
            pairs: Vec::new(),
        }
    }

    /// Explicit single (container, repeated) pair, no standard fallback
    #[must_use]
    pub fn of(container: impl Into<TypeName>, repeated: impl Into<TypeName>) -> Self {
        Self {
            standard: false,
            pairs: vec![(container.into(), repeated.into())],
        }
    }

    /// Add an explicit (container, repeated) pair
    #[must_use]
    pub fn and(mut self, container: impl Into<TypeName>, repeated: impl Into<TypeName>) -> Self {
        self.pairs.push((container.into(), repeated.into()));
        self
    }

    /// Cache-key form, if this is one of the shareable singletons
    #[must_use]
    pub fn cache_key(&self) -> Option<ContainersCacheKey> {
        if !self.pairs.is_empty() {
            return None;
        }
        Some(if self.standard {
            ContainersCacheKey::Standard
        } else {
            ContainersCacheKey::None
        })
    }

    /// If `decl` is a container per this strategy, unwrap the repeated
    /// occurrences in declaration order; `None` when it is not a container.
    ///
    /// # Errors
    /// Configuration error when an explicit pair names a container whose
    /// `value` attribute does not hold an array of the repeated type.
    pub fn find_repeated(
        &self,
        decl: &AnnotationDecl,
        registry: &TypeRegistry,
    ) -> Result<Option<Vec<AnnotationDecl>>, AnnotationError> {
        for (container, repeated) in &self.pairs {
            if decl.type_name == *container {
                return self.unwrap_container(decl, container, repeated, registry).map(Some);
            }
        }
        if self.standard {
            if let Some(repeated) = self.standard_repeated_type(&decl.type_name, registry) {
                return self
                    .unwrap_container(decl, &decl.type_name, &repeated, registry)
                    .map(Some);
            }
        }
        Ok(None)
    }

    /// Repeated element type, if `container` is a standard-convention
    /// container: its `value` attribute is an annotation array whose element
    /// type declares this container.
    fn standard_repeated_type(
        &self,
        container: &TypeName,
        registry: &TypeRegistry,
    ) -> Option<TypeName> {
        let def = registry.annotation_type(container)?;
        let value_attr = def.attribute_by_name(VALUE)?;
        let ValueKind::Array(elem) = &value_attr.kind else {
            return None;
        };
        let ValueKind::Annotation(repeated) = elem.as_ref() else {
            return None;
        };
        let repeated_def = registry.annotation_type(repeated)?;
        (repeated_def.repeatable.as_ref() == Some(container)).then(|| repeated.clone())
    }

    fn unwrap_container(
        &self,
        decl: &AnnotationDecl,
        container: &TypeName,
        repeated: &TypeName,
        registry: &TypeRegistry,
    ) -> Result<Vec<AnnotationDecl>, AnnotationError> {
        let values = match decl.get(VALUE) {
            Some(Value::Array(values)) => values.clone(),
            Some(other) => {
                return Err(AnnotationError::configuration(
                    container.clone(),
                    format!("container `value` must be an annotation array, found {other}"),
                ))
            }
            None => match registry
                .annotation_type(container)
                .and_then(|def| def.attribute_by_name(VALUE).cloned())
                .and_then(|attr| attr.default_value)
            {
                Some(Value::Array(values)) => values,
                _ => Vec::new(),
            },
        };

        let mut repeated_decls = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::Annotation(inner) if inner.type_name == *repeated => {
                    repeated_decls.push(*inner);
                }
                other => {
                    return Err(AnnotationError::configuration(
                        container.clone(),
                        format!("container element is not @{repeated}: {other}"),
                    ))
                }
            }
        }
        Ok(repeated_decls)
    }
}

impl Default for RepeatableContainers {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annot_model::{AnnotationTypeDef, AttributeDef};
    use annot_test_utils::tag_registry;
    use pretty_assertions::assert_eq;

    fn tags_decl() -> AnnotationDecl {
        annot_test_utils::tags_decl(["x", "y"])
    }

    #[test]
    fn standard_unwraps_declared_container() {
        let registry = tag_registry();
        let repeated = RepeatableContainers::standard()
            .find_repeated(&tags_decl(), &registry)
            .unwrap()
            .unwrap();

        assert_eq!(repeated.len(), 2);
        assert_eq!(repeated[0].get("value"), Some(&Value::string("x")));
        assert_eq!(repeated[1].get("value"), Some(&Value::string("y")));
    }

    #[test]
    fn none_never_unwraps() {
        let registry = tag_registry();
        let result = RepeatableContainers::none()
            .find_repeated(&tags_decl(), &registry)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn standard_ignores_non_containers() {
        let registry = tag_registry();
        let decl = AnnotationDecl::new("test.Tag").set("value", Value::string("x"));
        let result = RepeatableContainers::standard()
            .find_repeated(&decl, &registry)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn explicit_pair_without_standard_convention() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(AnnotationTypeDef::new("t.Item"))
            .unwrap();
        registry
            .register_annotation(AnnotationTypeDef::new("t.Items").attribute(
                AttributeDef::new(
                    "value",
                    ValueKind::Annotation(TypeName::new("t.Item")).array_of(),
                ),
            ))
            .unwrap();

        let decl = AnnotationDecl::new("t.Items").set(
            "value",
            Value::Array(vec![Value::annotation(AnnotationDecl::new("t.Item"))]),
        );

        // Standard alone does not unwrap: t.Item never declared a container.
        let standard = RepeatableContainers::standard()
            .find_repeated(&decl, &registry)
            .unwrap();
        assert!(standard.is_none());

        let explicit = RepeatableContainers::of("t.Items", "t.Item")
            .find_repeated(&decl, &registry)
            .unwrap()
            .unwrap();
        assert_eq!(explicit.len(), 1);
    }

    #[test]
    fn mismatched_element_type_is_configuration_error() {
        let registry = tag_registry();
        let decl = AnnotationDecl::new("test.Tags").set(
            "value",
            Value::Array(vec![Value::annotation(AnnotationDecl::new("test.Other"))]),
        );
        let err = RepeatableContainers::standard()
            .find_repeated(&decl, &registry)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn unset_value_falls_back_to_default() {
        let registry = tag_registry();
        let decl = AnnotationDecl::new("test.Tags");
        let repeated = RepeatableContainers::standard()
            .find_repeated(&decl, &registry)
            .unwrap()
            .unwrap();
        assert!(repeated.is_empty());
    }

    #[test]
    fn only_singletons_have_cache_keys() {
        assert_eq!(
            RepeatableContainers::standard().cache_key(),
            Some(ContainersCacheKey::Standard)
        );
        assert_eq!(
            RepeatableContainers::none().cache_key(),
            Some(ContainersCacheKey::None)
        );
        assert_eq!(RepeatableContainers::of("a.C", "a.R").cache_key(), None);
        assert_eq!(
            RepeatableContainers::standard().and("a.C", "a.R").cache_key(),
            None
        );
    }
}
