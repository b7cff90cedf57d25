//! Per-instance merged annotation views
//!
//! A [`MergedAnnotation`] binds one concrete root occurrence to one type
//! mapping and resolves attribute values through aliases, conventions and
//! mirror sets. Views are cheap value objects; mirror resolution happens
//! once at construction, synthesis is cached per instance.
//!
//! The "missing" sentinel stands in for an absent annotation: `is_present`
//! answers false and every value accessor fails with a typed error instead
//! of panicking or silently returning defaults.

use crate::mappings::AnnotationTypeMappings;
use crate::synthesized::SynthesizedAnnotation;
use annot_model::{
    AnnotationDecl, AnnotationError, EnumValue, TypeName, TypeRegistry, Value,
};
use annot_scan::{AnnotationFilter, RepeatableContainers};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Attribute projection options for [`MergedAnnotation::as_map`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adapt {
    /// Render type references as their qualified name strings
    TypeToString,
    /// Recursively project nested annotations into fully resolved maps
    AnnotationToMap,
}

#[derive(Debug, Clone)]
struct Present<'r> {
    registry: &'r TypeRegistry,
    mappings: Arc<AnnotationTypeMappings>,
    mapping_index: usize,
    root_decl: AnnotationDecl,
    aggregate: usize,
    merged: bool,
    resolved_root_mirrors: Vec<usize>,
    resolved_mirrors: Vec<usize>,
    synthesized: OnceCell<Arc<SynthesizedAnnotation>>,
}

#[derive(Debug, Clone)]
enum State<'r> {
    Missing(TypeName),
    Present(Box<Present<'r>>),
}

/// A read-only merged view of one annotation occurrence
#[derive(Debug, Clone)]
pub struct MergedAnnotation<'r> {
    state: State<'r>,
}

impl<'r> MergedAnnotation<'r> {
    pub(crate) fn mapped(
        registry: &'r TypeRegistry,
        mappings: Arc<AnnotationTypeMappings>,
        mapping_index: usize,
        root_decl: AnnotationDecl,
        aggregate: usize,
    ) -> Self {
        let resolved_root_mirrors = mappings.root().resolve_mirrors(&root_decl);
        let mapping = mappings.get(mapping_index);
        let resolved_mirrors = match mapping.meta_declaration() {
            Some(meta) if mapping_index != 0 => mapping.resolve_mirrors(meta),
            _ => resolved_root_mirrors.clone(),
        };
        Self {
            state: State::Present(Box::new(Present {
                registry,
                mappings,
                mapping_index,
                root_decl,
                aggregate,
                merged: true,
                resolved_root_mirrors,
                resolved_mirrors,
                synthesized: OnceCell::new(),
            })),
        }
    }

    /// The sentinel for an annotation that was not found
    #[must_use]
    pub fn missing(annotation_type: impl Into<TypeName>) -> Self {
        Self {
            state: State::Missing(annotation_type.into()),
        }
    }

    /// Whether the annotation was found
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        matches!(self.state, State::Present(_))
    }

    /// Whether this is the missing sentinel
    #[inline]
    #[must_use]
    pub fn is_missing(&self) -> bool {
        !self.is_present()
    }

    /// The annotation type of this view (the requested type for the missing
    /// sentinel)
    #[must_use]
    pub fn annotation_type(&self) -> &TypeName {
        match &self.state {
            State::Missing(requested) => requested,
            State::Present(p) => p.mappings.get(p.mapping_index).annotation_type(),
        }
    }

    /// The type of the root occurrence this view was derived from
    #[must_use]
    pub fn root_type(&self) -> Option<&TypeName> {
        match &self.state {
            State::Missing(_) => None,
            State::Present(p) => Some(&p.root_decl.type_name),
        }
    }

    /// Meta-annotation hops from the root occurrence; 0 when the annotation
    /// was directly declared
    #[must_use]
    pub fn distance(&self) -> Option<usize> {
        match &self.state {
            State::Missing(_) => None,
            State::Present(p) => Some(p.mappings.get(p.mapping_index).distance()),
        }
    }

    /// Hierarchy level the root occurrence was found at
    #[must_use]
    pub fn aggregate_index(&self) -> Option<usize> {
        match &self.state {
            State::Missing(_) => None,
            State::Present(p) => Some(p.aggregate),
        }
    }

    /// Whether the annotation is directly declared (distance 0)
    #[inline]
    #[must_use]
    pub fn is_direct_present(&self) -> bool {
        self.distance() == Some(0)
    }

    /// Whether the annotation is only meta-present (distance > 0)
    #[inline]
    #[must_use]
    pub fn is_meta_present(&self) -> bool {
        matches!(self.distance(), Some(d) if d > 0)
    }

    /// Whether synthesis produces values different from the raw occurrence
    #[must_use]
    pub fn is_synthesizable(&self) -> bool {
        match &self.state {
            State::Missing(_) => false,
            State::Present(p) => p.mappings.get(p.mapping_index).is_synthesizable(),
        }
    }

    /// A view that reads attribute values without alias or convention
    /// redirection to the root (mirror sets still apply)
    #[must_use]
    pub fn with_non_merged_attributes(self) -> Self {
        match self.state {
            State::Missing(requested) => Self {
                state: State::Missing(requested),
            },
            State::Present(mut p) => {
                p.merged = false;
                p.synthesized = OnceCell::new();
                Self {
                    state: State::Present(p),
                }
            }
        }
    }

    /// Whether the annotation type declares the attribute
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        match &self.state {
            State::Missing(_) => false,
            State::Present(p) => p
                .mappings
                .get(p.mapping_index)
                .attributes()
                .index_of(name)
                .is_some(),
        }
    }

    /// Declared default of an attribute, if any
    #[must_use]
    pub fn default_value(&self, name: &str) -> Option<Value> {
        let State::Present(p) = &self.state else {
            return None;
        };
        let attributes = p.mappings.get(p.mapping_index).attributes();
        let index = attributes.index_of(name)?;
        attributes.get(index).default_value.clone()
    }

    /// Fully resolved value of an attribute
    ///
    /// # Errors
    /// [`AnnotationError::Missing`] on the sentinel,
    /// [`AnnotationError::NoSuchAttribute`] for an unknown attribute.
    pub fn value(&self, name: &str) -> Result<Value, AnnotationError> {
        let p = self.present()?;
        let mapping = p.mappings.get(p.mapping_index);
        let index = mapping.attributes().index_of(name).ok_or_else(|| {
            AnnotationError::NoSuchAttribute {
                annotation: mapping.annotation_type().clone(),
                attribute: name.to_string(),
            }
        })?;
        self.resolve_index(p, index)
    }

    /// String value, adapting type references and length-1 arrays
    pub fn get_string(&self, name: &str) -> Result<String, AnnotationError> {
        let value = self.value(name)?;
        adapt_string(self.annotation_type(), name, value)
    }

    /// String-array value, adapting scalars to length-1 arrays
    pub fn get_string_array(&self, name: &str) -> Result<Vec<String>, AnnotationError> {
        let annotation = self.annotation_type().clone();
        let items = into_array(self.value(name)?);
        items
            .into_iter()
            .map(|v| adapt_string(&annotation, name, v))
            .collect()
    }

    /// Boolean value
    pub fn get_bool(&self, name: &str) -> Result<bool, AnnotationError> {
        match unwrap_single(self.value(name)?) {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch(self.annotation_type(), name, "bool", &other)),
        }
    }

    /// Boolean-array value
    pub fn get_bool_array(&self, name: &str) -> Result<Vec<bool>, AnnotationError> {
        into_array(self.value(name)?)
            .into_iter()
            .map(|v| match v {
                Value::Bool(b) => Ok(b),
                other => Err(mismatch(self.annotation_type(), name, "bool", &other)),
            })
            .collect()
    }

    /// Integer value
    pub fn get_int(&self, name: &str) -> Result<i64, AnnotationError> {
        match unwrap_single(self.value(name)?) {
            Value::Int(i) => Ok(i),
            other => Err(mismatch(self.annotation_type(), name, "int", &other)),
        }
    }

    /// Integer-array value
    pub fn get_int_array(&self, name: &str) -> Result<Vec<i64>, AnnotationError> {
        into_array(self.value(name)?)
            .into_iter()
            .map(|v| match v {
                Value::Int(i) => Ok(i),
                other => Err(mismatch(self.annotation_type(), name, "int", &other)),
            })
            .collect()
    }

    /// Floating-point value
    pub fn get_float(&self, name: &str) -> Result<f64, AnnotationError> {
        match unwrap_single(self.value(name)?) {
            Value::Float(f) => Ok(f),
            other => Err(mismatch(self.annotation_type(), name, "float", &other)),
        }
    }

    /// Float-array value
    pub fn get_float_array(&self, name: &str) -> Result<Vec<f64>, AnnotationError> {
        into_array(self.value(name)?)
            .into_iter()
            .map(|v| match v {
                Value::Float(f) => Ok(f),
                other => Err(mismatch(self.annotation_type(), name, "float", &other)),
            })
            .collect()
    }

    /// Enum constant value
    pub fn get_enum(&self, name: &str) -> Result<EnumValue, AnnotationError> {
        match unwrap_single(self.value(name)?) {
            Value::Enum(e) => Ok(e),
            other => Err(mismatch(self.annotation_type(), name, "enum", &other)),
        }
    }

    /// Enum-constant-array value
    pub fn get_enum_array(&self, name: &str) -> Result<Vec<EnumValue>, AnnotationError> {
        into_array(self.value(name)?)
            .into_iter()
            .map(|v| match v {
                Value::Enum(e) => Ok(e),
                other => Err(mismatch(self.annotation_type(), name, "enum", &other)),
            })
            .collect()
    }

    /// Type-reference value, adapting name strings
    pub fn get_type(&self, name: &str) -> Result<TypeName, AnnotationError> {
        match unwrap_single(self.value(name)?) {
            Value::Type(t) => Ok(t),
            Value::Str(s) => Ok(TypeName::new(s)),
            other => Err(mismatch(self.annotation_type(), name, "type", &other)),
        }
    }

    /// Type-reference-array value
    pub fn get_type_array(&self, name: &str) -> Result<Vec<TypeName>, AnnotationError> {
        into_array(self.value(name)?)
            .into_iter()
            .map(|v| match v {
                Value::Type(t) => Ok(t),
                Value::Str(s) => Ok(TypeName::new(s)),
                other => Err(mismatch(self.annotation_type(), name, "type", &other)),
            })
            .collect()
    }

    /// Nested annotation as its own merged view
    pub fn get_annotation(&self, name: &str) -> Result<MergedAnnotation<'r>, AnnotationError> {
        let p = self.present()?;
        match unwrap_single(self.value(name)?) {
            Value::Annotation(decl) => self.nested(p, *decl),
            other => Err(mismatch(self.annotation_type(), name, "annotation", &other)),
        }
    }

    /// Nested annotation array as merged views
    pub fn get_annotation_array(
        &self,
        name: &str,
    ) -> Result<Vec<MergedAnnotation<'r>>, AnnotationError> {
        let p = self.present()?;
        into_array(self.value(name)?)
            .into_iter()
            .map(|v| match v {
                Value::Annotation(decl) => self.nested(p, *decl),
                other => Err(mismatch(self.annotation_type(), name, "annotation", &other)),
            })
            .collect()
    }

    /// Project all attributes into a map of resolved values
    pub fn as_map(&self, adapts: &[Adapt]) -> Result<IndexMap<String, Value>, AnnotationError> {
        let p = self.present()?;
        let mapping = p.mappings.get(p.mapping_index);
        let mut map = IndexMap::with_capacity(mapping.attributes().len());
        for index in 0..mapping.attributes().len() {
            let name = mapping.attributes().get(index).name.clone();
            let value = self.resolve_index(p, index)?;
            map.insert(name, self.adapt_value(p, value, adapts)?);
        }
        Ok(map)
    }

    /// Materialize this view as a concrete annotation value object
    ///
    /// The result is computed once per view instance and shared; repeated
    /// calls return the same object.
    pub fn synthesize(&self) -> Result<Arc<SynthesizedAnnotation>, AnnotationError> {
        let p = self.present()?;
        p.synthesized
            .get_or_try_init(|| {
                let mapping = p.mappings.get(p.mapping_index);
                let mut values = IndexMap::with_capacity(mapping.attributes().len());
                for index in 0..mapping.attributes().len() {
                    let attribute = mapping.attributes().get(index);
                    values.insert(attribute.name.clone(), self.resolve_index(p, index)?);
                }
                Ok(Arc::new(SynthesizedAnnotation::new(
                    mapping.annotation_type().clone(),
                    values,
                )))
            })
            .cloned()
    }

    fn present(&self) -> Result<&Present<'r>, AnnotationError> {
        match &self.state {
            State::Missing(requested) => Err(AnnotationError::Missing(requested.clone())),
            State::Present(p) => Ok(p),
        }
    }

    /// Core resolution: redirect through alias or convention mappings to the
    /// shallowest declaration, then collapse mirrors and extract.
    fn resolve_index(&self, p: &Present<'r>, index: usize) -> Result<Value, AnnotationError> {
        let mapping = p.mappings.get(p.mapping_index);
        let (m, a) = if p.merged {
            if let Some(redirect) = mapping.alias_redirects[index] {
                redirect
            } else if let Some(root) = mapping.convention_mappings[index] {
                (0, root)
            } else {
                (p.mapping_index, index)
            }
        } else {
            (p.mapping_index, index)
        };
        self.extract(p, m, a)
    }

    fn extract(&self, p: &Present<'r>, m: usize, a: usize) -> Result<Value, AnnotationError> {
        let mapping = p.mappings.get(m);
        let decl = if m == 0 {
            &p.root_decl
        } else {
            mapping.meta_declaration().unwrap_or(&p.root_decl)
        };
        let resolved_owned;
        let resolved: &[usize] = if m == p.mapping_index {
            &p.resolved_mirrors
        } else if m == 0 {
            &p.resolved_root_mirrors
        } else {
            // Redirects to intermediate chain levels are rare; resolve their
            // mirrors on the fly.
            resolved_owned = mapping.resolve_mirrors(decl);
            &resolved_owned
        };
        let a = resolved[a];
        let attribute = mapping.attributes().get(a);
        if let Some(value) = decl.get(&attribute.name) {
            return Ok(value.clone());
        }
        attribute
            .default_value
            .clone()
            .ok_or_else(|| AnnotationError::NoSuchAttribute {
                annotation: mapping.annotation_type().clone(),
                attribute: attribute.name.clone(),
            })
    }

    fn nested(
        &self,
        p: &Present<'r>,
        decl: AnnotationDecl,
    ) -> Result<MergedAnnotation<'r>, AnnotationError> {
        let mappings = AnnotationTypeMappings::for_type(
            p.registry,
            &decl.type_name,
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )?;
        Ok(MergedAnnotation::mapped(
            p.registry,
            mappings,
            0,
            decl,
            p.aggregate,
        ))
    }

    fn adapt_value(
        &self,
        p: &Present<'r>,
        value: Value,
        adapts: &[Adapt],
    ) -> Result<Value, AnnotationError> {
        Ok(match value {
            Value::Type(t) if adapts.contains(&Adapt::TypeToString) => {
                Value::Str(t.as_str().to_string())
            }
            Value::Annotation(decl) if adapts.contains(&Adapt::AnnotationToMap) => {
                let nested = self.nested(p, *decl)?;
                let map = nested.as_map(adapts)?;
                let mut full = AnnotationDecl::new(nested.annotation_type().clone());
                for (name, nested_value) in map {
                    full = full.set(name, nested_value);
                }
                Value::Annotation(Box::new(full))
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|v| self.adapt_value(p, v, adapts))
                    .collect::<Result<_, _>>()?,
            ),
            other => other,
        })
    }
}

fn mismatch(annotation: &TypeName, attribute: &str, expected: &str, found: &Value) -> AnnotationError {
    AnnotationError::TypeMismatch {
        annotation: annotation.clone(),
        attribute: attribute.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Length-1 arrays coerce to their single element when a scalar is wanted
fn unwrap_single(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => match items.pop() {
            Some(item) => item,
            None => Value::Array(items),
        },
        other => other,
    }
}

/// Scalars coerce to length-1 arrays when an array is wanted
fn into_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        scalar => vec![scalar],
    }
}

fn adapt_string(annotation: &TypeName, attribute: &str, value: Value) -> Result<String, AnnotationError> {
    match unwrap_single(value) {
        Value::Str(s) => Ok(s),
        Value::Type(t) => Ok(t.as_str().to_string()),
        other => Err(mismatch(annotation, attribute, "string", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annot_model::{AnnotationTypeDef, AttributeDef, ValueKind};
    use annot_test_utils::{post_decl, web_registry};
    use pretty_assertions::assert_eq;

    fn post_view(registry: &TypeRegistry, mapping_index: usize) -> MergedAnnotation<'_> {
        let mappings = AnnotationTypeMappings::for_type(
            registry,
            &TypeName::new("web.Post"),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap();
        MergedAnnotation::mapped(registry, mappings, mapping_index, post_decl("/x"), 0)
    }

    #[test]
    fn alias_redirects_meta_attribute_to_root() {
        let registry = web_registry();
        let mapping_view = post_view(&registry, 1);

        assert_eq!(mapping_view.annotation_type().as_str(), "web.Mapping");
        assert_eq!(mapping_view.get_string("path").unwrap(), "/x");
        assert_eq!(mapping_view.get_string("value").unwrap(), "/x");
        assert_eq!(mapping_view.get_string_array("path").unwrap(), vec!["/x"]);
        // The meta occurrence's own explicit value is untouched by aliasing.
        assert_eq!(mapping_view.get_string("method").unwrap(), "POST");
    }

    #[test]
    fn non_merged_view_sees_meta_declaration_only() {
        let registry = web_registry();
        let raw = post_view(&registry, 1).with_non_merged_attributes();

        assert!(raw.get_string_array("path").unwrap().is_empty());
        assert_eq!(raw.get_string("method").unwrap(), "POST");
    }

    #[test]
    fn mutual_aliases_mirror_on_the_root() {
        let registry = web_registry();
        let mappings = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("web.Mapping"),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap();
        let decl = AnnotationDecl::new("web.Mapping")
            .set("value", Value::Array(vec![Value::string("/m")]));
        let view = MergedAnnotation::mapped(&registry, mappings, 0, decl, 0);

        assert_eq!(view.get_string("path").unwrap(), "/m");
        assert_eq!(view.get_string("value").unwrap(), "/m");
    }

    #[test]
    fn unset_mirrors_fall_back_to_defaults() {
        let registry = web_registry();
        let mappings = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("web.Mapping"),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap();
        let view =
            MergedAnnotation::mapped(&registry, mappings, 0, AnnotationDecl::new("web.Mapping"), 0);

        assert!(view.get_string_array("path").unwrap().is_empty());
        assert!(view.get_string_array("value").unwrap().is_empty());
    }

    #[test]
    fn missing_sentinel_fails_value_access() {
        let missing = MergedAnnotation::missing("web.Post");
        assert!(missing.is_missing());
        assert!(!missing.is_present());
        assert_eq!(missing.annotation_type().as_str(), "web.Post");
        assert!(matches!(
            missing.get_string("path"),
            Err(AnnotationError::Missing(_))
        ));
        assert!(matches!(
            missing.synthesize(),
            Err(AnnotationError::Missing(_))
        ));
    }

    #[test]
    fn unknown_attribute_is_a_hard_error() {
        let registry = web_registry();
        let view = post_view(&registry, 0);
        assert!(matches!(
            view.get_string("nope"),
            Err(AnnotationError::NoSuchAttribute { .. })
        ));
    }

    #[test]
    fn type_mismatch_reports_expected_and_found() {
        let registry = web_registry();
        let view = post_view(&registry, 0);
        let err = view.get_int("path").unwrap_err();
        assert!(matches!(err, AnnotationError::TypeMismatch { .. }));
    }

    #[test]
    fn synthesize_is_cached_per_instance() {
        let registry = web_registry();
        let view = post_view(&registry, 1);

        let first = view.synthesize().unwrap();
        let second = view.synthesize().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert_eq!(
            first.value("path"),
            Some(&Value::Array(vec![Value::string("/x")]))
        );
        assert_eq!(first.value("method"), Some(&Value::string("POST")));
    }

    #[test]
    fn synthesized_equality_is_value_based() {
        let registry = web_registry();
        let a = post_view(&registry, 1).synthesize().unwrap();
        let b = post_view(&registry, 1).synthesize().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
    }

    #[test]
    fn as_map_resolves_every_attribute() {
        let registry = web_registry();
        let map = post_view(&registry, 1).as_map(&[]).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map["method"], Value::string("POST"));
        assert_eq!(map["path"], Value::Array(vec![Value::string("/x")]));
        assert_eq!(map["value"], Value::Array(vec![Value::string("/x")]));
    }

    #[test]
    fn primitive_array_getters_coerce_scalars() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.Limits")
                    .attribute(AttributeDef::new("flags", ValueKind::Bool.array_of()))
                    .attribute(AttributeDef::new("weights", ValueKind::Float.array_of()))
                    .attribute(AttributeDef::new(
                        "modes",
                        ValueKind::Enum(TypeName::new("t.Mode")).array_of(),
                    )),
            )
            .unwrap();
        let decl = AnnotationDecl::new("t.Limits")
            .set(
                "flags",
                Value::Array(vec![Value::Bool(true), Value::Bool(false)]),
            )
            .set("weights", Value::Float(1.5))
            .set(
                "modes",
                Value::Array(vec![Value::Enum(EnumValue::new("t.Mode", "FAST"))]),
            );
        let mappings = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("t.Limits"),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap();
        let view = MergedAnnotation::mapped(&registry, mappings, 0, decl, 0);

        assert_eq!(view.get_bool_array("flags").unwrap(), vec![true, false]);
        // A scalar coerces to a length-1 array.
        assert_eq!(view.get_float_array("weights").unwrap(), vec![1.5]);
        assert_eq!(
            view.get_enum_array("modes").unwrap(),
            vec![EnumValue::new("t.Mode", "FAST")]
        );
        assert!(matches!(
            view.get_bool_array("weights"),
            Err(AnnotationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn distance_and_direct_flags() {
        let registry = web_registry();
        let direct = post_view(&registry, 0);
        let meta = post_view(&registry, 1);

        assert!(direct.is_direct_present());
        assert_eq!(direct.distance(), Some(0));
        assert!(meta.is_meta_present());
        assert_eq!(meta.distance(), Some(1));
        assert_eq!(meta.root_type().unwrap().as_str(), "web.Post");
    }
}
