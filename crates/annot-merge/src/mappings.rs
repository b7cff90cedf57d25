//! Ordered mapping lists for a root annotation type
//!
//! [`AnnotationTypeMappings`] holds the flat, breadth-first list of
//! [`AnnotationTypeMapping`] nodes for a root type and all its transitively
//! reachable meta-annotations. The list is an arena: nodes reference each
//! other by index, never by pointer, so cyclic meta-annotation graphs
//! collapse into a finite chain guarded by an ancestor check.
//!
//! Built lists are cached process-wide per (registry, containers, filter,
//! type); only the shareable container singletons and hashable filters are
//! cache keys, custom strategies rebuild every time.

use crate::mapping::{AnnotationTypeMapping, MirrorSet};
use annot_model::{
    AnnotationError, AnnotationTypeDef, Attributes, TypeName, TypeRegistry, VALUE,
};
use annot_scan::{
    introspection_failure, AnnotationFilter, ContainersCacheKey, RepeatableContainers,
};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

type MappingsKey = (u64, ContainersCacheKey, AnnotationFilter, TypeName);

static MAPPINGS_CACHE: Lazy<DashMap<MappingsKey, Arc<AnnotationTypeMappings>>> =
    Lazy::new(DashMap::new);

/// Drop all cached type-mapping lists (all registries)
pub fn clear_mappings_cache() {
    MAPPINGS_CACHE.clear();
}

/// Breadth-first list of type mappings, index 0 = root
#[derive(Debug)]
pub struct AnnotationTypeMappings {
    mappings: Vec<AnnotationTypeMapping>,
}

impl AnnotationTypeMappings {
    /// Mappings for a root annotation type, cached where the configuration
    /// is shareable.
    ///
    /// # Errors
    /// Introspection error when the root type is unregistered; configuration
    /// error when the root type's own alias declarations are invalid.
    /// Invalid aliases on meta-annotations only drop the affected branch.
    pub fn for_type(
        registry: &TypeRegistry,
        annotation_type: &TypeName,
        containers: &RepeatableContainers,
        filter: &AnnotationFilter,
    ) -> Result<Arc<Self>, AnnotationError> {
        let cache_key = match filter {
            AnnotationFilter::Custom(_) => None,
            _ => containers
                .cache_key()
                .map(|key| (registry.id(), key, filter.clone(), annotation_type.clone())),
        };
        if let Some(key) = &cache_key {
            if let Some(cached) = MAPPINGS_CACHE.get(key) {
                return Ok(Arc::clone(&cached));
            }
        }
        let built = Arc::new(Self::build(registry, annotation_type, containers, filter)?);
        if let Some(key) = cache_key {
            MAPPINGS_CACHE.insert(key, Arc::clone(&built));
        }
        Ok(built)
    }

    fn build(
        registry: &TypeRegistry,
        annotation_type: &TypeName,
        containers: &RepeatableContainers,
        filter: &AnnotationFilter,
    ) -> Result<Self, AnnotationError> {
        let root_def = registry.annotation_type(annotation_type).ok_or_else(|| {
            AnnotationError::introspection(
                format!("@{annotation_type}"),
                "annotation type is not registered",
            )
        })?;
        let root_attrs = registry.attributes(annotation_type)?;
        validate_aliases(registry, &root_def, &root_attrs)?;

        let mut mappings = vec![AnnotationTypeMapping::new(
            0, None, 0, root_def, root_attrs, None,
        )];
        let mut queue = VecDeque::from([0usize]);

        while let Some(current) = queue.pop_front() {
            let metas = mappings[current].type_def.meta_annotations.clone();
            for meta in metas {
                // A container used as a meta-annotation stands for its
                // repeated contents.
                let expanded = match containers.find_repeated(&meta, registry) {
                    Ok(Some(repeated)) => repeated,
                    Ok(None) => vec![meta],
                    Err(error) => {
                        introspection_failure(
                            &format!("@{}", mappings[current].annotation_type),
                            &error,
                            None,
                        );
                        continue;
                    }
                };
                for decl in expanded {
                    if filter.matches(&decl.type_name) {
                        continue;
                    }
                    if on_ancestor_chain(&mappings, current, &decl.type_name) {
                        continue;
                    }
                    let context = format!("@{}", decl.type_name);
                    let def = match registry.annotation_type(&decl.type_name) {
                        Some(def) => def,
                        None => {
                            introspection_failure(
                                &context,
                                &AnnotationError::introspection(
                                    context.clone(),
                                    "meta-annotation type is not registered",
                                ),
                                None,
                            );
                            continue;
                        }
                    };
                    let attrs = match registry.attributes(&decl.type_name) {
                        Ok(attrs) => attrs,
                        Err(error) => {
                            introspection_failure(&context, &error, None);
                            continue;
                        }
                    };
                    if let Err(error) = validate_aliases(registry, &def, &attrs) {
                        introspection_failure(&context, &error, None);
                        continue;
                    }
                    let index = mappings.len();
                    let distance = mappings[current].distance + 1;
                    mappings.push(AnnotationTypeMapping::new(
                        index,
                        Some(current),
                        distance,
                        def,
                        attrs,
                        Some(decl),
                    ));
                    queue.push_back(index);
                }
            }
        }

        let mut built = Self { mappings };
        built.resolve_cross_references();
        Ok(built)
    }

    /// Number of mappings, root included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the list is empty (never true for a successfully built list)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mapping at an index
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> &AnnotationTypeMapping {
        &self.mappings[index]
    }

    /// The root mapping
    #[inline]
    #[must_use]
    pub fn root(&self) -> &AnnotationTypeMapping {
        &self.mappings[0]
    }

    /// Iterate mappings in breadth-first (distance-ascending) order
    pub fn iter(&self) -> impl Iterator<Item = &AnnotationTypeMapping> {
        self.mappings.iter()
    }

    /// Indices of mappings describing the given annotation type
    pub fn indices_of<'a>(&'a self, annotation_type: &'a TypeName) -> impl Iterator<Item = usize> + 'a {
        self.mappings
            .iter()
            .filter(move |m| m.annotation_type == *annotation_type)
            .map(|m| m.index)
    }

    /// Whether `ancestor` lies on `node`'s source chain (inclusive)
    fn is_ancestor(&self, ancestor: usize, node: usize) -> bool {
        let mut current = Some(node);
        while let Some(index) = current {
            if index == ancestor {
                return true;
            }
            current = self.mappings[index].source;
        }
        false
    }

    /// Terminal alias-chain key of one attribute. Meta aliases follow the
    /// edge into the deepest targeted mapping; mutual same-type pairs
    /// canonicalize to the lower index. Every member of one alias closure
    /// resolves to the same key.
    fn alias_key(&self, mapping_index: usize, attr_index: usize) -> (usize, usize) {
        let mapping = &self.mappings[mapping_index];
        let attribute = mapping.attributes.get(attr_index);
        let Some(alias) = &attribute.alias else {
            return (mapping_index, attr_index);
        };
        let target_name = alias.target_attribute(&attribute.name);
        match &alias.annotation {
            Some(target_type) if *target_type != mapping.annotation_type => {
                let target = self.mappings.iter().find(|t| {
                    t.annotation_type == *target_type && self.is_ancestor(mapping_index, t.index)
                });
                match target {
                    Some(t) => match t.attributes.index_of(target_name) {
                        Some(b) => self.alias_key(t.index, b),
                        None => (mapping_index, attr_index),
                    },
                    // Target excluded by filtering: the alias has nothing to
                    // bind to and the attribute stands alone.
                    None => (mapping_index, attr_index),
                }
            }
            _ => match mapping.attributes.index_of(target_name) {
                Some(partner) => (mapping_index, attr_index.min(partner)),
                None => (mapping_index, attr_index),
            },
        }
    }

    /// Second pass over the complete list: alias redirects, convention
    /// mappings, mirror sets and synthesizability all need the full arena.
    fn resolve_cross_references(&mut self) {
        let count = self.mappings.len();
        let mut keys: Vec<Vec<(usize, usize)>> = Vec::with_capacity(count);
        for m in 0..count {
            let attrs = self.mappings[m].attributes.len();
            keys.push((0..attrs).map(|a| self.alias_key(m, a)).collect());
        }

        // Alias closure membership, in (mapping, attribute) order; breadth
        // first order makes mapping order distance-ascending.
        let mut groups: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
        for (m, mapping_keys) in keys.iter().enumerate() {
            for (a, key) in mapping_keys.iter().enumerate() {
                groups.entry(*key).or_default().push((m, a));
            }
        }

        struct Resolved {
            alias_redirects: Vec<Option<(usize, usize)>>,
            convention_mappings: Vec<Option<usize>>,
            mirror_sets: Vec<MirrorSet>,
            synthesizable: bool,
        }

        let mut all: Vec<Resolved> = Vec::with_capacity(count);
        for m in 0..count {
            let attrs = self.mappings[m].attributes.len();
            let mut alias_redirects: Vec<Option<(usize, usize)>> = vec![None; attrs];
            let mut convention_mappings: Vec<Option<usize>> = vec![None; attrs];

            for a in 0..attrs {
                let members = &groups[&keys[m][a]];
                // Shallowest alias-chain member declared above this mapping:
                // its value overrides this attribute's in merged views.
                alias_redirects[a] = members
                    .iter()
                    .find(|(mm, _)| *mm != m && self.is_ancestor(*mm, m))
                    .copied();
            }

            if m != 0 {
                for a in 0..attrs {
                    if alias_redirects[a].is_some() {
                        continue;
                    }
                    let attribute = self.mappings[m].attributes.get(a);
                    if attribute.name == VALUE {
                        continue;
                    }
                    if let Some(r) = self.mappings[0].attributes.index_of(&attribute.name) {
                        let root_attr = self.mappings[0].attributes.get(r);
                        if attribute.kind.is_compatible(&root_attr.kind) {
                            convention_mappings[a] = Some(r);
                        }
                    }
                }
            }

            let mut local: Vec<((usize, usize), SmallVec<[usize; 4]>)> = Vec::new();
            for a in 0..attrs {
                match local.iter_mut().find(|(key, _)| *key == keys[m][a]) {
                    Some((_, indices)) => indices.push(a),
                    None => local.push((keys[m][a], SmallVec::from_slice(&[a]))),
                }
            }
            let mirror_sets: Vec<MirrorSet> = local
                .into_iter()
                .filter(|(_, indices)| indices.len() > 1)
                .map(|(_, indices)| MirrorSet { indices })
                .collect();

            let synthesizable = !mirror_sets.is_empty()
                || (m != 0
                    && (alias_redirects.iter().any(Option::is_some)
                        || convention_mappings.iter().any(Option::is_some)));

            all.push(Resolved {
                alias_redirects,
                convention_mappings,
                mirror_sets,
                synthesizable,
            });
        }

        for (mapping, resolved) in self.mappings.iter_mut().zip(all) {
            mapping.alias_redirects = resolved.alias_redirects;
            mapping.convention_mappings = resolved.convention_mappings;
            mapping.mirror_sets = resolved.mirror_sets;
            mapping.synthesizable = resolved.synthesizable;
        }
    }
}

fn on_ancestor_chain(
    mappings: &[AnnotationTypeMapping],
    start: usize,
    annotation_type: &TypeName,
) -> bool {
    let mut current = Some(start);
    while let Some(index) = current {
        if mappings[index].annotation_type == *annotation_type {
            return true;
        }
        current = mappings[index].source;
    }
    false
}

/// Structural validation of one type's alias declarations.
///
/// Same-type aliases must point at an existing attribute of the same kind
/// that aliases back, and both sides must declare equal defaults. Meta
/// aliases must target an attribute that exists, with a compatible kind, on
/// an annotation type meta-present (transitively) on the declaring type.
fn validate_aliases(
    registry: &TypeRegistry,
    def: &AnnotationTypeDef,
    attrs: &Attributes,
) -> Result<(), AnnotationError> {
    for attribute in attrs.iter() {
        let Some(alias) = &attribute.alias else {
            continue;
        };
        let target_name = alias.target_attribute(&attribute.name);
        let same_type = match &alias.annotation {
            None => true,
            Some(target_type) => *target_type == def.name,
        };
        if same_type {
            if target_name == attribute.name {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!("attribute `{}` declares itself as its alias", attribute.name),
                ));
            }
            let Some(target_index) = attrs.index_of(target_name) else {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!(
                        "attribute `{}` aliases missing attribute `{target_name}`",
                        attribute.name
                    ),
                ));
            };
            let target = attrs.get(target_index);
            if target.kind != attribute.kind {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!(
                        "aliased attributes `{}` and `{target_name}` declare different kinds",
                        attribute.name
                    ),
                ));
            }
            let mutual = target.alias.as_ref().is_some_and(|back| {
                back.annotation
                    .as_ref()
                    .map_or(true, |t| *t == def.name)
                    && back.target_attribute(&target.name) == attribute.name
            });
            if !mutual {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!(
                        "attribute `{target_name}` must declare `{}` as its alias in return",
                        attribute.name
                    ),
                ));
            }
            if attribute.default_value.is_none()
                || attribute.default_value != target.default_value
            {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!(
                        "aliased attributes `{}` and `{target_name}` must declare the same default",
                        attribute.name
                    ),
                ));
            }
        } else if let Some(target_type) = &alias.annotation {
            if !is_meta_present(registry, &def.name, target_type) {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!(
                        "alias target @{target_type} is not meta-present on @{}",
                        def.name
                    ),
                ));
            }
            let Some(target_def) = registry.annotation_type(target_type) else {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!("alias target @{target_type} is not registered"),
                ));
            };
            let Some(target) = target_def.attribute_by_name(target_name) else {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!("alias target @{target_type} has no attribute `{target_name}`"),
                ));
            };
            if !attribute.kind.is_compatible(&target.kind) {
                return Err(AnnotationError::configuration(
                    def.name.clone(),
                    format!(
                        "attribute `{}` and alias target `{target_name}` declare incompatible kinds",
                        attribute.name
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Whether `target` is declared as a meta-annotation, directly or
/// transitively, on `declaring`
fn is_meta_present(registry: &TypeRegistry, declaring: &TypeName, target: &TypeName) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([declaring.clone()]);
    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(def) = registry.annotation_type(&current) else {
            continue;
        };
        for meta in &def.meta_annotations {
            if meta.type_name == *target {
                return true;
            }
            queue.push_back(meta.type_name.clone());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use annot_model::{AliasFor, AnnotationDecl, AttributeDef, Value, ValueKind};
    use annot_test_utils::web_registry;
    use pretty_assertions::assert_eq;

    fn build(registry: &TypeRegistry, name: &str) -> Arc<AnnotationTypeMappings> {
        AnnotationTypeMappings::for_type(
            registry,
            &TypeName::new(name),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap()
    }

    #[test]
    fn root_then_meta_in_distance_order() {
        let registry = web_registry();
        let mappings = build(&registry, "web.Post");

        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings.root().annotation_type().as_str(), "web.Post");
        assert_eq!(mappings.get(1).annotation_type().as_str(), "web.Mapping");
        assert_eq!(mappings.get(1).distance(), 1);
        assert_eq!(mappings.get(1).source(), Some(0));
    }

    #[test]
    fn meta_alias_redirects_to_root() {
        let registry = web_registry();
        let mappings = build(&registry, "web.Post");

        let mapping = mappings.get(1);
        let path = mapping.attributes().index_of("path").unwrap();
        let value = mapping.attributes().index_of("value").unwrap();
        let root_path = mappings.root().attributes().index_of("path").unwrap();

        // Mapping.path and Mapping.value both trace back to Post.path.
        assert_eq!(mapping.alias_redirects[path], Some((0, root_path)));
        assert_eq!(mapping.alias_redirects[value], Some((0, root_path)));
        assert!(mapping.is_synthesizable());
    }

    #[test]
    fn mutual_aliases_form_one_mirror_set() {
        let registry = web_registry();
        let mappings = build(&registry, "web.Mapping");

        let sets = mappings.root().mirror_sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].indices().len(), 2);
        assert!(mappings.root().is_synthesizable());
    }

    #[test]
    fn self_referential_meta_annotation_terminates() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.Self").meta(AnnotationDecl::new("t.Self")),
            )
            .unwrap();

        let mappings = build(&registry, "t.Self");
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn transitive_cycle_terminates() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(AnnotationTypeDef::new("t.A").meta(AnnotationDecl::new("t.B")))
            .unwrap();
        registry
            .register_annotation(AnnotationTypeDef::new("t.B").meta(AnnotationDecl::new("t.A")))
            .unwrap();

        let mappings = build(&registry, "t.A");
        // A at distance 0, B at distance 1; the B -> A edge is dropped.
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn filtered_meta_annotations_are_skipped() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(AnnotationTypeDef::new("lang.Documented"))
            .unwrap();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.Marker").meta(AnnotationDecl::new("lang.Documented")),
            )
            .unwrap();

        let mappings = build(&registry, "t.Marker");
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn invalid_meta_alias_drops_only_that_branch() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.Bad").attribute(
                    AttributeDef::new("x", ValueKind::Str)
                        .with_alias(AliasFor::meta("t.Nowhere", "y")),
                ),
            )
            .unwrap();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.Ok")
                    .meta(AnnotationDecl::new("t.Bad"))
                    .meta(AnnotationDecl::new("t.Fine")),
            )
            .unwrap();
        registry
            .register_annotation(AnnotationTypeDef::new("t.Fine"))
            .unwrap();

        let mappings = build(&registry, "t.Ok");
        let types: Vec<&str> = mappings
            .iter()
            .map(|m| m.annotation_type().as_str())
            .collect();
        assert_eq!(types, vec!["t.Ok", "t.Fine"]);
    }

    #[test]
    fn invalid_root_alias_is_a_configuration_error() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.Broken").attribute(
                    AttributeDef::new("a", ValueKind::Str)
                        .with_default(Value::string(""))
                        .with_alias(AliasFor::same_type("missing")),
                ),
            )
            .unwrap();

        let err = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("t.Broken"),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn one_sided_same_type_alias_is_rejected() {
        let registry = TypeRegistry::new();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.OneWay")
                    .attribute(
                        AttributeDef::new("a", ValueKind::Str)
                            .with_default(Value::string(""))
                            .with_alias(AliasFor::same_type("b")),
                    )
                    .attribute(
                        AttributeDef::new("b", ValueKind::Str).with_default(Value::string("")),
                    ),
            )
            .unwrap();

        let err = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("t.OneWay"),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn repeatable_container_meta_annotation_expands() {
        let registry = annot_test_utils::tag_registry();
        registry
            .register_annotation(
                AnnotationTypeDef::new("t.Composed").meta(
                    AnnotationDecl::new("test.Tags").set(
                        "value",
                        Value::Array(vec![
                            Value::annotation(
                                AnnotationDecl::new("test.Tag").set("value", Value::string("x")),
                            ),
                            Value::annotation(
                                AnnotationDecl::new("test.Tag").set("value", Value::string("y")),
                            ),
                        ]),
                    ),
                ),
            )
            .unwrap();

        let mappings = build(&registry, "t.Composed");
        let types: Vec<&str> = mappings
            .iter()
            .map(|m| m.annotation_type().as_str())
            .collect();
        assert_eq!(types, vec!["t.Composed", "test.Tag", "test.Tag"]);
    }

    #[test]
    fn cached_per_type_and_cleared_globally() {
        let registry = web_registry();
        let first = build(&registry, "web.Post");
        let second = build(&registry, "web.Post");
        assert!(Arc::ptr_eq(&first, &second));

        clear_mappings_cache();
        let third = build(&registry, "web.Post");
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn custom_containers_are_never_cached() {
        let registry = web_registry();
        let containers = RepeatableContainers::of("t.C", "t.R");
        let first = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("web.Post"),
            &containers,
            &AnnotationFilter::plain(),
        )
        .unwrap();
        let second = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("web.Post"),
            &containers,
            &AnnotationFilter::plain(),
        )
        .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
