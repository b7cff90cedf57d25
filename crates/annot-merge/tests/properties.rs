//! Property-based checks over alias resolution and container handling

use annot_merge::{AnnotationTypeMappings, MergedAnnotations};
use annot_model::{
    AnnotationDecl, AnnotationTypeDef, ClassDef, Element, TypeName, TypeRegistry, Value,
};
use annot_scan::{AnnotationFilter, RepeatableContainers};
use annot_test_utils::{tag_registry, tags_decl, web_registry};
use proptest::prelude::*;

fn attr_value() -> impl Strategy<Value = String> {
    "[a-z0-9/_-]{1,12}"
}

proptest! {
    /// Setting either side of a mutual alias pair makes both sides read
    /// the same value.
    #[test]
    fn alias_symmetry(value in attr_value(), use_path in any::<bool>()) {
        let registry = web_registry();
        let attribute = if use_path { "path" } else { "value" };
        registry
            .register_class(
                ClassDef::new("app.Sym").annotated(
                    AnnotationDecl::new("web.Mapping")
                        .set(attribute, Value::Array(vec![Value::string(value.clone())])),
                ),
            )
            .unwrap();

        let mapping = MergedAnnotations::from(&registry, &Element::class("app.Sym"))
            .get("web.Mapping");
        prop_assert_eq!(mapping.get_string("path").unwrap(), value.clone());
        prop_assert_eq!(mapping.get_string("value").unwrap(), value);
    }

    /// A container with N repeated annotations streams exactly N merged
    /// views of the repeated type, in declaration order.
    #[test]
    fn repeatable_round_trip(values in proptest::collection::vec(attr_value(), 0..6)) {
        let registry = tag_registry();
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        registry
            .register_class(ClassDef::new("app.Rep").annotated(tags_decl(refs)))
            .unwrap();

        let annotations = MergedAnnotations::from(&registry, &Element::class("app.Rep"));
        let streamed: Vec<String> = annotations
            .stream_of("test.Tag")
            .map(|tag| tag.get_string("value").unwrap())
            .collect();
        prop_assert_eq!(streamed, values);
    }

    /// Mapping construction terminates on arbitrary meta-annotation graphs,
    /// including dense cyclic ones, and never expands past the cycle guard.
    #[test]
    fn arbitrary_meta_graphs_terminate(
        edges in proptest::collection::vec((0usize..6, 0usize..6), 0..12),
    ) {
        let registry = TypeRegistry::new();
        let name = |i: usize| format!("g.N{i}");
        for i in 0..6 {
            let mut def = AnnotationTypeDef::new(name(i));
            for (from, to) in &edges {
                if *from == i {
                    def = def.meta(AnnotationDecl::new(name(*to)));
                }
            }
            registry.register_annotation(def).unwrap();
        }

        let mappings = AnnotationTypeMappings::for_type(
            &registry,
            &TypeName::new("g.N0"),
            &RepeatableContainers::standard(),
            &AnnotationFilter::plain(),
        )
        .unwrap();
        // Any root-to-node chain visits each type at most once, so the
        // arena is bounded by the number of simple paths from the root
        // over 6 nodes: 1 + 5 + 20 + 60 + 120 + 120.
        prop_assert!(mappings.len() <= 326);
        for mapping in mappings.iter() {
            prop_assert!(mapping.distance() < 6);
        }
    }

    /// Scanning twice yields identical merged values.
    #[test]
    fn lookups_are_idempotent(path in attr_value()) {
        let registry = web_registry();
        registry
            .register_class(
                ClassDef::new("app.Idem").annotated(
                    AnnotationDecl::new("web.Post")
                        .set("path", Value::Array(vec![Value::string(path)])),
                ),
            )
            .unwrap();

        let element = Element::class("app.Idem");
        let first = MergedAnnotations::from(&registry, &element)
            .get("web.Mapping")
            .get_string("path")
            .unwrap();
        let second = MergedAnnotations::from(&registry, &element)
            .get("web.Mapping")
            .get_string("path")
            .unwrap();
        prop_assert_eq!(first, second);
    }
}
