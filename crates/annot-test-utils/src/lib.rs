//! Shared registry fixtures for tests
//!
//! Small, self-describing annotation vocabularies used across the scan and
//! merge test suites: a web-mapping stack with meta-annotation aliases, a
//! repeatable tag pair, and a filter/search hierarchy.

#![warn(unreachable_pub)]

use annot_model::{
    AliasFor, AnnotationDecl, AnnotationTypeDef, AttributeDef, ClassDef, MethodDef, TypeName,
    TypeRegistry, Value, ValueKind,
};

/// Registry with a web-mapping vocabulary:
///
/// - `web.Mapping` with mutually-aliased `value` and `path` attributes and a
///   `method` attribute
/// - `web.Post`, meta-annotated `@Mapping(method = "POST")`, whose `path`
///   attribute aliases `Mapping.path`
#[must_use]
pub fn web_registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry
        .register_annotation(
            AnnotationTypeDef::new("web.Mapping")
                .attribute(
                    AttributeDef::new("value", ValueKind::Str.array_of())
                        .with_default(Value::Array(Vec::new()))
                        .with_alias(AliasFor::same_type("path")),
                )
                .attribute(
                    AttributeDef::new("path", ValueKind::Str.array_of())
                        .with_default(Value::Array(Vec::new()))
                        .with_alias(AliasFor::same_type("value")),
                )
                .attribute(
                    AttributeDef::new("method", ValueKind::Str).with_default(Value::string("")),
                ),
        )
        .expect("fixture registration");
    registry
        .register_annotation(
            AnnotationTypeDef::new("web.Post")
                .attribute(
                    AttributeDef::new("path", ValueKind::Str.array_of())
                        .with_default(Value::Array(Vec::new()))
                        .with_alias(AliasFor::meta("web.Mapping", "path")),
                )
                .meta(AnnotationDecl::new("web.Mapping").set("method", Value::string("POST"))),
        )
        .expect("fixture registration");
    registry
}

/// Registry with the standard repeatable pair `test.Tag` / `test.Tags`
#[must_use]
pub fn tag_registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry
        .register_annotation(
            AnnotationTypeDef::new("test.Tag")
                .attribute(
                    AttributeDef::new("value", ValueKind::Str).with_default(Value::string("")),
                )
                .repeatable("test.Tags"),
        )
        .expect("fixture registration");
    registry
        .register_annotation(AnnotationTypeDef::new("test.Tags").attribute(AttributeDef::new(
            "value",
            ValueKind::Annotation(TypeName::new("test.Tag")).array_of(),
        )))
        .expect("fixture registration");
    registry
}

/// Register a three-level class hierarchy on an existing registry:
/// `app.Sub extends app.Base implements app.Iface`, with an annotated
/// `handle` method on `app.Base`.
pub fn register_hierarchy(registry: &TypeRegistry, class_annotation: &str) {
    registry
        .register_class(ClassDef::new("app.Iface"))
        .expect("fixture registration");
    registry
        .register_class(
            ClassDef::new("app.Base")
                .annotated(AnnotationDecl::new(class_annotation))
                .method(MethodDef::new("handle").annotated(AnnotationDecl::new(class_annotation))),
        )
        .expect("fixture registration");
    registry
        .register_class(
            ClassDef::new("app.Sub")
                .extends("app.Base")
                .implements("app.Iface")
                .method(MethodDef::new("handle")),
        )
        .expect("fixture registration");
}

/// An `@web.Post(path = [path])` declaration
#[must_use]
pub fn post_decl(path: &str) -> AnnotationDecl {
    AnnotationDecl::new("web.Post").set("path", Value::Array(vec![Value::string(path)]))
}

/// A `@test.Tags(value = [@Tag(v), ..])` container declaration
#[must_use]
pub fn tags_decl<'a>(values: impl IntoIterator<Item = &'a str>) -> AnnotationDecl {
    AnnotationDecl::new("test.Tags").set(
        "value",
        Value::Array(
            values
                .into_iter()
                .map(|v| {
                    Value::annotation(AnnotationDecl::new("test.Tag").set("value", Value::string(v)))
                })
                .collect(),
        ),
    )
}
