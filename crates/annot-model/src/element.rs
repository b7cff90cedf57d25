//! Element hierarchy model
//!
//! Elements are the things annotations are declared on: classes and
//! methods. A [`ClassDef`] records superclass, interfaces and enclosing
//! class links so scanners can walk the full type hierarchy, and carries
//! the methods declared on it.

use crate::annotation::AnnotationDecl;
use crate::value::TypeName;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A method declared on a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name
    pub name: String,

    /// Parameter types, in order
    pub param_types: Vec<TypeName>,

    /// Private methods cannot be overridden; hierarchy walks stop at them
    pub private: bool,

    /// Compiler-generated forwarder: the name of the sibling method whose
    /// annotations this method should be read through
    pub bridge_target: Option<String>,

    /// Annotations declared directly on the method
    pub annotations: Vec<AnnotationDecl>,
}

impl MethodDef {
    /// Create a public method with no parameters
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_types: Vec::new(),
            private: false,
            bridge_target: None,
            annotations: Vec::new(),
        }
    }

    /// Set parameter types
    #[inline]
    #[must_use]
    pub fn params(mut self, types: impl IntoIterator<Item = TypeName>) -> Self {
        self.param_types = types.into_iter().collect();
        self
    }

    /// Mark private
    #[inline]
    #[must_use]
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Mark as a bridge forwarding to the named sibling method
    #[inline]
    #[must_use]
    pub fn bridge_to(mut self, target: impl Into<String>) -> Self {
        self.bridge_target = Some(target.into());
        self
    }

    /// Add a declared annotation
    #[inline]
    #[must_use]
    pub fn annotated(mut self, decl: AnnotationDecl) -> Self {
        self.annotations.push(decl);
        self
    }

    /// Whether this method is a bridge
    #[inline]
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.bridge_target.is_some()
    }

    /// Whether `other` has the same override signature: equal name, equal
    /// parameter count, and pairwise-equal parameter types.
    #[must_use]
    pub fn same_signature(&self, other: &MethodDef) -> bool {
        self.name == other.name && self.param_types == other.param_types
    }
}

/// A class (or interface) in the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Qualified class name, unique within a registry
    pub name: TypeName,

    /// Direct superclass, if any
    pub superclass: Option<TypeName>,

    /// Directly implemented interfaces
    pub interfaces: Vec<TypeName>,

    /// Enclosing class for nested classes
    pub enclosing: Option<TypeName>,

    /// Annotations declared directly on the class
    pub annotations: Vec<AnnotationDecl>,

    /// Methods declared on this class
    pub methods: Vec<MethodDef>,
}

impl ClassDef {
    /// Create a top-level class with no supertypes
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            interfaces: Vec::new(),
            enclosing: None,
            annotations: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the superclass
    #[inline]
    #[must_use]
    pub fn extends(mut self, superclass: impl Into<TypeName>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Add an implemented interface
    #[inline]
    #[must_use]
    pub fn implements(mut self, interface: impl Into<TypeName>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Set the enclosing class
    #[inline]
    #[must_use]
    pub fn enclosed_by(mut self, enclosing: impl Into<TypeName>) -> Self {
        self.enclosing = Some(enclosing.into());
        self
    }

    /// Add a declared annotation
    #[inline]
    #[must_use]
    pub fn annotated(mut self, decl: AnnotationDecl) -> Self {
        self.annotations.push(decl);
        self
    }

    /// Add a declared method
    #[inline]
    #[must_use]
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Find a declared method by name and parameter types
    #[must_use]
    pub fn find_method(&self, name: &str, param_types: &[TypeName]) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.param_types == param_types)
    }
}

/// Reference to a method by declaring class and signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Declaring class
    pub class: TypeName,

    /// Method name
    pub name: String,

    /// Parameter types
    pub param_types: Vec<TypeName>,
}

impl MethodRef {
    /// Create a method reference
    #[inline]
    #[must_use]
    pub fn new(
        class: impl Into<TypeName>,
        name: impl Into<String>,
        param_types: impl IntoIterator<Item = TypeName>,
    ) -> Self {
        Self {
            class: class.into(),
            name: name.into(),
            param_types: param_types.into_iter().collect(),
        }
    }
}

impl Display for MethodRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.class, self.name)?;
        for (i, p) in self.param_types.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        f.write_str(")")
    }
}

/// An annotated element: the source of a scan
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    /// A class, referenced by name
    Class(TypeName),

    /// A method, referenced by declaring class and signature
    Method(MethodRef),
}

impl Element {
    /// Class element helper
    #[inline]
    #[must_use]
    pub fn class(name: impl Into<TypeName>) -> Self {
        Self::Class(name.into())
    }

    /// No-parameter method element helper
    #[inline]
    #[must_use]
    pub fn method(class: impl Into<TypeName>, name: impl Into<String>) -> Self {
        Self::Method(MethodRef::new(class, name, []))
    }

    /// The class this element belongs to (the class itself, or the method's
    /// declaring class)
    #[inline]
    #[must_use]
    pub fn declaring_class(&self) -> &TypeName {
        match self {
            Self::Class(name) => name,
            Self::Method(method) => &method.class,
        }
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(name) => write!(f, "{name}"),
            Self::Method(method) => write!(f, "{method}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn class_builder_links() {
        let class = ClassDef::new("app.Controller")
            .extends("app.Base")
            .implements("app.Handler")
            .enclosed_by("app.Outer");

        assert_eq!(class.superclass.as_ref().unwrap().as_str(), "app.Base");
        assert_eq!(class.interfaces.len(), 1);
        assert!(class.enclosing.is_some());
    }

    #[test]
    fn find_method_matches_signature() {
        let class = ClassDef::new("app.Controller")
            .method(MethodDef::new("handle"))
            .method(MethodDef::new("handle").params([TypeName::new("lang.String")]));

        assert!(class.find_method("handle", &[]).is_some());
        assert!(class
            .find_method("handle", &[TypeName::new("lang.String")])
            .is_some());
        assert!(class
            .find_method("handle", &[TypeName::new("lang.Int")])
            .is_none());
    }

    #[test]
    fn method_signature_comparison() {
        let a = MethodDef::new("run").params([TypeName::new("lang.String")]);
        let b = MethodDef::new("run").params([TypeName::new("lang.String")]);
        let c = MethodDef::new("run");
        assert!(a.same_signature(&b));
        assert!(!a.same_signature(&c));
    }

    #[test]
    fn bridge_methods() {
        let bridge = MethodDef::new("compare").bridge_to("compareTyped");
        assert!(bridge.is_bridge());
        assert!(!MethodDef::new("compare").is_bridge());
    }

    #[test]
    fn element_display() {
        let element = Element::method("app.Controller", "handle");
        assert_eq!(element.to_string(), "app.Controller::handle()");
        assert_eq!(Element::class("app.Controller").to_string(), "app.Controller");
    }

    #[test]
    fn element_declaring_class() {
        let element = Element::method("app.Controller", "handle");
        assert_eq!(element.declaring_class().as_str(), "app.Controller");
    }
}
