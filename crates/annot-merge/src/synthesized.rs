//! Concrete merged-annotation value objects
//!
//! Synthesis materializes a merged view as a plain value object holding the
//! fully resolved value of every attribute. Equality and hashing follow the
//! annotation contract: value-based, order-independent, array-aware.

use annot_model::{TypeName, Value};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

/// A fully resolved annotation instance
///
/// Every attribute of the annotation type is present, aliases and mirrors
/// already collapsed. Two synthesized annotations are equal iff their type
/// and all attribute values are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedAnnotation {
    type_name: TypeName,
    values: IndexMap<String, Value>,
}

impl SynthesizedAnnotation {
    pub(crate) fn new(type_name: TypeName, values: IndexMap<String, Value>) -> Self {
        Self { type_name, values }
    }

    /// The annotation type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    /// Resolved value of one attribute
    #[inline]
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// All resolved values, in canonical attribute order
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the annotation type declares no attributes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Hash for SynthesizedAnnotation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // IndexMap equality ignores order; hash sorted keys to match.
        self.type_name.hash(state);
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        for key in keys {
            key.hash(state);
            self.values[key.as_str()].hash(state);
        }
    }
}

impl Display for SynthesizedAnnotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}(", self.type_name)?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(order_swapped: bool) -> SynthesizedAnnotation {
        let mut values = IndexMap::new();
        if order_swapped {
            values.insert("b".to_string(), Value::Int(2));
            values.insert("a".to_string(), Value::string("x"));
        } else {
            values.insert("a".to_string(), Value::string("x"));
            values.insert("b".to_string(), Value::Int(2));
        }
        SynthesizedAnnotation::new(TypeName::new("t.A"), values)
    }

    #[test]
    fn equality_and_hash_ignore_order() {
        use std::collections::hash_map::DefaultHasher;

        let a = sample(false);
        let b = sample(true);
        assert_eq!(a, b);

        let hash = |s: &SynthesizedAnnotation| {
            let mut hasher = DefaultHasher::new();
            s.hash(&mut hasher);
            hasher.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn display_lists_attributes() {
        let s = sample(false);
        assert_eq!(s.to_string(), "@t.A(a=\"x\", b=2)");
    }

    #[test]
    fn serializes_as_a_flat_object() {
        let json = serde_json::to_value(sample(false)).unwrap();
        assert_eq!(json["type_name"], "t.A");
        assert_eq!(json["values"]["b"]["Int"], 2);
    }
}
