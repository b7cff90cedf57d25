//! One node in the distance chain from a root annotation type
//!
//! An [`AnnotationTypeMapping`] describes how one annotation type's
//! attributes relate to the root of the chain: explicit alias redirects,
//! convention-based name matches, and mirror sets of attributes that must
//! carry equal values. Mappings are built by
//! [`AnnotationTypeMappings`](crate::AnnotationTypeMappings) and are
//! immutable once the full list is resolved.

use annot_model::{AnnotationDecl, AnnotationTypeDef, Attributes, TypeName};
use smallvec::SmallVec;
use std::sync::Arc;

/// A group of attribute indices within one mapping that must hold equal
/// values (explicit or implicit aliases of each other)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSet {
    pub(crate) indices: SmallVec<[usize; 4]>,
}

impl MirrorSet {
    /// Attribute indices in canonical order
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// Mapping of one annotation type against the root of its distance chain
#[derive(Debug)]
pub struct AnnotationTypeMapping {
    pub(crate) index: usize,
    pub(crate) source: Option<usize>,
    pub(crate) distance: usize,
    pub(crate) annotation_type: TypeName,
    pub(crate) type_def: Arc<AnnotationTypeDef>,
    pub(crate) attributes: Arc<Attributes>,
    /// The meta-annotation occurrence that introduced this mapping; `None`
    /// for the root
    pub(crate) meta_decl: Option<AnnotationDecl>,
    /// Per attribute: the shallowest alias-chain member on this mapping's
    /// ancestor chain, as (mapping index, attribute index). Values redirect
    /// there in merged mode.
    pub(crate) alias_redirects: Vec<Option<(usize, usize)>>,
    /// Per attribute: root attribute index matched by name convention
    pub(crate) convention_mappings: Vec<Option<usize>>,
    pub(crate) mirror_sets: Vec<MirrorSet>,
    pub(crate) synthesizable: bool,
}

impl AnnotationTypeMapping {
    pub(crate) fn new(
        index: usize,
        source: Option<usize>,
        distance: usize,
        type_def: Arc<AnnotationTypeDef>,
        attributes: Arc<Attributes>,
        meta_decl: Option<AnnotationDecl>,
    ) -> Self {
        let count = attributes.len();
        Self {
            index,
            source,
            distance,
            annotation_type: type_def.name.clone(),
            type_def,
            attributes,
            meta_decl,
            alias_redirects: vec![None; count],
            convention_mappings: vec![None; count],
            mirror_sets: Vec::new(),
            synthesizable: false,
        }
    }

    /// Position of this mapping in its list
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Parent mapping index; `None` for the root
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<usize> {
        self.source
    }

    /// Meta-annotation hops from the root; 0 for the root itself
    #[inline]
    #[must_use]
    pub fn distance(&self) -> usize {
        self.distance
    }

    /// The annotation type this mapping describes
    #[inline]
    #[must_use]
    pub fn annotation_type(&self) -> &TypeName {
        &self.annotation_type
    }

    /// Canonical attribute table of the mapped type
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// The type descriptor of the mapped type
    #[inline]
    #[must_use]
    pub fn type_def(&self) -> &AnnotationTypeDef {
        &self.type_def
    }

    /// The meta-annotation occurrence that introduced this mapping
    #[inline]
    #[must_use]
    pub fn meta_declaration(&self) -> Option<&AnnotationDecl> {
        self.meta_decl.as_ref()
    }

    /// Mirror sets within this mapping
    #[inline]
    #[must_use]
    pub fn mirror_sets(&self) -> &[MirrorSet] {
        &self.mirror_sets
    }

    /// Whether a merged view of this mapping differs from the raw occurrence
    #[inline]
    #[must_use]
    pub fn is_synthesizable(&self) -> bool {
        self.synthesizable
    }

    /// Resolve this mapping's mirror sets against a concrete occurrence.
    ///
    /// Returns one index per attribute: the group member whose value is
    /// canonical, or the attribute's own index when it is not mirrored or
    /// its whole group is default. When several members carry different
    /// explicit non-default values the first one wins; the conflict is
    /// logged rather than failed.
    #[must_use]
    pub fn resolve_mirrors(&self, decl: &AnnotationDecl) -> Vec<usize> {
        let mut resolved: Vec<usize> = (0..self.attributes.len()).collect();
        for set in &self.mirror_sets {
            let mut winner: Option<usize> = None;
            for &i in &set.indices {
                let attribute = self.attributes.get(i);
                let Some(value) = decl.get(&attribute.name) else {
                    continue;
                };
                if attribute.default_value.as_ref() == Some(value) {
                    continue;
                }
                match winner {
                    None => winner = Some(i),
                    Some(w) => {
                        let first = self.attributes.get(w);
                        if decl.get(&first.name) != Some(value) {
                            tracing::debug!(
                                annotation = %self.annotation_type,
                                first = %first.name,
                                second = %attribute.name,
                                "mirrored attributes hold different values; keeping the first"
                            );
                        }
                    }
                }
            }
            if let Some(w) = winner {
                for &i in &set.indices {
                    resolved[i] = w;
                }
            }
        }
        resolved
    }
}
