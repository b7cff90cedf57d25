//! Aggregate storage and distance-ordered streaming
//!
//! One [`Aggregate`] holds the direct annotations found at a single
//! hierarchy level, each paired with its type-mapping list. Streaming a set
//! of aggregates keeps one cursor per direct annotation and always emits
//! the lowest-distance ready candidate next (a k-way merge by distance),
//! so the overall order is aggregate index ascending, then distance
//! ascending, then declaration order.

use crate::mapped::MergedAnnotation;
use crate::mappings::AnnotationTypeMappings;
use annot_model::{AnnotationDecl, TypeRegistry};
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct Aggregate {
    pub(crate) index: usize,
    pub(crate) entries: Vec<(AnnotationDecl, Arc<AnnotationTypeMappings>)>,
}

impl Aggregate {
    pub(crate) fn new(
        index: usize,
        entries: Vec<(AnnotationDecl, Arc<AnnotationTypeMappings>)>,
    ) -> Self {
        Self { index, entries }
    }
}

/// Single-pass iterator over every mapping of every aggregate
pub(crate) struct MergedIter<'a, 'r> {
    registry: &'r TypeRegistry,
    aggregates: &'a [Aggregate],
    aggregate_pos: usize,
    /// One mapping-list cursor per entry of the current aggregate
    cursors: Vec<usize>,
}

impl<'a, 'r> MergedIter<'a, 'r> {
    pub(crate) fn new(registry: &'r TypeRegistry, aggregates: &'a [Aggregate]) -> Self {
        let cursors = aggregates
            .first()
            .map(|agg| vec![0; agg.entries.len()])
            .unwrap_or_default();
        Self {
            registry,
            aggregates,
            aggregate_pos: 0,
            cursors,
        }
    }
}

impl<'a, 'r> Iterator for MergedIter<'a, 'r> {
    type Item = MergedAnnotation<'r>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let aggregate = self.aggregates.get(self.aggregate_pos)?;

            // Lowest-distance ready cursor; declaration order breaks ties.
            let mut best: Option<(usize, usize)> = None;
            for (entry_pos, cursor) in self.cursors.iter().enumerate() {
                let (_, mappings) = &aggregate.entries[entry_pos];
                if *cursor >= mappings.len() {
                    continue;
                }
                let distance = mappings.get(*cursor).distance();
                match best {
                    Some((_, best_distance)) if best_distance <= distance => {}
                    _ => best = Some((entry_pos, distance)),
                }
            }

            match best {
                Some((entry_pos, _)) => {
                    let mapping_index = self.cursors[entry_pos];
                    self.cursors[entry_pos] += 1;
                    let (decl, mappings) = &aggregate.entries[entry_pos];
                    return Some(MergedAnnotation::mapped(
                        self.registry,
                        Arc::clone(mappings),
                        mapping_index,
                        decl.clone(),
                        aggregate.index,
                    ));
                }
                None => {
                    self.aggregate_pos += 1;
                    self.cursors = self
                        .aggregates
                        .get(self.aggregate_pos)
                        .map(|agg| vec![0; agg.entries.len()])
                        .unwrap_or_default();
                }
            }
        }
    }
}
