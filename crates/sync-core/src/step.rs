//! The step/transform capability consumed from the editor runtime
//! (spec §4.1). This crate does not enumerate step kinds: it is generic
//! over any `S: Step<D>` a host integration supplies.

use serde_json::Value;
use std::fmt::Debug;

use crate::mapping::{Mapping, MappingSlice, StepMap};

/// An invertible, mappable elementary edit over a document `D`.
pub trait Step<D>: Clone + Debug {
    type Error: Debug;

    /// Applies the step, returning the resulting document and the
    /// position map it induced.
    fn apply(&self, doc: &D) -> Result<(D, StepMap), Self::Error>;

    /// Computes the step that undoes `self`, given the document it was
    /// applied to (*before* application, per Invariant R1).
    fn invert(&self, pre_doc: &D) -> Self;

    /// Adjusts `self` by a position mapping, or returns `None` if the
    /// step's effect has been entirely erased by what the mapping
    /// describes.
    fn map(&self, mapping: &MappingSlice<'_>) -> Option<Self>;

    fn to_json(&self) -> Value;

    fn from_json(value: &Value) -> Result<Self, Self::Error>
    where
        Self: Sized;
}

/// Accumulates applied steps and the composite position mapping they
/// induce. This is the "`T`" of spec §4.2's rebase contract. Real
/// editor runtimes own a richer version of this (ProseMirror's
/// `Transform`); [`SimpleTransform`] is a direct, reusable
/// implementation against [`Step`] alone, suitable for any host that
/// doesn't already have its own.
pub trait Transform<D, S: Step<D>> {
    fn current_doc(&self) -> &D;
    fn mapping(&self) -> &Mapping;
    fn mapping_mut(&mut self) -> &mut Mapping;

    /// Attempts to apply `step` to the current document. On success,
    /// appends its map and advances the current document; returns
    /// `false` (leaving the transform untouched) if `step` fails to
    /// apply.
    fn maybe_step(&mut self, step: &S) -> bool;
}

#[derive(Debug, Clone)]
pub struct SimpleTransform<D> {
    doc: D,
    mapping: Mapping,
}

impl<D: Clone> SimpleTransform<D> {
    pub fn new(doc: D) -> Self {
        Self {
            doc,
            mapping: Mapping::new(),
        }
    }
}

impl<D: Clone, S: Step<D>> Transform<D, S> for SimpleTransform<D> {
    fn current_doc(&self) -> &D {
        &self.doc
    }

    fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    fn mapping_mut(&mut self) -> &mut Mapping {
        &mut self.mapping
    }

    fn maybe_step(&mut self, step: &S) -> bool {
        match step.apply(&self.doc) {
            Ok((doc, map)) => {
                self.doc = doc;
                self.mapping.append_map(map);
                true
            }
            Err(_) => false,
        }
    }
}
