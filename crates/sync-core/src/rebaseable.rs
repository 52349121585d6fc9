use std::fmt;

use collab_sync_common::OperationKey;

use crate::step::Step;

/// A local step paired with its inverse and, once the step has been
/// assigned to an in-flight outbound operation, that operation's key
/// (spec §3, Invariant R1 & P2).
///
/// `Debug`/`Clone` are implemented by hand rather than derived: `D`
/// only ever appears behind `PhantomData<fn() -> D>`, and a naive
/// derive would still demand `D: Debug + Clone` even though no `D`
/// value is ever stored here.
pub struct Rebaseable<D, S: Step<D>> {
    pub step: S,
    pub inverted_step: S,
    pub operation_key: Option<OperationKey>,
    _doc: std::marker::PhantomData<fn() -> D>,
}

impl<D, S: Step<D>> fmt::Debug for Rebaseable<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rebaseable")
            .field("step", &self.step)
            .field("inverted_step", &self.inverted_step)
            .field("operation_key", &self.operation_key)
            .finish()
    }
}

impl<D, S: Step<D>> Clone for Rebaseable<D, S> {
    fn clone(&self) -> Self {
        Self {
            step: self.step.clone(),
            inverted_step: self.inverted_step.clone(),
            operation_key: self.operation_key.clone(),
            _doc: std::marker::PhantomData,
        }
    }
}

impl<D, S: Step<D>> Rebaseable<D, S> {
    /// Builds a `Rebaseable` from a freshly produced local step,
    /// inverting it against the document it was applied to. The
    /// operation key starts empty; `Submit` assigns one the first time
    /// the step is included in a submission (spec §4.5).
    pub fn new(step: S, pre_doc: &D) -> Self {
        let inverted_step = step.invert(pre_doc);
        Self {
            step,
            inverted_step,
            operation_key: None,
            _doc: std::marker::PhantomData,
        }
    }

    pub fn with_key(mut self, key: OperationKey) -> Self {
        self.operation_key = Some(key);
        self
    }

    pub(crate) fn from_parts(step: S, inverted_step: S, operation_key: Option<OperationKey>) -> Self {
        Self {
            step,
            inverted_step,
            operation_key,
            _doc: std::marker::PhantomData,
        }
    }
}
