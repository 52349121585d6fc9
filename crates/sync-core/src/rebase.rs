//! The rebase engine (spec §4.2): given pending local steps and a batch
//! of foreign steps, produces the pending steps rebased onto the
//! foreign edits.

use tracing::{debug_span, trace, warn};

use crate::rebaseable::Rebaseable;
use crate::step::{Step, Transform};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebaseOutcome {
    pub kept: usize,
    pub discarded: usize,
}

/// Rebases `pending` onto `foreign`, starting `transform` from the
/// current document. Returns the transform (now holding the undo,
/// foreign, and rebased-redo steps as one composite), the rebased
/// pending list, and a count of how many pending steps survived vs.
/// were discarded because their effect collided with a foreign edit.
///
/// Passing an empty `foreign` must return `pending` unchanged (up to
/// step identity) -- the "rebase idempotence" property in spec §8.
pub fn rebase<D, S, T>(mut transform: T, pending: &[Rebaseable<D, S>], foreign: &[S]) -> (T, Vec<Rebaseable<D, S>>, RebaseOutcome)
where
    D: Clone,
    S: Step<D>,
    T: Transform<D, S>,
{
    let _span = debug_span!("rebase", pending = pending.len(), foreign = foreign.len()).entered();

    // 1. Undo local: apply the inverted steps in reverse order.
    for r in pending.iter().rev() {
        let ok = transform.maybe_step(&r.inverted_step);
        debug_assert!(ok, "a pending step's own inverse must always apply to the document it produced");
        if !ok {
            warn!("failed to undo a pending step; plugin state invariant P1 has been violated");
        }
    }

    // 2. Apply foreign: apply each foreign step in order.
    for step in foreign {
        let ok = transform.maybe_step(step);
        if !ok {
            warn!("a foreign operation's step failed to apply; the local document may have diverged from the server");
        }
    }

    // 3. Reapply local, rebased.
    let mut map_from = pending.len();
    let mut rebased = Vec::with_capacity(pending.len());
    let mut outcome = RebaseOutcome::default();

    for r in pending {
        let slice = transform.mapping().slice(map_from);
        let mapped = r.step.map(&slice);
        map_from -= 1;

        let Some(mapped_step) = mapped else {
            trace!(operation_key = ?r.operation_key, "discarding pending step: position erased by mapping");
            outcome.discarded += 1;
            continue;
        };

        let pre_doc = transform.current_doc().clone();
        if transform.maybe_step(&mapped_step) {
            let new_index = transform.mapping().len() - 1;
            transform.mapping_mut().set_mirror(map_from, new_index);
            let inverted = mapped_step.invert(&pre_doc);
            rebased.push(Rebaseable::from_parts(mapped_step, inverted, r.operation_key.clone()));
            outcome.kept += 1;
        } else {
            trace!(operation_key = ?r.operation_key, "discarding pending step: collided with foreign edit on reapply");
            outcome.discarded += 1;
        }
    }

    (transform, rebased, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::SimpleTransform;
    use crate::testing::{TestDoc, TestStep};

    fn reb(step: TestStep, pre: &TestDoc) -> Rebaseable<TestDoc, TestStep> {
        Rebaseable::new(step, pre)
    }

    #[test]
    fn idempotence_with_no_foreign_steps() {
        let doc = TestDoc::from("hi");
        let mut pending = Vec::new();
        let step = TestStep::insert(2, "!");
        pending.push(reb(step.clone(), &doc));
        let after = step.apply(&doc).unwrap().0;

        let transform = SimpleTransform::new(after);
        let (_t, rebased, outcome) = rebase(transform, &pending, &[]);
        assert_eq!(outcome, RebaseOutcome { kept: 1, discarded: 0 });
        assert_eq!(rebased[0].step.to_json(), pending[0].step.to_json());
    }

    #[test]
    fn offline_burst_two_pending_steps() {
        // Start: "hi". Local pending: insert "A" at 2, then insert "B" at 3.
        let base = TestDoc::from("hi");
        let step_a = TestStep::insert(2, "A");
        let (after_a, _) = step_a.apply(&base).unwrap();
        let step_b = TestStep::insert(3, "B");
        let (after_b, _) = step_b.apply(&after_a).unwrap();

        let pending = vec![reb(step_a, &base), reb(step_b, &after_a)];

        // Foreign: insert "X" at 2 (before pending ever touched the doc),
        // then insert "Y" at 3.
        let foreign_base = base.clone();
        let step_x = TestStep::insert(2, "X");
        let (after_x, _) = step_x.apply(&foreign_base).unwrap();
        let step_y = TestStep::insert(3, "Y");

        let transform = SimpleTransform::new(after_b);
        let (transform, rebased, outcome) = rebase(transform, &pending, &[step_x, step_y]);
        assert_eq!(outcome, RebaseOutcome { kept: 2, discarded: 0 });
        assert_eq!(transform.current_doc().as_str(), "XYhiAB");
        let _ = after_x;
    }

    use proptest::prelude::*;

    proptest! {
        /// Rebasing any sequence of pending inserts onto an empty foreign
        /// batch must return every step unchanged and discard none (the
        /// "rebase idempotence" property, spec §8).
        #[test]
        fn rebase_with_no_foreign_steps_is_idempotent(ops in prop::collection::vec((0usize..40, "[a-zA-Z]{1,5}"), 1..8)) {
            let mut doc = TestDoc::from("hello world");
            let mut pending = Vec::new();
            for (raw_at, text) in ops {
                let at = raw_at % (doc.as_str().len() + 1);
                let step = TestStep::insert(at, text);
                let pre = doc.clone();
                let (after, _map) = step.apply(&pre).unwrap();
                pending.push(reb(step, &pre));
                doc = after;
            }

            let transform = SimpleTransform::new(doc);
            let (_t, rebased, outcome) = rebase(transform, &pending, &[]);

            prop_assert_eq!(outcome.discarded, 0);
            prop_assert_eq!(rebased.len(), pending.len());
            for (r, p) in rebased.iter().zip(pending.iter()) {
                prop_assert_eq!(r.step.to_json(), p.step.to_json());
            }
        }
    }
}
