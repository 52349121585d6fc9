use collab_sync_common::{OperationKey, Version};

use crate::rebaseable::Rebaseable;
use crate::step::Step;

/// The immutable synchronization state attached to the editor state
/// (spec §3). A new value replaces the old one on every transaction;
/// `pending_steps` is never mutated in place.
#[derive(Debug, Clone)]
pub struct PluginState<D, S: Step<D>> {
    version: Version,
    pending_steps: Vec<Rebaseable<D, S>>,
}

impl<D: Clone, S: Step<D>> PluginState<D, S> {
    pub fn init() -> Self {
        Self {
            version: Version::SENTINEL,
            pending_steps: Vec::new(),
        }
    }

    pub fn new(version: Version, pending_steps: Vec<Rebaseable<D, S>>) -> Self {
        Self {
            version,
            pending_steps,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn pending_steps(&self) -> &[Rebaseable<D, S>] {
        &self.pending_steps
    }

    /// The editor is read-only until initialization completes (spec
    /// §4.3 `editable`).
    pub fn is_editable(&self) -> bool {
        self.version > Version::SENTINEL
    }

    /// Appends steps produced by a local transaction that changed the
    /// document, keeping the same version (spec §4.3 `apply`).
    pub fn with_appended_steps<I>(&self, pre_doc: &D, new_steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let mut pending = self.pending_steps.clone();
        let mut doc = pre_doc.clone();
        for step in new_steps {
            let reb = Rebaseable::new(step.clone(), &doc);
            if let Ok((next, _map)) = step.apply(&doc) {
                doc = next;
            }
            pending.push(reb);
        }
        Self {
            version: self.version,
            pending_steps: pending,
        }
    }

    /// Assigns `key` to every contiguous leading step that currently
    /// lacks one (spec §4.5 `Submit`, step 2).
    pub fn with_leading_steps_keyed(&self, key: OperationKey) -> Self {
        let mut pending = self.pending_steps.clone();
        for r in pending.iter_mut() {
            if r.operation_key.is_some() {
                break;
            }
            r.operation_key = Some(key.clone());
        }
        Self {
            version: self.version,
            pending_steps: pending,
        }
    }

    /// The contiguous leading run of pending steps sharing the head's
    /// operation key (the group `Submit` collects into one operation,
    /// spec §4.5).
    pub fn leading_group(&self) -> &[Rebaseable<D, S>] {
        let Some(key) = self.pending_steps.first().and_then(|r| r.operation_key.as_ref()) else {
            return &[];
        };
        let end = self
            .pending_steps
            .iter()
            .take_while(|r| r.operation_key.as_ref() == Some(key))
            .count();
        &self.pending_steps[..end]
    }

    /// Drops every leading step whose key equals `key`, advancing to
    /// `new_version` -- the confirmation path of `ReceiveOperation`
    /// (spec §4.5, step 5). Asserts Invariant P2 implicitly: only a
    /// contiguous prefix is ever removed.
    pub fn confirm(&self, new_version: Version, key: &OperationKey) -> Self {
        let end = self.pending_steps.iter().take_while(|r| r.operation_key.as_ref() == Some(key)).count();
        Self {
            version: new_version,
            pending_steps: self.pending_steps[end..].to_vec(),
        }
    }

    pub fn rebased(&self, new_version: Version, rebased_steps: Vec<Rebaseable<D, S>>) -> Self {
        Self {
            version: new_version,
            pending_steps: rebased_steps,
        }
    }

    pub fn is_head_confirmation(&self, op_key: &OperationKey) -> bool {
        matches!(self.pending_steps.first(), Some(r) if r.operation_key.as_ref() == Some(op_key))
    }
}
