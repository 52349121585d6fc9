//! The editor-view seam (spec §9 "Cyclic/observer patterns" and "Tagged
//! variants"). `EditorHost` is the non-owning handle the loop borrows
//! for its lifetime; it never owns the editor state, only dispatches
//! transactions into it and reads the result back.

use collab_sync_common::{SchemaDescriptor, Version};

use crate::mapping::{Bias, MappingSlice};
use crate::plugin_state::PluginState;
use crate::step::Step;

/// The three kinds of editor selection (spec §9). Only `Text` needs
/// remapping after a foreign operation; `All` and `Node` either have no
/// meaningful endpoints to remap or are left to the host to recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Text { anchor: usize, head: usize },
    All,
    Node { pos: usize },
}

impl Selection {
    /// Maps a text selection's endpoints with bias "before" so the
    /// caret does not jump past content inserted at its position (spec
    /// §4.5 `ReceiveOperation` step 6, §8 "Selection preservation").
    /// Non-text selections pass through unchanged.
    pub fn map(self, slice: &MappingSlice<'_>) -> Selection {
        match self {
            Selection::Text { anchor, head } => Selection::Text {
                anchor: slice.map_pos(anchor, Bias::Before).pos,
                head: slice.map_pos(head, Bias::Before).pos,
            },
            other => other,
        }
    }
}

/// A snapshot of whatever the sync loop needs to read from the editor
/// view on a given tick, taken synchronously before any `await` point
/// (spec §5: "all observations of the editor state take a consistent
/// snapshot before any await").
pub struct ViewState<D, S: Step<D>> {
    pub document: D,
    pub plugin_state: PluginState<D, S>,
    pub selection: Option<Selection>,
}

/// A replacement plugin state to dispatch back into the editor,
/// optionally rebuilding the whole editor state (document + schema)
/// when initialization or reinitialization requires it.
pub enum DispatchedState<D, S: Step<D>> {
    /// Just a new plugin state; the document is unchanged.
    PluginState(PluginState<D, S>),
    /// A brand-new editor state: document rebuilt from a (possibly
    /// migrated) snapshot, fresh plugin state, and the "loop-initiated"
    /// guard set so the next tick's externally-replaced check (spec
    /// §4.5 step 3) does not mistake it for an external replacement.
    NewEditorState {
        document: D,
        plugin_state: PluginState<D, S>,
    },
}

/// The non-owning handle to the live editor view (spec §9). A host
/// integration implements this over its real editor view object; the
/// loop holds one only for the duration of its `work()` call and drops
/// it on `destroy()`.
pub trait EditorHost<D, S: Step<D>>: Send {
    /// `false` once the underlying view has been torn down. The loop
    /// checks this first on every tick and bails out before touching
    /// editor state if it has gone away (spec §4.5 step 1).
    fn is_live(&self) -> bool;

    /// A consistent snapshot of document, plugin state and selection.
    fn view_state(&self) -> ViewState<D, S>;

    /// Builds a document of this host's concrete type from a snapshot's
    /// serialized tree (spec §4.5 `InitState`'s final step). `old_schema`
    /// is `Some` when the snapshot's schema hash differed from
    /// `local_schema`'s and the loop already fetched it, so a host whose
    /// document type implements [`crate::schema_adapter::MigratableNode`]
    /// can run [`crate::schema_adapter::migrate`] itself; a host that
    /// never needs cross-schema documents can ignore both and just
    /// deserialize `data`.
    fn document_from_snapshot(&self, data: &serde_json::Value, old_schema: Option<&SchemaDescriptor>, local_schema: &SchemaDescriptor) -> D;

    /// The inverse of `document_from_snapshot`, used when the loop needs
    /// to submit the (possibly migrated) local document as an initial
    /// snapshot operation (spec §4.5 `InitState`).
    fn document_to_json(&self, document: &D) -> serde_json::Value;

    /// Dispatches a transaction carrying `state` into the editor. For
    /// `NewEditorState`, the host is responsible for tagging the
    /// resulting plugin state as loop-initiated before the next
    /// `last_seen_version` comparison (spec §4.5 `InitState`'s guarded
    /// flag).
    fn dispatch(&mut self, state: DispatchedState<D, S>);

    /// Dispatches a rebase result: the document with the foreign and
    /// rebased-local steps already applied, new plugin state at
    /// `op.version`, tagged so the undo history rebases its own items
    /// (`rebased = |pending|`) and is excluded from the history
    /// (`addToHistory = false`), per spec §4.5 step 6. `new_selection`
    /// is the caller-computed remap of the pre-operation selection
    /// (`Selection::map`, spec §8 "Selection preservation"); `mapping`
    /// is passed alongside it so a host can remap anything else it
    /// tracks (decorations, bookmarks) the same way.
    #[allow(clippy::too_many_arguments)]
    fn dispatch_rebased(
        &mut self,
        new_version: Version,
        document: D,
        plugin_state: PluginState<D, S>,
        rebased_count: usize,
        new_selection: Option<Selection>,
        mapping: &MappingSlice<'_>,
    );

    /// The server version this host last observed the loop reflect, so
    /// the loop can tell an externally-replaced plugin state apart from
    /// its own progress (spec §4.5 step 3).
    fn last_seen_version(&self) -> Version;
}
