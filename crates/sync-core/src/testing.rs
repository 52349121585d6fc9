//! A minimal flat-text document/step pair implementing [`Step`], plus
//! an in-memory [`ContentClient`] double. Used by this crate's own
//! convergence tests and available to integrators as a worked example
//! of the two trait boundaries this crate consumes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use collab_sync_common::{
    Operation, OperationData, PeerId, SchemaDescriptor, SchemaHash, SchemaKind, SessionId, Snapshot, SyncError, SyncResult, Version,
};

use crate::content_client::{ContentClient, OperationStream};
use crate::editor_host::{DispatchedState, EditorHost, Selection, ViewState};
use crate::mapping::{MapResult, MappingSlice, StepMap};
use crate::plugin_state::PluginState;
use crate::schema_adapter::EditorSchema;
use crate::step::Step;

/// A document that is just a `String`. Positions are byte offsets.
/// Serializes/deserializes as a bare JSON string (newtype transparency),
/// so it round-trips through `document_to_json`/`document_from_snapshot`
/// without a wrapper object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDoc(String);

impl TestDoc {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TestDoc {
    fn from(value: &str) -> Self {
        TestDoc(value.to_string())
    }
}

/// Insert or delete a contiguous run of text at a byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestStep {
    Insert { at: usize, text: String },
    Delete { at: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestStepError;

impl TestStep {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        TestStep::Insert { at, text: text.into() }
    }

    pub fn delete(at: usize, len: usize) -> Self {
        TestStep::Delete { at, len }
    }
}

impl Step<TestDoc> for TestStep {
    type Error = TestStepError;

    fn apply(&self, doc: &TestDoc) -> Result<(TestDoc, StepMap), Self::Error> {
        match self {
            TestStep::Insert { at, text } => {
                if *at > doc.0.len() {
                    return Err(TestStepError);
                }
                let mut next = doc.0.clone();
                next.insert_str(*at, text);
                Ok((TestDoc(next), StepMap::insertion(*at, text.len())))
            }
            TestStep::Delete { at, len } => {
                if at + len > doc.0.len() {
                    return Err(TestStepError);
                }
                let mut next = doc.0.clone();
                next.drain(*at..*at + *len);
                Ok((TestDoc(next), StepMap::deletion(*at, *len)))
            }
        }
    }

    fn invert(&self, pre_doc: &TestDoc) -> Self {
        match self {
            TestStep::Insert { at, text } => TestStep::Delete { at: *at, len: text.len() },
            TestStep::Delete { at, len } => {
                let removed = pre_doc.0[*at..*at + *len].to_string();
                TestStep::Insert { at: *at, text: removed }
            }
        }
    }

    fn map(&self, mapping: &MappingSlice<'_>) -> Option<Self> {
        use crate::mapping::Bias;
        match self {
            TestStep::Insert { at, text } => {
                let MapResult { pos, .. } = mapping.map_pos(*at, Bias::After);
                Some(TestStep::Insert { at: pos, text: text.clone() })
            }
            TestStep::Delete { at, len } => {
                let start = mapping.map_pos(*at, Bias::After);
                let end = mapping.map_pos(at + len, Bias::Before);
                if end.pos <= start.pos {
                    return None;
                }
                Some(TestStep::Delete { at: start.pos, len: end.pos - start.pos })
            }
        }
    }

    fn to_json(&self) -> Value {
        match self {
            TestStep::Insert { at, text } => json!({"kind": "insert", "at": at, "text": text}),
            TestStep::Delete { at, len } => json!({"kind": "delete", "at": at, "len": len}),
        }
    }

    fn from_json(value: &Value) -> Result<Self, Self::Error> {
        let kind = value.get("kind").and_then(Value::as_str).ok_or(TestStepError)?;
        match kind {
            "insert" => {
                let at = value.get("at").and_then(Value::as_u64).ok_or(TestStepError)? as usize;
                let text = value.get("text").and_then(Value::as_str).ok_or(TestStepError)?;
                Ok(TestStep::Insert { at, text: text.to_string() })
            }
            "delete" => {
                let at = value.get("at").and_then(Value::as_u64).ok_or(TestStepError)? as usize;
                let len = value.get("len").and_then(Value::as_u64).ok_or(TestStepError)? as usize;
                Ok(TestStep::Delete { at, len })
            }
            _ => Err(TestStepError),
        }
    }
}

/// An in-memory [`ContentClient`] backed by a shared, append-only
/// operation log behind a mutex -- one instance per simulated server,
/// shared by however many `FakeContentClient` handles stand in for
/// peers (spec's "content client" out-of-scope collaborator).
pub struct FakeServer {
    log: Mutex<Vec<Operation>>,
    schemas: Mutex<Vec<SchemaDescriptor>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            schemas: Mutex::new(Vec::new()),
        }
    }
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FakeContentClient<'a> {
    server: &'a FakeServer,
    doc_type: String,
    id: String,
    user_id: PeerId,
    session_id: SessionId,
    active: bool,
}

impl<'a> FakeContentClient<'a> {
    pub fn new(server: &'a FakeServer, doc_type: impl Into<String>, id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            server,
            doc_type: doc_type.into(),
            id: id.into(),
            user_id: user_id.into(),
            session_id: "test-session".to_string(),
            active: true,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[async_trait]
impl<'a> ContentClient for FakeContentClient<'a> {
    async fn register_schema(&self, schema: &SchemaDescriptor) -> SyncResult<()> {
        let mut schemas = self.server.schemas.lock().unwrap();
        if !schemas.iter().any(|s| s.hash() == schema.hash()) {
            schemas.push(schema.clone());
        }
        Ok(())
    }

    async fn get_schema(&self, hash: &SchemaHash) -> SyncResult<Option<SchemaDescriptor>> {
        let schemas = self.server.schemas.lock().unwrap();
        Ok(schemas.iter().find(|s| s.hash() == hash).cloned())
    }

    async fn get_snapshot(&self, _doc_type: &str, _id: &str, at_most_version: Version) -> SyncResult<Snapshot> {
        let log = self.server.log.lock().unwrap();
        let latest = log.iter().filter(|op| op.version <= at_most_version).last();
        match latest {
            Some(op) => {
                let data = match &op.data {
                    OperationData::Snapshot(value) => value.clone(),
                    OperationData::Steps(_) => json!(null),
                };
                Ok(Snapshot {
                    doc_type: op.doc_type.clone(),
                    id: op.id.clone(),
                    version: op.version,
                    schema: op.schema.clone(),
                    data,
                    meta: op.meta.clone(),
                })
            }
            None => Ok(Snapshot {
                doc_type: self.doc_type.clone(),
                id: self.id.clone(),
                version: Version::MIN,
                schema: SchemaDescriptor::new("doc", "doc", vec![], vec![]).hash().clone(),
                data: json!(""),
                meta: None,
            }),
        }
    }

    async fn submit_operation(&self, op: Operation) -> SyncResult<()> {
        let mut log = self.server.log.lock().unwrap();
        if log.iter().any(|existing| existing.key == op.key) {
            return Err(SyncError::operation_key_conflict(op.key));
        }
        let expected = log.last().map(|o| o.version.next()).unwrap_or(Version::MIN.next());
        if op.version != expected {
            return Err(SyncError::version_conflict(expected));
        }
        log.push(op);
        Ok(())
    }

    async fn stream_operations(&self, _doc_type: &str, _id: &str, from_version: Version, to_version: Version) -> SyncResult<OperationStream<'static>> {
        let log = self.server.log.lock().unwrap();
        let ops: VecDeque<SyncResult<Operation>> = log
            .iter()
            .filter(|op| op.version >= from_version && op.version < to_version)
            .cloned()
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(ops)))
    }

    fn active(&self) -> bool {
        self.active
    }

    fn user_id(&self) -> PeerId {
        self.user_id.clone()
    }

    fn session_id(&self) -> SessionId {
        self.session_id.clone()
    }
}

/// The flat-text document's schema: no node or mark types beyond the
/// implicit root, matching `FakeContentClient::get_snapshot`'s fallback
/// descriptor exactly so a `FakeEditorHost` never sees a schema mismatch
/// against a fresh `FakeServer`.
pub struct FlatTextSchema;

impl EditorSchema for FlatTextSchema {
    fn to_descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor::new("doc", "doc", vec![], vec![])
    }
}

struct FakeEditorHostInner {
    document: TestDoc,
    plugin_state: PluginState<TestDoc, TestStep>,
    selection: Option<Selection>,
    live: bool,
    last_seen_version: Version,
}

/// A test-only [`EditorHost`] backed by shared, mutex-guarded state
/// (spec §9 "editor view"). Cloning shares the same underlying view, so
/// test code can hand one clone to a [`crate::sync_loop::SyncLoop`] and
/// keep mutating another to simulate the editor's own local edits.
#[derive(Clone)]
pub struct FakeEditorHost(Arc<Mutex<FakeEditorHostInner>>);

impl FakeEditorHost {
    pub fn new(document: TestDoc, plugin_state: PluginState<TestDoc, TestStep>) -> Self {
        let last_seen_version = plugin_state.version();
        Self(Arc::new(Mutex::new(FakeEditorHostInner {
            document,
            plugin_state,
            selection: None,
            live: true,
            last_seen_version,
        })))
    }

    /// Applies a local edit the way a real editor transaction would
    /// (spec §4.3 `apply`): appends the step to pending and advances the
    /// document. `last_seen_version` is untouched, so the loop's next
    /// tick sees this as ordinary local progress rather than an
    /// externally replaced plugin state (spec §4.5 step 3).
    pub fn apply_local_step(&self, step: TestStep) {
        let mut inner = self.0.lock().unwrap();
        let pre_doc = inner.document.clone();
        if let Ok((next, _map)) = step.apply(&pre_doc) {
            inner.document = next;
        }
        inner.plugin_state = inner.plugin_state.with_appended_steps(&pre_doc, [step]);
    }

    pub fn set_live(&self, live: bool) {
        self.0.lock().unwrap().live = live;
    }

    pub fn document(&self) -> TestDoc {
        self.0.lock().unwrap().document.clone()
    }
}

impl EditorHost<TestDoc, TestStep> for FakeEditorHost {
    fn is_live(&self) -> bool {
        self.0.lock().unwrap().live
    }

    fn view_state(&self) -> ViewState<TestDoc, TestStep> {
        let inner = self.0.lock().unwrap();
        ViewState {
            document: inner.document.clone(),
            plugin_state: inner.plugin_state.clone(),
            selection: inner.selection,
        }
    }

    fn document_from_snapshot(&self, data: &Value, _old_schema: Option<&SchemaDescriptor>, _local_schema: &SchemaDescriptor) -> TestDoc {
        serde_json::from_value(data.clone()).unwrap_or_else(|_| TestDoc::from(""))
    }

    fn document_to_json(&self, document: &TestDoc) -> Value {
        serde_json::to_value(document).expect("TestDoc always serializes")
    }

    fn dispatch(&mut self, state: DispatchedState<TestDoc, TestStep>) {
        let mut inner = self.0.lock().unwrap();
        match state {
            DispatchedState::PluginState(plugin_state) => {
                inner.last_seen_version = plugin_state.version();
                inner.plugin_state = plugin_state;
            }
            DispatchedState::NewEditorState { document, plugin_state } => {
                inner.last_seen_version = plugin_state.version();
                inner.document = document;
                inner.plugin_state = plugin_state;
            }
        }
    }

    fn dispatch_rebased(
        &mut self,
        new_version: Version,
        document: TestDoc,
        plugin_state: PluginState<TestDoc, TestStep>,
        _rebased_count: usize,
        new_selection: Option<Selection>,
        _mapping: &MappingSlice<'_>,
    ) {
        let mut inner = self.0.lock().unwrap();
        inner.document = document;
        inner.plugin_state = plugin_state;
        inner.selection = new_selection;
        inner.last_seen_version = new_version;
    }

    fn last_seen_version(&self) -> Version {
        self.0.lock().unwrap().last_seen_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_invert_restores_the_predocument() {
        let doc = TestDoc::from("hi");
        let step = TestStep::insert(1, "XY");
        let (after, _map) = step.apply(&doc).unwrap();
        let inverse = step.invert(&doc);
        let (restored, _map) = inverse.apply(&after).unwrap();
        assert_eq!(restored, doc);
    }

    #[test]
    fn json_round_trip() {
        let step = TestStep::delete(1, 3);
        let value = step.to_json();
        let parsed = TestStep::from_json(&value).unwrap();
        assert_eq!(step, parsed);
    }
}
