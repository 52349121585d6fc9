//! The central state machine (spec §4.5): initializes the document from
//! a snapshot, maintains the operation stream, submits local edits, and
//! rebases incoming foreign operations against outstanding ones.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, debug_span, error, info, warn};

use collab_sync_common::{Operation, OperationData, OperationMeta, SchemaConflict, SyncError, SyncResult, Version};

use crate::content_client::{ContentClient, OperationStream};
use crate::editor_host::{DispatchedState, EditorHost, ViewState};
use crate::plugin_state::PluginState;
use crate::rebase::rebase;
use crate::scheduler::{Notifier, Worker};
use crate::schema_adapter::EditorSchema;
use crate::step::{SimpleTransform, Step, Transform};
use crate::sync_state::SyncState;

/// The instant past which the local schema is considered too new to
/// have been the one a remote snapshot was registered under (spec §9
/// open question, resolved conservatively: once disabled it never
/// re-enables for the lifetime of this loop).
#[derive(Debug, Clone, Copy)]
pub struct Watermark {
    allow_schema_change_before: Option<i64>,
}

impl Watermark {
    pub fn new(constructed_at_millis: i64) -> Self {
        Self {
            allow_schema_change_before: Some(constructed_at_millis),
        }
    }

    /// Irreversibly forbids further time-based schema adoption (spec
    /// §4.5 `ReceiveOperation` step 4).
    pub fn disable(&mut self) {
        self.allow_schema_change_before = None;
    }

    /// Whether a remote snapshot/operation timestamped `time` is still
    /// within the window where adopting its schema is acceptable.
    pub fn allows(&self, time: i64) -> bool {
        matches!(self.allow_schema_change_before, Some(t) if time < t)
    }
}

/// Constructor arguments for a [`SyncLoop`]: document identity plus the
/// injected editor runtime and content client handles.
pub struct SyncLoopArgs<D, S, H, C, ES, N>
where
    S: Step<D>,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema,
{
    pub doc_type: String,
    pub id: String,
    pub host: H,
    pub client: C,
    pub local_schema: ES,
    /// `now()` for this runtime, in milliseconds since the epoch. Passed
    /// in rather than read from a clock so the loop stays deterministic
    /// under test.
    pub now_millis: N,
    pub config: crate::config::SyncConfig,
    /// Receives every error that escapes a tick other than
    /// `AlreadyExists`, which is always recovered locally (spec §7: "the
    /// default `onError` re-throws; callers may override"). `None` keeps
    /// the default of just logging through `tracing`.
    pub on_error: Option<std::sync::Arc<dyn Fn(SyncError) + Send + Sync>>,
}

/// The sync loop itself (spec §2 "Sync loop", §4.5). Implements
/// [`Worker`] so a [`crate::scheduler::WorkLoop`] can drive it.
pub struct SyncLoop<D, S, H, C, ES, N>
where
    S: Step<D>,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema,
{
    doc_type: String,
    id: String,
    host: H,
    client: C,
    local_schema: ES,
    now_millis: N,
    config: crate::config::SyncConfig,
    on_error: Option<std::sync::Arc<dyn Fn(SyncError) + Send + Sync>>,
    notify: Notifier,

    stream: Option<OperationStream<'static>>,
    stream_version: Option<Version>,
    min_version_for_submit: Version,
    watermark: Watermark,
    done: bool,

    _doc: std::marker::PhantomData<fn() -> D>,
}

impl<D, S, H, C, ES, N> SyncLoop<D, S, H, C, ES, N>
where
    D: Clone,
    S: Step<D>,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema,
    N: Fn() -> i64 + Send,
{
    pub fn new(args: SyncLoopArgs<D, S, H, C, ES, N>, notify: Notifier) -> Self {
        let now = (args.now_millis)();
        Self {
            doc_type: args.doc_type,
            id: args.id,
            host: args.host,
            client: args.client,
            local_schema: args.local_schema,
            now_millis: args.now_millis,
            config: args.config,
            on_error: args.on_error,
            notify,
            stream: None,
            stream_version: None,
            min_version_for_submit: Version::MIN,
            watermark: Watermark::new(now),
            done: false,
            _doc: std::marker::PhantomData,
        }
    }

    fn current_state(&self, view: &ViewState<D, S>) -> SyncState {
        if view.plugin_state.version().is_sentinel() {
            SyncState::Uninitialized
        } else if self.stream.is_none() || self.stream_version != Some(view.plugin_state.version()) {
            SyncState::Initializing
        } else if self.min_version_for_submit > view.plugin_state.version() + 1 {
            SyncState::Blocked
        } else {
            SyncState::Synchronized
        }
    }

    /// One tick of the iteration contract (spec §4.5).
    async fn tick(&mut self) -> SyncResult<()> {
        // Step 1: view liveness.
        if !self.host.is_live() {
            self.done = true;
            self.stream = None;
            return Ok(());
        }

        // Step 2: consistent snapshot, taken before any await.
        let view = self.host.view_state();
        let v = view.plugin_state.version();

        // Step 3: external replacement invalidates the stream.
        if v != self.host.last_seen_version() {
            debug!(?v, last_seen = ?self.host.last_seen_version(), "plugin state externally replaced; invalidating stream");
            self.stream = None;
            self.stream_version = None;
        }

        // Step 4: content client gate.
        if !self.client.active() {
            return Ok(());
        }

        debug!(state = ?self.current_state(&view), ?v, "tick");

        // Step 5: dispatch on state.
        if v == Version::SENTINEL {
            return self.init_state().await;
        }
        if self.stream.is_none() || self.stream_version != Some(v) {
            return self.init_stream(v).await;
        }
        self.submit(view).await
    }

    async fn init_state(&mut self) -> SyncResult<()> {
        let _span = debug_span!("init_state", doc_type = %self.doc_type, id = %self.id).entered();
        let local_descriptor = self.local_schema.to_descriptor();
        let snapshot = self.client.get_snapshot(&self.doc_type, &self.id, Version(i64::MAX)).await?;

        let mut effective_snapshot = snapshot;
        let mut old_schema = None;
        let needs_registration;

        if effective_snapshot.schema != *local_descriptor.hash() {
            if effective_snapshot.version == Version::MIN {
                needs_registration = true;
            } else {
                let snapshot_time = effective_snapshot.meta.as_ref().map(|m| m.time).unwrap_or(i64::MAX);
                if self.watermark.allows(snapshot_time) {
                    return Err(SyncError::SchemaConflict(SchemaConflict::LocalSchemaOutOfDate));
                }
                let fetched = self
                    .client
                    .get_schema(&effective_snapshot.schema)
                    .await?
                    .ok_or(SyncError::SchemaConflict(SchemaConflict::MigrationFailed))?;
                warn!(old = %fetched.hash(), local = %local_descriptor.hash(), "migrating snapshot to local schema");
                old_schema = Some(fetched);
                needs_registration = true;
            }
        } else {
            needs_registration = false;
        }

        // Build the (possibly migrated) document once, regardless of
        // whether registration is needed, so InitState's final dispatch
        // always hands the host a concrete document of its own type.
        let document = self.host.document_from_snapshot(&effective_snapshot.data, old_schema.as_ref(), &local_descriptor);

        if needs_registration {
            self.client.register_schema(&local_descriptor).await?;
            let meta = OperationMeta {
                user: self.client.user_id(),
                session: self.client.session_id(),
                time: (self.now_millis)(),
            };
            let op = Operation {
                key: collab_sync_common::OperationKey::new_random(),
                doc_type: self.doc_type.clone(),
                id: self.id.clone(),
                version: effective_snapshot.version.next(),
                schema: local_descriptor.hash().clone(),
                data: OperationData::Snapshot(self.host.document_to_json(&document)),
                meta: Some(meta),
            };
            effective_snapshot.version = op.version;
            effective_snapshot.schema = op.schema.clone();
            self.client.submit_operation(op).await?;
        }

        // Bail out if the view is gone or the plugin state moved on while
        // we were awaiting the network (spec §4.5 `InitState`'s final guard).
        let still_uninitialized = self.host.view_state().plugin_state.version() == Version::SENTINEL;
        if !self.host.is_live() || !still_uninitialized {
            return Ok(());
        }

        let new_plugin_state = PluginState::new(effective_snapshot.version, Vec::new());
        self.host.dispatch(DispatchedState::NewEditorState {
            document,
            plugin_state: new_plugin_state,
        });
        self.min_version_for_submit = effective_snapshot.version.next();
        self.notify.notify();
        Ok(())
    }

    async fn init_stream(&mut self, v: Version) -> SyncResult<()> {
        let _span = debug_span!("init_stream", ?v).entered();
        let stream = self
            .client
            .stream_operations(&self.doc_type, &self.id, v.next(), Version(i64::MAX))
            .await?;
        self.stream = Some(stream);
        self.stream_version = Some(v);
        self.notify.notify();
        Ok(())
    }

    /// The `Synchronized` branch. Submits a ready operation when there is
    /// one; otherwise there is nothing useful to do locally, so this
    /// spends the tick's one await point reading the next item off the
    /// stream instead of idling -- the driver only wakes on `notify`, and
    /// "the stream produced an operation" has to reach `receive_operation`
    /// through *some* await. Under a steady flow of local edits this can
    /// delay a pending stream item by one tick; each dispatch still calls
    /// `notify`, so the loop keeps alternating rather than starving either
    /// side.
    async fn submit(&mut self, view: ViewState<D, S>) -> SyncResult<()> {
        let pending = view.plugin_state.pending_steps();

        if pending.is_empty() {
            self.await_stream(&view).await;
            return Ok(());
        }

        if pending[0].operation_key.is_none() {
            let key = collab_sync_common::OperationKey::new_random();
            let next_state = view.plugin_state.with_leading_steps_keyed(key);
            self.host.dispatch(DispatchedState::PluginState(next_state));
            return Ok(());
        }

        let op_version = view.plugin_state.version().next();
        if op_version < self.min_version_for_submit {
            self.await_stream(&view).await;
            return Ok(());
        }

        let group = view.plugin_state.leading_group();
        let key = group[0].operation_key.clone().expect("leading group always has a key");
        let steps: Vec<_> = group.iter().map(|r| r.step.to_json()).collect();

        let op = Operation {
            key: key.clone(),
            doc_type: self.doc_type.clone(),
            id: self.id.clone(),
            version: op_version,
            schema: self.local_schema.to_descriptor().hash().clone(),
            data: OperationData::Steps(steps),
            meta: None,
        };

        self.min_version_for_submit = op_version + 1;

        match self.client.submit_operation(op).await {
            Ok(()) => Ok(()),
            Err(SyncError::AlreadyExists {
                key: collab_sync_common::ConflictKey::Version,
                value,
            }) => {
                self.min_version_for_submit = self.min_version_for_submit.max(Version(value).next());
                Ok(())
            }
            Err(SyncError::AlreadyExists {
                key: collab_sync_common::ConflictKey::Key,
                ..
            }) => {
                // Assume the prior submission under this key succeeded;
                // wait for the stream to deliver its confirmation.
                Ok(())
            }
            Err(other) => {
                self.min_version_for_submit = op_version;
                Err(other)
            }
        }
    }

    /// Awaits the next stream item and routes it to `receive_operation`.
    /// A closed or errored stream is treated as invalidation. This is the
    /// tick's one await point when there is no local submission to make;
    /// the outer [`crate::scheduler::WorkLoop`] still reacts to `notify`
    /// between ticks, so an editor edit made while this await is pending
    /// is picked up on the very next tick once this one resolves.
    async fn await_stream(&mut self, view: &ViewState<D, S>) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        match stream.next().await {
            Some(Ok(op)) => self.receive_operation(op, view, SimpleTransform::new),
            Some(Err(error)) => {
                warn!(%error, "stream reported an error; invalidating");
                self.stream = None;
                self.notify.notify();
            }
            None => {
                debug!("stream closed; will rebuild on the next tick");
                self.stream = None;
                self.notify.notify();
            }
        }
    }

    /// Handles one operation delivered by the stream (spec §4.5
    /// `ReceiveOperation`).
    fn receive_operation(&mut self, op: Operation, view: &ViewState<D, S>, transform_for: impl FnOnce(D) -> SimpleTransform<D>) {
        if self.done {
            return;
        }
        self.stream_version = Some(op.version);

        let expected = view.plugin_state.version().next();
        if op.version != expected {
            warn!(got = ?op.version, expected = ?expected, "stream skipped or replayed a version; rebuilding stream");
            self.stream = None;
            self.notify.notify();
            return;
        }

        let local_hash = self.local_schema.to_descriptor().hash().clone();
        if op.schema != local_hash {
            warn!("incoming operation under a newer remote schema; disabling time-based schema adoption");
            self.watermark.disable();
            self.host.dispatch(DispatchedState::PluginState(PluginState::init()));
            self.notify.notify();
            return;
        }

        if view.plugin_state.is_head_confirmation(&op.key) {
            let confirmed = view.plugin_state.confirm(op.version, &op.key);
            self.host.dispatch(DispatchedState::PluginState(confirmed));
            self.min_version_for_submit = self.min_version_for_submit.max(op.version.next());
            self.notify.notify();
            return;
        }

        let Some(steps_json) = op.data.as_steps() else {
            warn!("foreign operation carried a snapshot instead of steps; ignoring");
            return;
        };
        let foreign: Result<Vec<S>, _> = steps_json.iter().map(S::from_json).collect();
        let Ok(foreign) = foreign else {
            warn!("failed to deserialize a foreign operation's steps");
            return;
        };

        let transform = transform_for(view.document.clone());
        let (transform, rebased, outcome) = rebase(transform, view.plugin_state.pending_steps(), &foreign);
        debug!(kept = outcome.kept, discarded = outcome.discarded, "rebased pending steps against foreign operation");

        let slice = transform.mapping().slice(0);
        let rebased_count = rebased.len();
        let new_document = transform.current_doc().clone();
        let new_state = view.plugin_state.rebased(op.version, rebased);
        let new_selection = view.selection.map(|selection| selection.map(&slice));

        self.host.dispatch_rebased(op.version, new_document, new_state, rebased_count, new_selection, &slice);
        self.min_version_for_submit = self.min_version_for_submit.max(op.version.next());
        self.notify.notify();
    }
}

#[async_trait]
impl<D, S, H, C, ES, N> Worker for SyncLoop<D, S, H, C, ES, N>
where
    D: Clone + Send + Sync,
    S: Step<D> + Send + Sync,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema + Send + Sync,
    N: Fn() -> i64 + Send + Sync,
{
    type Error = SyncError;

    async fn work(&mut self) -> Result<(), Self::Error> {
        self.tick().await
    }

    fn destroy(&mut self) {
        info!("sync loop destroyed");
        self.stream = None;
        self.done = true;
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn on_error(&mut self, error: Self::Error) {
        match error {
            SyncError::AlreadyExists { .. } => {
                debug!("already-exists conflict reached on_error unexpectedly; treating as transient");
            }
            other => {
                warn!(error = %other, "sync loop iteration failed");
                match &self.on_error {
                    Some(handler) => handler(other),
                    None => error!(error = %other, "unhandled sync loop error"),
                }
            }
        }
    }

    fn retry_delay(&self, attempt: u32) -> std::time::Duration {
        self.config.retry_delay(attempt)
    }
}
