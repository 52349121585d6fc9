//! The public facade a host editor integration depends on: re-exports
//! the sync core's types and adds the plugin builder that validates
//! construction-time configuration (spec §6 "Plugin configuration")
//! and wires a [`SyncLoop`] into a [`WorkLoop`] driver.

pub use collab_sync_common::{
    ConflictKey, MarkSpec, NodeSpec, Operation, OperationKey, OperationMeta, PeerId, SchemaConflict, SchemaDescriptor, SchemaHash, SchemaKind,
    SessionId, Snapshot, SyncError, SyncResult, Version,
};
pub use collab_sync_core::{
    rebase, Bias, ContentClient, DispatchedState, EditorHost, Mapping, MapResult, PluginState, Rebaseable, RebaseOutcome, Selection, Step, StepMap,
    SyncConfig, SyncLoop, SyncState, Transform, ViewState,
};

use std::sync::Arc;

use tracing::error;

use collab_sync_core::scheduler::{Notifier, WorkLoop};
use collab_sync_core::schema_adapter::EditorSchema;
use collab_sync_core::sync_loop::SyncLoopArgs;

/// Invoked with any error that isn't fully recovered locally (spec §7:
/// "the default `onError` re-throws; callers may override"). The
/// default implementation just logs through `tracing`.
pub type ErrorHandler = Arc<dyn Fn(SyncError) + Send + Sync>;

fn default_on_error(error: SyncError) {
    error!(%error, "unhandled sync plugin error");
}

/// Builds a [`SyncPlugin`], validating configuration synchronously
/// before any async work starts (spec §7: "`Assert` fails fast").
pub struct PluginBuilder<D, S, H, C, ES, N>
where
    S: Step<D>,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema,
    N: Fn() -> i64 + Send,
{
    doc_type: Option<String>,
    id: Option<String>,
    host: Option<H>,
    content_client: Option<C>,
    local_schema: Option<ES>,
    now_millis: Option<N>,
    on_error: Option<ErrorHandler>,
    config: SyncConfig,
    _doc: std::marker::PhantomData<fn() -> (D, S)>,
}

impl<D, S, H, C, ES, N> PluginBuilder<D, S, H, C, ES, N>
where
    D: Clone + Send + Sync,
    S: Step<D> + Send + Sync,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema + Send + Sync,
    N: Fn() -> i64 + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            doc_type: None,
            id: None,
            host: None,
            content_client: None,
            local_schema: None,
            now_millis: None,
            on_error: None,
            config: SyncConfig::default(),
            _doc: std::marker::PhantomData,
        }
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn host(mut self, host: H) -> Self {
        self.host = Some(host);
        self
    }

    pub fn content_client(mut self, content_client: C) -> Self {
        self.content_client = Some(content_client);
        self
    }

    pub fn local_schema(mut self, local_schema: ES) -> Self {
        self.local_schema = Some(local_schema);
        self
    }

    pub fn now_millis(mut self, now_millis: N) -> Self {
        self.now_millis = Some(now_millis);
        self
    }

    pub fn on_error(mut self, handler: impl Fn(SyncError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates configuration and builds the plugin (spec §6: "`type`
    /// and `id` must be [non-empty] strings; `contentClient` must be a
    /// non-null object"). Every branch here is synchronous, matching
    /// `Assert`'s "thrown synchronously from plugin construction".
    pub fn build(self) -> SyncResult<SyncPlugin<D, S, H, C, ES, N>> {
        let doc_type = self
            .doc_type
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SyncError::Assert("`type` must be a non-empty string".to_string()))?;
        let id = self
            .id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SyncError::Assert("`id` must be a non-empty string".to_string()))?;
        let host = self.host.ok_or_else(|| SyncError::Assert("a host is required".to_string()))?;
        let content_client = self
            .content_client
            .ok_or_else(|| SyncError::Assert("`contentClient` must be provided".to_string()))?;
        let local_schema = self
            .local_schema
            .ok_or_else(|| SyncError::Assert("a local schema is required".to_string()))?;
        let now_millis = self.now_millis.ok_or_else(|| SyncError::Assert("a clock source is required".to_string()))?;
        let on_error = self.on_error.unwrap_or_else(|| Arc::new(default_on_error));

        Ok(SyncPlugin {
            args: Some(SyncLoopArgs {
                doc_type,
                id,
                host,
                client: content_client,
                local_schema,
                now_millis,
                config: self.config,
                on_error: Some(on_error),
            }),
        })
    }
}

impl<D, S, H, C, ES, N> Default for PluginBuilder<D, S, H, C, ES, N>
where
    D: Clone + Send + Sync,
    S: Step<D> + Send + Sync,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema + Send + Sync,
    N: Fn() -> i64 + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A validated, not-yet-running sync plugin. `spawn` hands it to a
/// [`WorkLoop`] driver and returns a [`Notifier`] the host can use to
/// wake the loop (spec §4.5 driver: editor-state-changed, `active`,
/// stream-close, and async-completion notifications all funnel
/// through the same primitive).
pub struct SyncPlugin<D, S, H, C, ES, N>
where
    S: Step<D>,
    H: EditorHost<D, S>,
    C: ContentClient,
    ES: EditorSchema,
{
    args: Option<SyncLoopArgs<D, S, H, C, ES, N>>,
}

impl<D, S, H, C, ES, N> SyncPlugin<D, S, H, C, ES, N>
where
    D: Clone + Send + Sync + 'static,
    S: Step<D> + Send + Sync + 'static,
    H: EditorHost<D, S> + 'static,
    C: ContentClient + 'static,
    ES: EditorSchema + Send + Sync + 'static,
    N: Fn() -> i64 + Send + Sync + 'static,
{
    /// Starts the work loop as a `tokio` task, returning a [`Notifier`]
    /// to wake it and a `JoinHandle` for cooperative shutdown.
    pub fn spawn(mut self) -> (Notifier, tokio::task::JoinHandle<()>) {
        let args = self.args.take().expect("spawn is only called once");
        let work_loop = WorkLoop::new(move |notifier| SyncLoop::new(args, notifier));
        let notifier = work_loop.notifier();
        let handle = tokio::spawn(work_loop.run());
        (notifier, handle)
    }
}
