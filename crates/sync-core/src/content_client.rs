//! The content client contract the sync loop drives (spec §6). A host
//! integration implements this against its real transport; `testing`
//! ships an in-memory double for this crate's own tests.

use async_trait::async_trait;
use futures::stream::BoxStream;

use collab_sync_common::{Operation, PeerId, SchemaDescriptor, SessionId, SyncResult, Version};

/// A lazy, strictly-`version`-increasing sequence of remote operations,
/// closable by dropping it. Errors surface as stream items rather than
/// a side channel, matching the one-`await`-point-at-a-time model the
/// sync loop's driver assumes.
pub type OperationStream<'a> = BoxStream<'a, SyncResult<Operation>>;

/// The typed interface the sync loop calls through (spec §6). `active`
/// gates everything else: the loop parks while it is `false` and wakes
/// when it flips to `true`.
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Registers a schema with the server. Idempotent: registering an
    /// already-known schema is a no-op from the caller's perspective.
    async fn register_schema(&self, schema: &SchemaDescriptor) -> SyncResult<()>;

    async fn get_schema(&self, hash: &collab_sync_common::SchemaHash) -> SyncResult<Option<SchemaDescriptor>>;

    /// Never fails with "not found" -- returns a synthetic base
    /// snapshot at `Version::MIN` when no document exists yet.
    async fn get_snapshot(&self, doc_type: &str, id: &str, at_most_version: Version) -> SyncResult<collab_sync_common::Snapshot>;

    /// Fails with `SyncError::AlreadyExists` on a key or version
    /// conflict; the loop recovers from both without surfacing them.
    async fn submit_operation(&self, op: Operation) -> SyncResult<()>;

    /// A lazy sequence of operations in `[from_version, to_version)`,
    /// strictly increasing in `version`. Dropping the returned stream
    /// is how the loop "destroys" it on invalidation.
    async fn stream_operations(&self, doc_type: &str, id: &str, from_version: Version, to_version: Version) -> SyncResult<OperationStream<'static>>;

    /// Authentication/connection gate. The loop parks all other calls
    /// while this is `false`.
    fn active(&self) -> bool;

    fn user_id(&self) -> PeerId;

    fn session_id(&self) -> SessionId;
}
