//! Shared wire types for the collaborative editing sync core.
//!
//! This crate plays the role the `loro-common` crate plays for Loro: it
//! holds the small, dependency-light vocabulary (identifiers, errors, the
//! schema and operation wire shapes) that both the sync engine
//! (`collab-sync-core`) and a host integration (`collab-sync-client`)
//! need to agree on.

mod error;
mod id;
mod operation;
mod schema;
mod version;

pub use error::{ConflictKey, SchemaConflict, SyncError, SyncResult};
pub use id::{OperationKey, PeerId, SessionId};
pub use operation::{Operation, OperationMeta, Snapshot};
pub use schema::{MarkSpec, NodeSpec, SchemaDescriptor, SchemaHash, SchemaKind};
pub use version::Version;
