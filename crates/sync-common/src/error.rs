use thiserror::Error;

use crate::id::OperationKey;
use crate::version::Version;

pub type SyncResult<T> = Result<T, SyncError>;

/// Errors the sync core can raise.
///
/// `AlreadyExists` is deliberately `PartialEq`-free noise: it is recovered
/// locally by the sync loop and never reaches `onError`, but callers still
/// need to pattern-match on it to distinguish the two conflict kinds.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Invalid plugin configuration. Thrown synchronously from construction.
    #[error("invalid sync plugin configuration: {0}")]
    Assert(String),

    /// Migration impossible, local schema stale, or an operation encodes
    /// under a schema the local document no longer knows how to adopt.
    #[error("schema conflict: {0}")]
    SchemaConflict(#[from] SchemaConflict),

    /// `submitOperation` reported a conflict on `key` or `version`.
    /// Handled entirely inside `Submit`; never surfaced through `onError`.
    #[error("operation already exists: {key:?}={value}")]
    AlreadyExists { key: ConflictKey, value: i64 },

    /// Raised by the content client for snapshot/stream/submit failures
    /// that aren't conflicts. Treated as transient by the loop.
    #[error("content client error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKey {
    Key,
    Version,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaConflict {
    #[error("Failed to convert the document to the local schema.")]
    MigrationFailed,
    #[error("Cannot convert the snapshot's schema because the local schema is out of date.")]
    LocalSchemaOutOfDate,
    #[error("Cannot process the operation because the local schema is out of date.")]
    OperationSchemaOutOfDate,
}

impl SyncError {
    pub fn operation_key_conflict(key: OperationKey) -> Self {
        // The wire value for a key conflict carries no useful integer; 0
        // is a placeholder, never inspected by callers that match on
        // `ConflictKey::Key`.
        let _ = key;
        SyncError::AlreadyExists {
            key: ConflictKey::Key,
            value: 0,
        }
    }

    pub fn version_conflict(value: Version) -> Self {
        SyncError::AlreadyExists {
            key: ConflictKey::Version,
            value: value.0,
        }
    }
}
