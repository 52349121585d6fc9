use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{OperationKey, PeerId, SessionId};
use crate::schema::SchemaHash;
use crate::version::Version;

/// `{user, session, time}` attached to a submitted operation. Absent on
/// operations the sync loop synthesizes for itself (e.g. the
/// confirmation read back off the stream never needs one reconstructed
/// locally).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMeta {
    pub user: PeerId,
    pub session: SessionId,
    /// Milliseconds since the Unix epoch. Kept as a plain integer rather
    /// than a calendar type since the only thing the core does with it
    /// is compare against the schema-change watermark.
    pub time: i64,
}

/// A server-acknowledged, versioned batch of edits over one document
/// (spec §3). `data` is either a serialized document tree (the initial
/// snapshot operation, at `version = Version::MIN.next()`) or an ordered
/// list of serialized steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub key: OperationKey,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: String,
    pub version: Version,
    pub schema: SchemaHash,
    pub data: OperationData,
    pub meta: Option<OperationMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperationData {
    Snapshot(Value),
    Steps(Vec<Value>),
}

impl OperationData {
    pub fn as_steps(&self) -> Option<&[Value]> {
        match self {
            OperationData::Steps(steps) => Some(steps),
            OperationData::Snapshot(_) => None,
        }
    }
}

/// A full document at a specific version, used to (re)initialize a
/// client. The server synthesizes one at `version = Version::MIN` when
/// no document exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: String,
    pub version: Version,
    pub schema: SchemaHash,
    pub data: Value,
    pub meta: Option<OperationMeta>,
}
