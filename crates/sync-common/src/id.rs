use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the local user, as reported by the content client.
pub type PeerId = String;

/// Identity of the local connection/session, as reported by the content
/// client.
pub type SessionId = String;

/// A client-generated unique identifier for an in-flight outbound
/// operation. Used to detect duplicate submissions (`AlreadyExists{key:
/// "key", ..}`) and to group the contiguous run of pending steps that
/// belong to the same submission (Invariant P2).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey(String);

impl OperationKey {
    /// Mints a fresh key. Uniqueness only needs to hold for the lifetime
    /// of one editor session talking to one document, so a v4 UUID is
    /// overkill but cheap and never requires coordination with peers.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OperationKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}
