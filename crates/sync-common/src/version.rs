use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// A server-confirmed document version. `Version::SENTINEL` is one less
/// than any legitimate version and marks a plugin state as
/// uninitialized (spec §3, §4.5 `Uninitialized`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub i64);

impl Version {
    /// The minimum legitimate server version. A fresh document's base
    /// snapshot is returned at this version.
    pub const MIN: Version = Version(0);

    /// One less than `MIN`; plugin state starts here and the editor is
    /// read-only until `version` exceeds it.
    pub const SENTINEL: Version = Version(-1);

    pub fn is_sentinel(self) -> bool {
        self == Version::SENTINEL
    }

    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }
}

impl Add<i64> for Version {
    type Output = Version;
    fn add(self, rhs: i64) -> Version {
        Version(self.0 + rhs)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
