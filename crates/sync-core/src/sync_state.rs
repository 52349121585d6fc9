/// The sync loop's state machine (spec §4.5). This is purely
/// descriptive -- `SyncLoop` derives it from `(plugin version, stream
/// presence, in-flight submission)` on demand rather than storing it as
/// its own field, so it can never drift from the state it's describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// `plugin.version == SENTINEL`; no stream yet.
    Uninitialized,
    /// Snapshot/schema calls in flight.
    Initializing,
    /// Stream open at the current version; zero or one operation
    /// in-flight awaiting confirmation.
    Synchronized,
    /// Submission hit a version conflict; waiting for the stream to
    /// catch up before the next submission.
    Blocked,
}
