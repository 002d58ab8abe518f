//! Process-wide sync state.

use chrono::{DateTime, Utc};
use core_library::GenerationId;

/// Snapshot of where the sync side of the agent stands.
///
/// Published through a `tokio::sync::watch` channel: writers replace the
/// whole value, readers borrow a consistent copy, so no reader can observe
/// a half-updated state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    /// Completion time of the last cycle that ran to the end.
    pub last_success: Option<DateTime<Utc>>,
    /// Most recent error, cleared by a fully clean cycle.
    pub last_error: Option<String>,
    /// Generation currently promoted, if any.
    pub current_generation: Option<GenerationId>,
    /// Version of the currently published playlist (0 = none yet).
    pub playlist_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_empty() {
        let state = SyncState::default();
        assert!(state.last_success.is_none());
        assert!(state.last_error.is_none());
        assert!(state.current_generation.is_none());
        assert_eq!(state.playlist_version, 0);
    }
}
