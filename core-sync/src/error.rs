use bridge_traits::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote object vanished: {0}")]
    NotFound(String),

    #[error("Corrupt download for {key}: {reason}")]
    CorruptDownload { key: String, reason: String },

    #[error("Playlist descriptor produced no playable entries")]
    PlaylistInvalid,

    #[error("Promotion aborted: {0}")]
    PromotionAborted(String),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Errors the cycle loop cannot recover from by waiting for the next
    /// tick: the local filesystem is broken, escalate to the supervisor.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Library(_) | Self::Io(_))
    }
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Unavailable(msg) => Self::Unavailable(msg),
            BridgeError::NotFound(key) => Self::NotFound(key),
            BridgeError::OperationFailed(msg) => Self::Unavailable(msg),
            BridgeError::Io(e) => Self::Unavailable(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
