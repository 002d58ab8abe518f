use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for transport-level failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
