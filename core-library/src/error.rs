use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Pointer file error: {0}")]
    Pointer(String),

    #[error("Invalid filename: {name}")]
    InvalidFilename { name: String },

    #[error("Staged file missing: {name}")]
    StagedFileMissing { name: String },
}

pub type Result<T> = std::result::Result<T, LibraryError>;
