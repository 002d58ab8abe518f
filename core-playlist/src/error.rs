use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("Malformed playlist descriptor: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, PlaylistError>;
