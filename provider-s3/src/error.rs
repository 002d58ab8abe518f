//! Error types for the S3-compatible store provider

use thiserror::Error;

/// S3 provider errors
#[derive(Error, Debug)]
pub enum S3Error {
    /// The store returned a non-success status
    #[error("Store API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Object key does not exist
    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    /// Failed to parse a listing response
    #[error("Failed to parse listing response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for S3 provider operations
pub type Result<T> = std::result::Result<T, S3Error>;

impl From<S3Error> for bridge_traits::error::BridgeError {
    fn from(error: S3Error) -> Self {
        match error {
            S3Error::ObjectNotFound { key } => bridge_traits::error::BridgeError::NotFound(key),
            S3Error::ApiError {
                status_code: 404,
                message,
            } => bridge_traits::error::BridgeError::NotFound(message),
            S3Error::ApiError {
                status_code,
                message,
            } => bridge_traits::error::BridgeError::Unavailable(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            S3Error::NetworkError(msg) => {
                bridge_traits::error::BridgeError::Unavailable(format!("Network error: {}", msg))
            }
            S3Error::ParseError(msg) => {
                bridge_traits::error::BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            S3Error::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = S3Error::ApiError {
            status_code: 503,
            message: "Slow Down".to_string(),
        };
        assert_eq!(error.to_string(), "Store API error (status 503): Slow Down");
    }

    #[test]
    fn test_not_found_maps_to_bridge_not_found() {
        let error = S3Error::ObjectNotFound {
            key: "lobby/dev1/media/a.mp4".to_string(),
        };
        let bridge: bridge_traits::error::BridgeError = error.into();
        assert!(matches!(
            bridge,
            bridge_traits::error::BridgeError::NotFound(_)
        ));
    }

    #[test]
    fn test_server_error_maps_to_unavailable() {
        let error = S3Error::ApiError {
            status_code: 500,
            message: "internal".to_string(),
        };
        let bridge: bridge_traits::error::BridgeError = error.into();
        assert!(bridge.is_transient());
    }
}
