//! Core error types.

use std::fmt;

/// Errors raised while translating one gateway request.
#[derive(Debug)]
pub enum Error {
    /// Request body exceeded the configured limit.
    BodyTooLarge { limit: usize },

    /// Request body could not be read from the connection.
    Body(String),

    /// Request JSON could not be decoded into the RPC message.
    BadJson(String),

    /// Response message could not be encoded as JSON.
    Encode(String),

    /// The RPC call returned a non-OK status.
    Status(tonic::Status),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BodyTooLarge { limit } => {
                write!(f, "request body exceeds {} bytes", limit)
            }
            Error::Body(msg) => write!(f, "failed to read request body: {}", msg),
            Error::BadJson(msg) => write!(f, "invalid request JSON: {}", msg),
            Error::Encode(msg) => write!(f, "failed to encode response: {}", msg),
            Error::Status(status) => {
                write!(f, "rpc error: {:?}: {}", status.code(), status.message())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Status(status) => Some(status),
            _ => None,
        }
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        Error::Status(status)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::BadJson(e.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::BodyTooLarge { limit: 1024 };
        assert_eq!(err.to_string(), "request body exceeds 1024 bytes");

        let err: Error = tonic::Status::not_found("no such user").into();
        assert_eq!(err.to_string(), "rpc error: NotFound: no such user");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::BadJson(_)));
    }
}
