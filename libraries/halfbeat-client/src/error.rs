//! Error types for the Halfbeat backend client.

use halfbeat_core::UpstreamError;
use thiserror::Error;

/// Errors that can occur when talking to the Halfbeat backend.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Backend returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Backend rejected the credentials
    #[error("Authentication required")]
    AuthRequired,

    /// Invalid backend URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Request arguments the backend would reject
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failed to parse backend response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Backend is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

impl ClientError {
    /// Classify a transport error
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::ServerUnreachable(err.to_string())
        } else {
            Self::Request(err)
        }
    }
}

impl From<ClientError> for UpstreamError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Request(e) => Self::Unreachable(e.to_string()),
            ClientError::ServerUnreachable(msg) => Self::Unreachable(msg),
            ClientError::ServerError { status, message } if status == 401 || status == 403 => {
                Self::Auth(message)
            }
            ClientError::ServerError { status, message } => Self::Status { status, message },
            ClientError::AuthRequired => Self::Auth("credentials rejected".to_string()),
            ClientError::InvalidRequest(msg) => Self::NoStream(msg),
            ClientError::InvalidUrl(msg) | ClientError::ParseError(msg) => Self::Parse(msg),
        }
    }
}

/// Result type for backend client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
