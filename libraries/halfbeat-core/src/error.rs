//! Errors reported by backend collaborators
use thiserror::Error;

/// Result type alias using `UpstreamError`
pub type Result<T> = std::result::Result<T, UpstreamError>;

/// Failure of a backend collaborator (URL issuance, cache index, persistence)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Backend could not be reached
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// Backend answered with an error status
    #[error("Backend error ({status}): {message}")]
    Status {
        /// HTTP-like status code
        status: u16,
        /// Body or reason returned by the backend
        message: String,
    },

    /// Credentials missing or rejected upstream
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Response could not be understood
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Backend answered but had nothing playable for the reference
    #[error("No playable stream: {0}")]
    NoStream(String),
}

impl UpstreamError {
    /// Create an unreachable error
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a no-stream error
    pub fn no_stream(msg: impl Into<String>) -> Self {
        Self::NoStream(msg.into())
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
