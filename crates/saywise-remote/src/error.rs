//! Internal error types for remote synthesis.
//!
//! These errors are internal to `saywise-remote` and are mapped to
//! [`SpeechError`] at the boundary.

use saywise_core::SpeechError;
use thiserror::Error;

/// Result type alias for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors talking to the remote synthesis service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The availability cache says the service is down.
    #[error("remote service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with an `error` field.
    #[error("remote service error: {0}")]
    Api(String),

    /// Synthesis succeeded but the response had no audio.
    #[error("no audio content in response")]
    MissingAudio,

    /// `audioContent` was not valid base64.
    #[error("invalid audio payload: {0}")]
    InvalidAudio(#[from] base64::DecodeError),

    /// Non-success HTTP status.
    #[error("request failed with status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Network or HTTP client error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The configured endpoint could not be parsed.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl RemoteError {
    /// Map a synthesis failure to the port error.
    pub fn into_synthesis_failed(self) -> SpeechError {
        match self {
            Self::Unavailable(message) => SpeechError::RemoteUnavailable(message),
            Self::Api(message) => SpeechError::RemoteSynthesisFailed(message),
            other => SpeechError::RemoteSynthesisFailed(other.to_string()),
        }
    }
}
