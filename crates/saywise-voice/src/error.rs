//! Errors raised while assembling or running a speech context.
//!
//! Per-request failures are not errors at this level: they end up in
//! `SpeechState::last_error`. These variants cover construction and the
//! native device plumbing.

use saywise_core::ConfigError;
use saywise_remote::RemoteError;

/// Errors that can occur while building speech components.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Configuration failed validation.
    #[error("Invalid speech configuration: {0}")]
    Config(#[from] ConfigError),

    /// The remote client could not be created.
    #[error("Failed to create remote speech client: {0}")]
    Remote(#[from] RemoteError),

    /// No Tokio runtime is available to drive the queue.
    #[error("A Tokio runtime is required to process speech requests")]
    NoRuntime,

    /// The operating system speech engine could not be initialised.
    #[error("Failed to initialise the device speech engine: {0}")]
    DeviceInit(String),

    /// Failed to open the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStreamError(String),

    /// A dedicated audio/speech thread exited unexpectedly.
    #[error("Speech worker thread died unexpectedly")]
    WorkerThreadDied,
}
