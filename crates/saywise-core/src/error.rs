//! Speech error taxonomy.
//!
//! Engine-level errors never escape the fallback orchestrator: they are turned
//! into state updates and a fallback decision. Only terminal failures reach
//! callers, as the `last_error` text of [`SpeechState`](crate::SpeechState).

/// Notice published in `last_error` when the remote engine failed and the
/// request was spoken by the device voice instead.
pub const FALLBACK_NOTICE: &str = "Premium voice unavailable; using the device voice instead";

/// Errors produced while speaking a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// The runtime has no on-device speech capability.
    #[error("Speech synthesis is not supported on this device (not_supported)")]
    UnsupportedRuntime,

    /// The remote probe reported no usable voices, or the probe itself failed.
    #[error("Remote voice service unavailable: {0}")]
    RemoteUnavailable(String),

    /// The synthesis call failed or returned no audio.
    #[error("Remote speech synthesis failed: {0}")]
    RemoteSynthesisFailed(String),

    /// Audio was fetched but could not be played.
    #[error("Remote audio playback failed: {0}")]
    RemotePlaybackFailed(String),

    /// The device engine reported an error while speaking.
    #[error("Device speech playback failed: {0}")]
    LocalPlaybackFailed(String),

    /// Playback was interrupted by `stop()` or a newer utterance.
    #[error("Speech playback cancelled")]
    Cancelled,
}

impl SpeechError {
    /// Whether this error moves the orchestrator on to the device engine.
    pub const fn triggers_fallback(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable(_) | Self::RemoteSynthesisFailed(_) | Self::RemotePlaybackFailed(_)
        )
    }
}
