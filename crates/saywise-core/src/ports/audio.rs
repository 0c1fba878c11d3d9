//! Audio output abstraction for remote synthesis playback.

use async_trait::async_trait;

use crate::error::SpeechError;

/// A device audio channel that plays encoded audio (MP3/WAV bytes).
///
/// Object-safe so the remote client can hold `Arc<dyn AudioOutput>`.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Play `audio`, resolving when playback finishes.
    ///
    /// Fails with [`SpeechError::RemotePlaybackFailed`] if the audio cannot be
    /// decoded or played, and [`SpeechError::Cancelled`] if `stop` interrupts it.
    async fn play(&self, audio: Vec<u8>) -> Result<(), SpeechError>;

    /// Stop playback immediately.
    fn stop(&self);
}
