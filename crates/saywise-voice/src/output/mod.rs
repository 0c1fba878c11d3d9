//! Audio outputs for remotely synthesized speech.
//!
//! | Feature        | Backend                                   |
//! |----------------|-------------------------------------------|
//! | (always)       | [`NullOutput`]                            |
//! | `rodio-output` | `speaker::SpeakerOutput` (default device) |

#[cfg(feature = "rodio-output")]
pub mod speaker;

use std::sync::Arc;

use async_trait::async_trait;
use saywise_core::{AudioOutput, SpeechError};

/// Output used when no playback device is compiled in or available.
///
/// Every `play` fails, which makes the orchestrator fall back to the device
/// voice.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

#[async_trait]
impl AudioOutput for NullOutput {
    async fn play(&self, audio: Vec<u8>) -> Result<(), SpeechError> {
        tracing::debug!(bytes = audio.len(), "Dropping remote audio, no output device");
        Err(SpeechError::RemotePlaybackFailed(
            "no audio output device available".to_string(),
        ))
    }

    fn stop(&self) {}
}

/// The best audio output compiled into this build.
pub fn default_output() -> Arc<dyn AudioOutput> {
    #[cfg(feature = "rodio-output")]
    {
        match speaker::SpeakerOutput::spawn() {
            Ok(output) => return Arc::new(output),
            Err(e) => tracing::warn!(error = %e, "Audio output unavailable"),
        }
    }

    Arc::new(NullOutput)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_output_fails_playback() {
        let err = NullOutput.play(vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, SpeechError::RemotePlaybackFailed(_)));
        assert!(err.triggers_fallback());
    }
}
