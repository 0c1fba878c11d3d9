//! Wire format of the remote synthesis endpoint.
//!
//! The service exposes a single JSON endpoint and dispatches on `type`:
//!
//! ```json
//! { "type": "check-availability" }
//! { "type": "generate-speech", "text": "Hello", "voiceId": "...", "model": "..." }
//! ```
//!
//! Responses carry `voices`, `audioContent` (base64) or `error`.

use serde::{Deserialize, Serialize};

/// Request body sent to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RemoteRequest {
    /// Ask which voices are usable.
    CheckAvailability,

    /// Synthesize `text` with the given voice and model.
    GenerateSpeech {
        text: String,
        #[serde(rename = "voiceId")]
        voice_id: String,
        model: String,
    },
}

impl RemoteRequest {
    pub fn generate(text: impl Into<String>, voice_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self::GenerateSpeech {
            text: text.into(),
            voice_id: voice_id.into(),
            model: model.into(),
        }
    }

    /// Short name for log lines.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CheckAvailability => "check-availability",
            Self::GenerateSpeech { .. } => "generate-speech",
        }
    }
}

/// Response body from the remote service.
///
/// Every field is optional; which ones are present depends on the request
/// and on whether it failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResponse {
    /// Voices available to this account (availability probe).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voices: Option<Vec<serde_json::Value>>,

    /// Base64-encoded audio (synthesis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_content: Option<String>,

    /// Service-reported error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteResponse {
    /// A probe response listing `count` placeholder voices.
    pub fn with_voices(count: usize) -> Self {
        Self {
            voices: Some(
                (0..count)
                    .map(|i| serde_json::json!({ "voice_id": format!("voice-{i}") }))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// A synthesis response carrying base64 audio.
    pub fn with_audio(base64_audio: impl Into<String>) -> Self {
        Self {
            audio_content: Some(base64_audio.into()),
            ..Self::default()
        }
    }

    /// An error response.
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Number of voices reported, zero when the field is missing.
    pub fn voice_count(&self) -> usize {
        self.voices.as_ref().map_or(0, Vec::len)
    }
}
