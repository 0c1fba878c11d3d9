use serde::{Deserialize, Serialize};

/// Handle of a local utterance, valid while that utterance is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtteranceHandle(pub u64);

impl std::fmt::Display for UtteranceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "utterance-{}", self.0)
    }
}

/// Voice gender as reported by the device, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceGender {
    Female,
    Male,
}

/// A voice installed on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceVoice {
    /// Platform-specific identifier.
    pub id: String,

    /// Human-readable name (e.g. "Google UK English Female").
    pub name: String,

    /// BCP-47 style locale, e.g. `en-GB`.
    pub language: String,

    /// Gender, if the platform reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<VoiceGender>,
}

impl DeviceVoice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            gender: None,
        }
    }

    #[must_use]
    pub const fn with_gender(mut self, gender: VoiceGender) -> Self {
        self.gender = Some(gender);
        self
    }
}

/// Everything the device engine needs to speak one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtteranceRequest {
    pub handle: UtteranceHandle,
    pub text: String,
    /// Speed multiplier, 1.0 = the engine's normal rate.
    pub rate: f32,
    /// Pitch multiplier, 1.0 = the engine's normal pitch.
    pub pitch: f32,
    /// Volume, 0.0–1.0.
    pub volume: f32,
    /// Preferred voice; `None` uses the runtime default.
    pub voice: Option<DeviceVoice>,
}
