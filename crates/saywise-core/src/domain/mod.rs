//! Domain types shared by every speech component.
//!
//! These are plain values with no infrastructure dependencies.

mod availability;
mod request;
mod voice;

pub use availability::{Availability, AvailabilityRecord, DEFAULT_AVAILABILITY_TTL};
pub use request::{RequestId, SpeechRequest};
pub use voice::{DeviceVoice, UtteranceHandle, UtteranceRequest, VoiceGender};

use serde::{Deserialize, Serialize};

/// Which engine produced (or attempted) speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Premium network synthesis service.
    Remote,
    /// On-device voice API.
    Local,
}

impl EngineKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of running one request through the orchestrator.
///
/// Transient: handed from the orchestrator to the queue processor and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutcome {
    /// Engine that handled the request last.
    pub engine: EngineKind,
    /// Whether the request was spoken.
    pub success: bool,
    /// Error text when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EngineOutcome {
    pub const fn succeeded(engine: EngineKind) -> Self {
        Self {
            engine,
            success: true,
            error: None,
        }
    }

    pub fn failed(engine: EngineKind, error: impl Into<String>) -> Self {
        Self {
            engine,
            success: false,
            error: Some(error.into()),
        }
    }
}
