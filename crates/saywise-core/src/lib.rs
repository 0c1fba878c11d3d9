#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod ports;
pub mod queue;
pub mod state;
pub mod voice_selection;

// Re-export commonly used types for convenience
pub use config::{ConfigError, LocalVoiceConfig, SpeechConfig};
pub use dedup::{Deduplicator, normalize_text};
pub use domain::{
    Availability, AvailabilityRecord, DEFAULT_AVAILABILITY_TTL, DeviceVoice, EngineKind, EngineOutcome, RequestId,
    SpeechRequest, UtteranceHandle, UtteranceRequest, VoiceGender,
};
pub use error::{FALLBACK_NOTICE, SpeechError};
pub use ports::{
    AudioOutput, DeviceVoiceApi, PreparedSpeech, SynthesisEngine, UtteranceEvent,
    UtteranceListener,
};
pub use queue::RequestQueue;
pub use state::{SpeechState, SpeechStateUpdate, StateStore, Subscription};
pub use voice_selection::{find_voice, select_optimal_voice};
