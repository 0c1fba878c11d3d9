#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// tokio-test is only used by the integration tests
#[cfg(test)]
use tokio_test as _;

pub mod context;
pub mod device;
pub mod error;
pub mod local;
pub mod orchestrator;
pub mod output;
pub mod processor;

// Re-export key types for convenience
pub use context::{SpeakDisposition, SpeechContext, SpeechContextBuilder};
pub use device::{UnsupportedDevice, default_device};
pub use error::VoiceError;
pub use local::{LocalSynthesisClient, LocalUtterance};
pub use orchestrator::{EnginePreference, FallbackOrchestrator, OrchestratorPhase, RunReport};
pub use output::{NullOutput, default_output};
pub use processor::QueueProcessor;
