//! Port definitions (trait abstractions) for speech infrastructure.
//!
//! Ports define the interfaces the orchestration layer expects from engines
//! and devices. They contain no implementation details and use only domain
//! types.
//!
//! # Design Rules
//!
//! - No HTTP, audio-device or OS speech types in any signature
//! - Every trait is object-safe and `Send + Sync`, so adapters can be
//!   swapped at the composition root
//! - Blocking device work belongs behind the adapter, never in the caller

pub mod audio;
pub mod device;
pub mod engine;

pub use audio::AudioOutput;
pub use device::{DeviceVoiceApi, UtteranceEvent, UtteranceListener};
pub use engine::{PreparedSpeech, SynthesisEngine};
