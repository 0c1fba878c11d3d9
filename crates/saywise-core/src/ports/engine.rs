//! Engine-agnostic speech synthesis interface.
//!
//! The fallback orchestrator operates on `Arc<dyn SynthesisEngine>` for both
//! the remote and the local engine, so an engine is picked by its
//! [`EngineKind`] rather than by probing for runtime capabilities.

use async_trait::async_trait;

use crate::domain::{Availability, EngineKind, UtteranceHandle, UtteranceRequest};
use crate::error::SpeechError;

/// Speech that an engine has prepared and can now play.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedSpeech {
    /// Encoded audio fetched from the remote service.
    Audio(Vec<u8>),
    /// An utterance the device engine speaks directly.
    Utterance(UtteranceRequest),
}

/// A text-to-speech engine.
///
/// Implementations must be `Send + Sync` so the orchestrator can hold them
/// across `.await` points.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Which engine this is.
    fn kind(&self) -> EngineKind;

    /// Check whether the engine can serve requests right now.
    ///
    /// Engines may answer from a cache unless `force_refresh` is set.
    async fn probe(&self, force_refresh: bool) -> bool;

    /// Current availability without issuing a probe.
    fn availability(&self) -> Availability {
        Availability::Available
    }

    /// Resolve once no availability probe is in flight.
    async fn wait_for_availability(&self) {}

    /// Prepare the engine for first use (load voices, probe the service).
    ///
    /// Returns whether the engine looks usable afterwards.
    async fn warm_up(&self) -> bool {
        self.probe(false).await
    }

    /// Turn text into something playable.
    async fn synthesize(&self, text: &str) -> Result<PreparedSpeech, SpeechError>;

    /// Play prepared speech, resolving when playback ends.
    ///
    /// `on_started` receives the utterance handle when the engine has one.
    async fn play(
        &self,
        speech: PreparedSpeech,
        on_started: &(dyn Fn(Option<UtteranceHandle>) + Send + Sync),
    ) -> Result<(), SpeechError>;

    /// Stop whatever this engine is currently playing.
    fn stop(&self);

    /// Switch the voice used for subsequent requests.
    fn set_voice(&self, _voice_id: &str) {}
}
