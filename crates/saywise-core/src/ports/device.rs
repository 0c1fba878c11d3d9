//! The on-device voice API, as seen by the local synthesis client.
//!
//! Device engines are callback based: they report the lifecycle of each
//! utterance through an [`UtteranceListener`]. The local client turns those
//! callbacks into a single awaited outcome.

use tokio::sync::watch;

use crate::domain::{DeviceVoice, UtteranceRequest};
use crate::error::SpeechError;

/// Lifecycle events of a single device utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    /// Audio started.
    Started,
    /// Audio finished naturally.
    Ended,
    /// Interrupted by `cancel()` or a newer utterance.
    Cancelled,
    /// The engine reported an error.
    Failed(String),
}

/// Callback receiving [`UtteranceEvent`]s.
///
/// Must be `Send` because platform engines fire events from their own threads.
pub type UtteranceListener = Box<dyn FnMut(UtteranceEvent) + Send + 'static>;

/// Platform speech capability.
///
/// # Implementations
///
/// - A native adapter wrapping the OS speech engine
/// - An "unsupported" adapter for runtimes without one
/// - Test fakes
pub trait DeviceVoiceApi: Send + Sync {
    /// Whether the runtime exposes a speech engine at all.
    fn is_supported(&self) -> bool;

    /// Installed voices. May be empty until the platform has enumerated them.
    fn voices(&self) -> Vec<DeviceVoice>;

    /// Receiver that changes whenever the voice list is (re)populated.
    fn voices_changed(&self) -> watch::Receiver<Vec<DeviceVoice>>;

    /// Start speaking. Lifecycle events arrive through `listener`.
    fn speak(
        &self,
        request: UtteranceRequest,
        listener: UtteranceListener,
    ) -> Result<(), SpeechError>;

    /// Cancel the active utterance, if any.
    fn cancel(&self);
}
