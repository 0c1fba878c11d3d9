//! Local synthesis client — speech through the on-device voice API.
//!
//! The device API is callback based. [`LocalSynthesisClient::speak`] turns
//! the callbacks of one utterance into a [`LocalUtterance`] whose
//! [`finished`](LocalUtterance::finished) future resolves with the outcome.
//!
//! Only one local utterance is ever active: every `speak` cancels the
//! previous one before starting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use saywise_core::voice_selection::{find_voice, select_optimal_voice};
use saywise_core::{
    Availability, DeviceVoice, DeviceVoiceApi, EngineKind, LocalVoiceConfig, PreparedSpeech,
    SpeechError, SynthesisEngine, UtteranceEvent, UtteranceHandle, UtteranceRequest,
};
use tokio::sync::mpsc;

/// A started device utterance.
#[derive(Debug)]
pub struct LocalUtterance {
    handle: UtteranceHandle,
    events: mpsc::UnboundedReceiver<UtteranceEvent>,
}

impl LocalUtterance {
    pub const fn handle(&self) -> UtteranceHandle {
        self.handle
    }

    /// Resolve when the utterance ends.
    ///
    /// - end of speech → `Ok(())`
    /// - cancelled → [`SpeechError::Cancelled`]
    /// - engine error → [`SpeechError::LocalPlaybackFailed`]
    pub async fn finished(mut self) -> Result<(), SpeechError> {
        while let Some(event) = self.events.recv().await {
            match event {
                UtteranceEvent::Started => {
                    tracing::trace!(handle = %self.handle, "Device utterance started");
                }
                UtteranceEvent::Ended => return Ok(()),
                UtteranceEvent::Cancelled => return Err(SpeechError::Cancelled),
                UtteranceEvent::Failed(message) => {
                    return Err(SpeechError::LocalPlaybackFailed(message));
                }
            }
        }
        Err(SpeechError::LocalPlaybackFailed(
            "device engine dropped the utterance without finishing it".to_string(),
        ))
    }
}

/// Client for the on-device voice.
pub struct LocalSynthesisClient {
    device: Arc<dyn DeviceVoiceApi>,
    config: RwLock<LocalVoiceConfig>,
    selected: RwLock<Option<DeviceVoice>>,
    voice_load_timeout: Duration,
    next_handle: AtomicU64,
}

impl std::fmt::Debug for LocalSynthesisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSynthesisClient")
            .field("supported", &self.device.is_supported())
            .field("selected", &self.selected_voice())
            .finish_non_exhaustive()
    }
}

impl LocalSynthesisClient {
    pub fn new(device: Arc<dyn DeviceVoiceApi>, config: LocalVoiceConfig) -> Self {
        Self {
            device,
            config: RwLock::new(config),
            selected: RwLock::new(None),
            voice_load_timeout: saywise_core::config::DEFAULT_VOICE_LOAD_TIMEOUT,
            next_handle: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub const fn with_voice_load_timeout(mut self, timeout: Duration) -> Self {
        self.voice_load_timeout = timeout;
        self
    }

    pub fn is_supported(&self) -> bool {
        self.device.is_supported()
    }

    /// Wait (up to `timeout`) for the device to enumerate its voices, then
    /// pick the voice to use.
    ///
    /// Some platforms report an empty list on the first query and populate
    /// it later; this waits for that notification.
    pub async fn load_voices(&self, timeout: Duration) -> Vec<DeviceVoice> {
        let mut voices = self.device.voices();
        if voices.is_empty() && self.device.is_supported() {
            let mut changed = self.device.voices_changed();
            let loaded = tokio::time::timeout(timeout, changed.wait_for(|v| !v.is_empty()))
                .await
                .map(|waited| waited.map(|list| list.clone()));
            match loaded {
                Ok(Ok(list)) => voices = list,
                Ok(Err(_)) => tracing::debug!("Device voice notifier closed"),
                Err(_) => tracing::debug!(?timeout, "Timed out waiting for device voices"),
            }
        }

        let chosen = {
            let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
            config
                .voice
                .as_deref()
                .and_then(|wanted| find_voice(&voices, wanted))
                .or_else(|| select_optimal_voice(&voices, &config.language))
                .cloned()
        };
        tracing::info!(
            voices = voices.len(),
            selected = chosen.as_ref().map_or("<runtime default>", |v| v.name.as_str()),
            "Device voices loaded"
        );
        *self.selected.write().unwrap_or_else(PoisonError::into_inner) = chosen;
        voices
    }

    /// Voice used for new utterances, if one was selected.
    pub fn selected_voice(&self) -> Option<DeviceVoice> {
        self.selected
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Use the installed voice matching `wanted` (id or name).
    ///
    /// Returns whether such a voice exists.
    pub fn select_voice(&self, wanted: &str) -> bool {
        let voices = self.device.voices();
        let Some(voice) = find_voice(&voices, wanted).cloned() else {
            tracing::warn!(voice = wanted, "Requested device voice is not installed");
            return false;
        };
        *self.selected.write().unwrap_or_else(PoisonError::into_inner) = Some(voice);
        true
    }

    /// Replace rate/pitch/volume/language for subsequent utterances.
    pub fn set_config(&self, config: LocalVoiceConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Build the request for `text` with the current parameters.
    pub fn utterance_request(&self, text: &str) -> UtteranceRequest {
        let config = self.config.read().unwrap_or_else(PoisonError::into_inner);
        UtteranceRequest {
            handle: UtteranceHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)),
            text: text.to_string(),
            rate: config.rate,
            pitch: config.pitch,
            volume: config.volume,
            voice: self.selected_voice(),
        }
    }

    /// Speak `text` with the current parameters.
    pub fn speak(&self, text: &str) -> Result<LocalUtterance, SpeechError> {
        if !self.device.is_supported() {
            return Err(SpeechError::UnsupportedRuntime);
        }
        self.speak_request(self.utterance_request(text))
    }

    /// Speak a prepared request, cancelling any active local utterance first.
    pub fn speak_request(&self, request: UtteranceRequest) -> Result<LocalUtterance, SpeechError> {
        if !self.device.is_supported() {
            return Err(SpeechError::UnsupportedRuntime);
        }

        self.device.cancel();

        let handle = request.handle;
        let (tx, events) = mpsc::unbounded_channel();
        let listener = Box::new(move |event: UtteranceEvent| {
            let _ = tx.send(event);
        });

        tracing::debug!(%handle, chars = request.text.chars().count(), "Starting device utterance");
        self.device.speak(request, listener)?;
        Ok(LocalUtterance { handle, events })
    }

    /// Cancel the active local utterance, if any.
    pub fn cancel(&self) {
        self.device.cancel();
    }
}

#[async_trait]
impl SynthesisEngine for LocalSynthesisClient {
    fn kind(&self) -> EngineKind {
        EngineKind::Local
    }

    async fn probe(&self, _force_refresh: bool) -> bool {
        self.device.is_supported()
    }

    fn availability(&self) -> Availability {
        if self.device.is_supported() {
            Availability::Available
        } else {
            Availability::Unavailable
        }
    }

    async fn warm_up(&self) -> bool {
        !self.load_voices(self.voice_load_timeout).await.is_empty()
    }

    async fn synthesize(&self, text: &str) -> Result<PreparedSpeech, SpeechError> {
        if !self.device.is_supported() {
            return Err(SpeechError::UnsupportedRuntime);
        }
        Ok(PreparedSpeech::Utterance(self.utterance_request(text)))
    }

    async fn play(
        &self,
        speech: PreparedSpeech,
        on_started: &(dyn Fn(Option<UtteranceHandle>) + Send + Sync),
    ) -> Result<(), SpeechError> {
        let PreparedSpeech::Utterance(request) = speech else {
            return Err(SpeechError::LocalPlaybackFailed(
                "device engine cannot play encoded audio".to_string(),
            ));
        };
        let utterance = self.speak_request(request)?;
        on_started(Some(utterance.handle()));
        utterance.finished().await
    }

    fn stop(&self) {
        self.cancel();
    }

    fn set_voice(&self, voice_id: &str) {
        self.select_voice(voice_id);
    }
}
