//! The speech facade.
//!
//! [`SpeechContext`] composes the deduplicator, the request queue, the queue
//! processor, the fallback orchestrator and the state store behind the
//! caller-facing API. It is an explicit object rather than a process-wide
//! singleton: create one per application (or per test) and [`dispose`] it
//! when done.
//!
//! [`dispose`]: SpeechContext::dispose

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use saywise_core::{
    AudioOutput, Deduplicator, DeviceVoiceApi, RequestId, SpeechConfig, SpeechRequest,
    SpeechState, SpeechStateUpdate, StateStore, Subscription, SynthesisEngine,
};
use saywise_remote::{RemoteClientConfig, RemoteSynthesisClient};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::device::{self, UnsupportedDevice};
use crate::error::VoiceError;
use crate::local::LocalSynthesisClient;
use crate::orchestrator::{EnginePreference, FallbackOrchestrator, RunReport};
use crate::output;
use crate::processor::QueueProcessor;

/// What `speak` did with the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakDisposition {
    /// Queued under this id.
    Queued(RequestId),
    /// Already spoken (or queued) before; dropped.
    Suppressed,
    /// Speech is switched off or the context was disposed; dropped.
    Disabled,
    /// Blank text; dropped.
    Empty,
}

impl SpeakDisposition {
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Assembles a [`SpeechContext`] from explicit engines.
///
/// Mostly useful for tests and for embedding custom engines; applications
/// normally use [`SpeechContext::from_config`].
pub struct SpeechContextBuilder {
    config: SpeechConfig,
    remote: Option<Arc<dyn SynthesisEngine>>,
    local: Option<Arc<dyn SynthesisEngine>>,
    runtime: Option<Handle>,
}

impl SpeechContextBuilder {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            remote: None,
            local: None,
            runtime: None,
        }
    }

    #[must_use]
    pub fn remote_engine(mut self, engine: Arc<dyn SynthesisEngine>) -> Self {
        self.remote = Some(engine);
        self
    }

    #[must_use]
    pub fn local_engine(mut self, engine: Arc<dyn SynthesisEngine>) -> Self {
        self.local = Some(engine);
        self
    }

    /// Run queue work on this runtime instead of the current one.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<SpeechContext, VoiceError> {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| VoiceError::NoRuntime)?,
        };

        let local = self.local.unwrap_or_else(|| {
            tracing::debug!("No local engine supplied, device speech disabled");
            Arc::new(LocalSynthesisClient::new(
                Arc::new(UnsupportedDevice::new()),
                self.config.local.clone(),
            ))
        });

        let state = StateStore::new();
        let dedup = Arc::new(Deduplicator::new());
        let orchestrator = Arc::new(FallbackOrchestrator::new(
            self.remote,
            local,
            state.clone(),
            EnginePreference::from_prefer_remote(self.config.prefer_remote),
        ));
        let processor = QueueProcessor::new(
            Arc::clone(&orchestrator),
            state.clone(),
            Arc::clone(&dedup),
            self.config.settle_delay,
            self.config.require_user_interaction,
            runtime.clone(),
        );

        tracing::info!(
            remote = orchestrator.remote().is_some(),
            preference = ?orchestrator.preference(),
            settle_delay_ms = self.config.settle_delay.as_millis(),
            "Speech context created"
        );

        Ok(SpeechContext {
            state,
            dedup,
            orchestrator,
            processor,
            runtime,
            disposed: AtomicBool::new(false),
        })
    }
}

/// Caller-facing speech API.
pub struct SpeechContext {
    state: StateStore,
    dedup: Arc<Deduplicator>,
    orchestrator: Arc<FallbackOrchestrator>,
    processor: QueueProcessor,
    runtime: Handle,
    disposed: AtomicBool,
}

impl std::fmt::Debug for SpeechContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechContext")
            .field("orchestrator", &self.orchestrator)
            .field("processor", &self.processor)
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SpeechContext {
    pub fn builder(config: SpeechConfig) -> SpeechContextBuilder {
        SpeechContextBuilder::new(config)
    }

    /// Build the standard engines from `config`.
    ///
    /// The remote engine is only created when a remote endpoint is
    /// configured.
    pub fn from_config(
        config: SpeechConfig,
        device: Arc<dyn DeviceVoiceApi>,
        output: Arc<dyn AudioOutput>,
    ) -> Result<Self, VoiceError> {
        config.validate()?;

        let local = LocalSynthesisClient::new(device, config.local.clone())
            .with_voice_load_timeout(config.voice_load_timeout);
        let mut builder = Self::builder(config.clone()).local_engine(Arc::new(local));

        if let Some(remote_config) = RemoteClientConfig::from_speech_config(&config) {
            let remote = RemoteSynthesisClient::new(&remote_config, output)?;
            builder = builder.remote_engine(Arc::new(remote));
        }

        builder.build()
    }

    /// [`from_config`](Self::from_config) with the best device and output
    /// backends compiled into this build.
    pub fn with_default_backends(config: SpeechConfig) -> Result<Self, VoiceError> {
        Self::from_config(config, device::default_device(), output::default_output())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Load device voices and start the first remote availability probe.
    ///
    /// The probe runs in the background; requests arriving meanwhile wait
    /// for it instead of probing again.
    pub async fn initialize(&self) {
        let voices_loaded = self.orchestrator.local().warm_up().await;
        self.state.update(
            SpeechStateUpdate::new()
                .with_voices_loaded(voices_loaded)
                .with_ready(true),
        );

        let remote = self
            .orchestrator
            .remote()
            .filter(|_| self.orchestrator.preference() == EnginePreference::Remote)
            .cloned();
        if let Some(remote) = remote {
            self.state
                .update(SpeechStateUpdate::new().with_checking_remote(true));
            let state = self.state.clone();
            self.runtime.spawn(async move {
                let available = remote.probe(true).await;
                state.update(SpeechStateUpdate::new().with_checking_remote(false));
                tracing::info!(available, "Startup availability probe finished");
            });
        }

        tracing::info!(voices_loaded, "Speech context initialised");
    }

    /// Queue `text` for speaking.
    ///
    /// Non-priority text that was already spoken (or queued) is suppressed.
    /// Priority text bypasses that check and jumps ahead of the queue.
    pub fn speak(&self, text: &str, priority: bool, context: Option<&str>) -> SpeakDisposition {
        if self.is_disposed() || !self.state.get_state().is_enabled {
            tracing::debug!(text = %preview(text), "Speech disabled, dropping request");
            return SpeakDisposition::Disabled;
        }
        if text.trim().is_empty() {
            return SpeakDisposition::Empty;
        }
        if self.dedup.should_suppress(text, priority) {
            tracing::debug!(text = %preview(text), "Duplicate speech suppressed");
            return SpeakDisposition::Suppressed;
        }
        if !priority {
            self.dedup.remember(text);
        }

        let mut request = SpeechRequest::new(text, priority);
        if let Some(context) = context {
            request = request.with_context(context);
        }
        let id = request.id;
        self.processor.enqueue(request);
        SpeakDisposition::Queued(id)
    }

    /// Cancel the active local utterance.
    ///
    /// Queued requests stay queued; in-flight remote audio keeps playing.
    pub fn stop(&self) {
        tracing::debug!("Stopping local speech");
        self.orchestrator.stop_local();
    }

    /// [`stop`](Self::stop) and reset the transient loading, checking and
    /// handle flags.
    ///
    /// `is_speaking` belongs to the queue processor and only clears once the
    /// request in flight has actually finished.
    pub fn force_stop_all(&self) {
        tracing::debug!("Force-stopping speech");
        self.orchestrator.stop_local();
        self.state.update(
            SpeechStateUpdate::new()
                .with_loading(false)
                .with_checking_remote(false)
                .with_handle(None),
        );
    }

    /// Flip speech on or off, returning the new setting.
    pub fn toggle_enabled(&self) -> bool {
        let enabled = !self.state.get_state().is_enabled;
        self.set_enabled(enabled);
        enabled
    }

    /// Switch speech on or off.
    ///
    /// Switching off drops the queue and stops current playback; the
    /// processor clears `is_speaking` when the stopped request returns.
    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.state.update(SpeechStateUpdate::new().with_enabled(true));
            self.processor.tick();
        } else {
            self.processor.clear_queue();
            self.orchestrator.stop_all();
            self.state.update(
                SpeechStateUpdate::new()
                    .with_enabled(false)
                    .with_handle(None),
            );
        }
        tracing::info!(enabled, "Speech output toggled");
    }

    /// Record that a user gesture happened, releasing any held requests.
    pub fn enable_user_interaction(&self) {
        self.state
            .update(SpeechStateUpdate::new().with_user_interacted(true));
        self.processor.tick();
    }

    /// Forget everything spoken so far, so it may be spoken again.
    pub fn clear_spoken_content(&self) {
        self.dedup.clear();
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SpeechState) + Send + Sync + 'static,
    {
        self.state.subscribe(callback)
    }

    pub fn state(&self) -> SpeechState {
        self.state.get_state()
    }

    pub fn watch(&self) -> watch::Receiver<SpeechState> {
        self.state.watch()
    }

    pub fn set_prefer_remote(&self, prefer_remote: bool) {
        self.orchestrator
            .set_preference(EnginePreference::from_prefer_remote(prefer_remote));
    }

    pub fn preference(&self) -> EnginePreference {
        self.orchestrator.preference()
    }

    /// Use `voice_id` for remote synthesis.
    pub fn set_voice(&self, voice_id: &str) {
        if let Some(remote) = self.orchestrator.remote() {
            remote.set_voice(voice_id);
        }
    }

    /// Use the installed device voice matching `voice` (id or name).
    pub fn set_local_voice(&self, voice: &str) {
        self.orchestrator.local().set_voice(voice);
    }

    /// Number of requests waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.processor.pending()
    }

    /// Resolve once nothing is in flight and nothing startable is queued.
    pub async fn wait_idle(&self) {
        self.processor.wait_idle().await;
    }

    /// Report of the most recently finished request.
    pub fn last_report(&self) -> Option<RunReport> {
        self.processor.last_report()
    }

    /// Tear the context down.
    ///
    /// Stops both engines, drops queued requests and spoken history, and
    /// resets the published state. Later `speak` calls are dropped.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.processor.dispose();
        self.orchestrator.stop_all();
        self.dedup.clear();
        self.state.reset();
        tracing::info!("Speech context disposed");
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(60) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
