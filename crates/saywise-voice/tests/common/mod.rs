//! Shared fakes for the speech context integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use saywise_core::{
    Availability, EngineKind, PreparedSpeech, SpeechConfig, SpeechError, SynthesisEngine,
    UtteranceHandle,
};
use saywise_voice::SpeechContext;
use tokio::sync::{Notify, Semaphore};

/// Counts concurrently playing engines, across engines.
#[derive(Debug, Default)]
pub struct ActiveCounter {
    active: AtomicUsize,
    max: AtomicUsize,
}

impl ActiveCounter {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Scriptable engine.
///
/// Synthesis turns text into its bytes; playback records the text. A gated
/// engine holds playback until [`release`](Self::release) hands out permits
/// or [`SynthesisEngine::stop`] cancels it.
pub struct FakeEngine {
    kind: EngineKind,
    availability: Mutex<Availability>,
    check_done: Notify,
    probe_result: AtomicBool,
    probes: AtomicUsize,
    synth_error: Mutex<Option<SpeechError>>,
    play_error: Mutex<Option<SpeechError>>,
    gate: Option<Semaphore>,
    stop_signal: Notify,
    stops: AtomicUsize,
    spoken: Mutex<Vec<String>>,
    voices: Mutex<Vec<String>>,
    counter: Arc<ActiveCounter>,
    next_handle: AtomicU64,
}

impl FakeEngine {
    fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            availability: Mutex::new(Availability::Available),
            check_done: Notify::new(),
            probe_result: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
            synth_error: Mutex::new(None),
            play_error: Mutex::new(None),
            gate: None,
            stop_signal: Notify::new(),
            stops: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
            voices: Mutex::new(Vec::new()),
            counter: Arc::new(ActiveCounter::default()),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn remote() -> Self {
        Self::new(EngineKind::Remote)
    }

    pub fn local() -> Self {
        Self::new(EngineKind::Local)
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn with_availability(self, availability: Availability) -> Self {
        *self.availability.lock().unwrap() = availability;
        self
    }

    pub fn with_probe_result(self, available: bool) -> Self {
        self.probe_result.store(available, Ordering::SeqCst);
        self
    }

    pub fn with_synth_error(self, error: SpeechError) -> Self {
        *self.synth_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_play_error(self, error: SpeechError) -> Self {
        *self.play_error.lock().unwrap() = Some(error);
        self
    }

    pub fn sharing(mut self, counter: &Arc<ActiveCounter>) -> Self {
        self.counter = Arc::clone(counter);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Let `permits` gated playbacks finish.
    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    /// Resolve an in-flight availability check.
    pub fn finish_check(&self, available: bool) {
        *self.availability.lock().unwrap() = if available {
            Availability::Available
        } else {
            Availability::Unavailable
        };
        self.check_done.notify_waiters();
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn selected_voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisEngine for FakeEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn probe(&self, _force_refresh: bool) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let available = self.probe_result.load(Ordering::SeqCst);
        *self.availability.lock().unwrap() = if available {
            Availability::Available
        } else {
            Availability::Unavailable
        };
        available
    }

    fn availability(&self) -> Availability {
        *self.availability.lock().unwrap()
    }

    async fn wait_for_availability(&self) {
        loop {
            let done = self.check_done.notified();
            if self.availability() != Availability::Checking {
                return;
            }
            done.await;
        }
    }

    async fn synthesize(&self, text: &str) -> Result<PreparedSpeech, SpeechError> {
        if let Some(error) = self.synth_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(PreparedSpeech::Audio(text.as_bytes().to_vec()))
    }

    async fn play(
        &self,
        speech: PreparedSpeech,
        on_started: &(dyn Fn(Option<UtteranceHandle>) + Send + Sync),
    ) -> Result<(), SpeechError> {
        let PreparedSpeech::Audio(bytes) = speech else {
            return Err(SpeechError::LocalPlaybackFailed("unexpected utterance".into()));
        };
        self.spoken
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(&bytes).into_owned());

        self.counter.enter();
        on_started(match self.kind {
            EngineKind::Remote => None,
            EngineKind::Local => Some(UtteranceHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))),
        });

        let result = match &self.gate {
            Some(gate) => {
                let stopped = self.stop_signal.notified();
                tokio::select! {
                    permit = gate.acquire() => {
                        permit.expect("gate never closes").forget();
                        Ok(())
                    }
                    () = stopped => Err(SpeechError::Cancelled),
                }
            }
            None => Ok(()),
        };
        self.counter.exit();

        match result {
            Ok(()) => self.play_error.lock().unwrap().clone().map_or(Ok(()), Err),
            Err(e) => Err(e),
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stop_signal.notify_waiters();
    }

    fn set_voice(&self, voice_id: &str) {
        self.voices.lock().unwrap().push(voice_id.to_string());
    }
}

/// Default test configuration: remote preferred, 250 ms settle delay.
pub fn config() -> SpeechConfig {
    SpeechConfig::default()
}

/// Context over the given fakes.
pub fn context(remote: Option<&Arc<FakeEngine>>, local: &Arc<FakeEngine>, config: SpeechConfig) -> SpeechContext {
    let mut builder = SpeechContext::builder(config).local_engine(local.clone());
    if let Some(remote) = remote {
        builder = builder.remote_engine(remote.clone());
    }
    builder.build().expect("valid test context")
}

/// Let spawned tasks run until `condition` holds.
pub async fn until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
