//! OS speech engine backend via the `tts` crate.
//!
//! Platform engines (AVFoundation, WinRT/SAPI, speech-dispatcher) are not
//! `Send` everywhere. The `Tts` instance is therefore confined to a dedicated
//! OS thread and driven through commands over a channel; [`NativeDevice`] is
//! the `Send + Sync` handle the local client holds.
//!
//! Utterance lifecycle events come from the engine's utterance callbacks when
//! the platform supports them. Otherwise the thread polls `is_speaking` and
//! reports the end of speech itself.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use saywise_core::{
    DeviceVoice, DeviceVoiceApi, SpeechError, UtteranceEvent, UtteranceHandle, UtteranceListener,
    UtteranceRequest, VoiceGender,
};
use tokio::sync::watch;
use tts::{Features, Gender, Tts, UtteranceId};

use crate::error::VoiceError;

/// How often the thread checks `is_speaking` when idle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period before a silent engine counts as finished.
const START_GRACE: Duration = Duration::from_secs(1);

/// Parameter multipliers at or above this map to the engine maximum.
const MAX_FACTOR: f32 = 2.0;

// ── Commands ───────────────────────────────────────────────────────

enum DeviceCommand {
    Speak {
        request: UtteranceRequest,
        listener: UtteranceListener,
    },
    Cancel,
    Shutdown,
}

// ── Active utterance bookkeeping ───────────────────────────────────

struct Active {
    handle: UtteranceHandle,
    id: Option<UtteranceId>,
    listener: UtteranceListener,
    spoken_at: Instant,
    started: bool,
}

type ActiveSlot = Arc<Mutex<Option<Active>>>;

fn lock(slot: &ActiveSlot) -> MutexGuard<'_, Option<Active>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deliver a terminal event and clear the slot.
fn finish(slot: &ActiveSlot, event: UtteranceEvent) {
    let active = lock(slot).take();
    if let Some(mut active) = active {
        tracing::debug!(handle = %active.handle, ?event, "Device utterance finished");
        (active.listener)(event);
    }
}

/// Deliver a terminal event only if `id` is the active utterance.
fn finish_if(slot: &ActiveSlot, id: UtteranceId, event: UtteranceEvent) {
    let matches = lock(slot).as_ref().is_some_and(|a| a.id == Some(id));
    if matches {
        finish(slot, event);
    }
}

fn mark_started(active: &mut Active) {
    if !active.started {
        active.started = true;
        (active.listener)(UtteranceEvent::Started);
    }
}

// ── Handle (Send + Sync proxy) ─────────────────────────────────────

/// `Send + Sync` handle to the OS speech engine thread.
pub struct NativeDevice {
    cmd_tx: mpsc::Sender<DeviceCommand>,
    voices: watch::Sender<Vec<DeviceVoice>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for NativeDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeDevice")
            .field("voices", &self.voices.borrow().len())
            .finish_non_exhaustive()
    }
}

impl NativeDevice {
    /// Spawn the engine thread and initialise the platform engine on it.
    pub fn spawn() -> Result<Self, VoiceError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<DeviceCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<Vec<DeviceVoice>, VoiceError>>();

        let thread = thread::Builder::new()
            .name("saywise-tts".into())
            .spawn(move || run(&cmd_rx, &init_tx))
            .map_err(|e| VoiceError::DeviceInit(format!("failed to spawn speech thread: {e}")))?;

        let voices = init_rx.recv().map_err(|_| VoiceError::WorkerThreadDied)??;
        tracing::info!(voices = voices.len(), "Device speech engine initialised");

        Ok(Self {
            cmd_tx,
            voices: watch::Sender::new(voices),
            thread: Some(thread),
        })
    }

    fn send(&self, command: DeviceCommand) -> bool {
        self.cmd_tx.send(command).is_ok()
    }
}

impl DeviceVoiceApi for NativeDevice {
    fn is_supported(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<DeviceVoice> {
        self.voices.borrow().clone()
    }

    fn voices_changed(&self) -> watch::Receiver<Vec<DeviceVoice>> {
        self.voices.subscribe()
    }

    fn speak(&self, request: UtteranceRequest, listener: UtteranceListener) -> Result<(), SpeechError> {
        if self.send(DeviceCommand::Speak { request, listener }) {
            Ok(())
        } else {
            Err(SpeechError::LocalPlaybackFailed(
                VoiceError::WorkerThreadDied.to_string(),
            ))
        }
    }

    fn cancel(&self) {
        let _ = self.send(DeviceCommand::Cancel);
    }
}

impl Drop for NativeDevice {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(DeviceCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

// ── Engine thread ──────────────────────────────────────────────────

fn run(
    cmd_rx: &mpsc::Receiver<DeviceCommand>,
    init_tx: &mpsc::Sender<Result<Vec<DeviceVoice>, VoiceError>>,
) {
    let mut tts = match Tts::default() {
        Ok(tts) => tts,
        Err(e) => {
            let _ = init_tx.send(Err(VoiceError::DeviceInit(e.to_string())));
            return;
        }
    };

    let features = tts.supported_features();
    let slot: ActiveSlot = Arc::new(Mutex::new(None));
    let callbacks = features.utterance_callbacks && register_callbacks(&tts, &slot);

    let platform_voices = if features.voice {
        tts.voices().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to enumerate device voices");
            Vec::new()
        })
    } else {
        Vec::new()
    };
    let voices = platform_voices.iter().map(to_device_voice).collect();
    if init_tx.send(Ok(voices)).is_err() {
        return;
    }

    loop {
        match cmd_rx.recv_timeout(POLL_INTERVAL) {
            Ok(DeviceCommand::Speak { request, listener }) => {
                speak(&mut tts, &features, &platform_voices, &slot, request, listener);
            }
            Ok(DeviceCommand::Cancel) => {
                if lock(&slot).is_some() {
                    let _ = tts.stop();
                    finish(&slot, UtteranceEvent::Cancelled);
                }
            }
            Ok(DeviceCommand::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if lock(&slot).is_some() {
                    let _ = tts.stop();
                    finish(&slot, UtteranceEvent::Cancelled);
                }
                break;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => poll(&tts, &features, callbacks, &slot),
        }
    }

    tracing::debug!("Device speech thread exiting");
}

fn register_callbacks(tts: &Tts, slot: &ActiveSlot) -> bool {
    let begin = Arc::clone(slot);
    let end = Arc::clone(slot);
    let stop = Arc::clone(slot);

    let registered = tts
        .on_utterance_begin(Some(Box::new(move |id| {
            if let Some(active) = lock(&begin).as_mut().filter(|a| a.id == Some(id)) {
                mark_started(active);
            }
        })))
        .and_then(|()| {
            tts.on_utterance_end(Some(Box::new(move |id| {
                finish_if(&end, id, UtteranceEvent::Ended);
            })))
        })
        .and_then(|()| {
            tts.on_utterance_stop(Some(Box::new(move |id| {
                finish_if(&stop, id, UtteranceEvent::Cancelled);
            })))
        });

    if let Err(e) = registered {
        tracing::debug!(error = %e, "Utterance callbacks unavailable, polling instead");
        return false;
    }
    true
}

fn speak(
    tts: &mut Tts,
    features: &Features,
    platform_voices: &[tts::Voice],
    slot: &ActiveSlot,
    request: UtteranceRequest,
    listener: UtteranceListener,
) {
    if lock(slot).is_some() {
        let _ = tts.stop();
        finish(slot, UtteranceEvent::Cancelled);
    }

    apply_parameters(tts, features, &request);
    if let Some(wanted) = request.voice.as_ref().filter(|_| features.voice) {
        if let Some(voice) = platform_voices.iter().find(|v| v.id() == wanted.id) {
            if let Err(e) = tts.set_voice(voice) {
                tracing::debug!(error = %e, voice = %wanted.name, "Failed to select device voice");
            }
        }
    }

    *lock(slot) = Some(Active {
        handle: request.handle,
        id: None,
        listener,
        spoken_at: Instant::now(),
        started: false,
    });

    match tts.speak(request.text, false) {
        Ok(id) => {
            if let Some(active) = lock(slot).as_mut() {
                active.id = id;
            }
        }
        Err(e) => finish(slot, UtteranceEvent::Failed(e.to_string())),
    }
}

/// Detect the end of speech on engines without (or with missed) callbacks.
fn poll(tts: &Tts, features: &Features, callbacks: bool, slot: &ActiveSlot) {
    let mut guard = lock(slot);
    let Some(active) = guard.as_mut() else {
        return;
    };

    if !features.is_speaking {
        if !callbacks {
            drop(guard);
            finish(slot, UtteranceEvent::Ended);
        }
        return;
    }

    let speaking = tts.is_speaking().unwrap_or(false);
    if speaking {
        if !callbacks {
            mark_started(active);
        }
        return;
    }

    if active.started || active.spoken_at.elapsed() > START_GRACE {
        drop(guard);
        finish(slot, UtteranceEvent::Ended);
    }
}

fn apply_parameters(tts: &mut Tts, features: &Features, request: &UtteranceRequest) {
    if features.rate {
        let rate = scale(request.rate, tts.min_rate(), tts.normal_rate(), tts.max_rate());
        let _ = tts.set_rate(rate);
    }
    if features.pitch {
        let pitch = scale(request.pitch, tts.min_pitch(), tts.normal_pitch(), tts.max_pitch());
        let _ = tts.set_pitch(pitch);
    }
    if features.volume {
        let (min, max) = (tts.min_volume(), tts.max_volume());
        let _ = tts.set_volume(request.volume.clamp(0.0, 1.0).mul_add(max - min, min));
    }
}

/// Map a multiplier (1.0 = normal) onto an engine's `[min, max]` range.
///
/// Below 1.0 interpolates between `min` and `normal`; above 1.0 between
/// `normal` and `max`, reaching `max` at [`MAX_FACTOR`].
fn scale(factor: f32, min: f32, normal: f32, max: f32) -> f32 {
    let factor = factor.clamp(0.0, MAX_FACTOR);
    if factor < 1.0 {
        (normal - min).mul_add(factor, min)
    } else {
        (max - normal).mul_add((factor - 1.0) / (MAX_FACTOR - 1.0), normal)
    }
}

fn to_device_voice(voice: &tts::Voice) -> DeviceVoice {
    let device = DeviceVoice::new(voice.id(), voice.name(), voice.language().to_string());
    match voice.gender() {
        Some(Gender::Female) => device.with_gender(VoiceGender::Female),
        Some(Gender::Male) => device.with_gender(VoiceGender::Male),
        None => device,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_hits_anchor_points() {
        assert!((scale(1.0, 0.1, 1.0, 10.0) - 1.0).abs() < f32::EPSILON);
        assert!((scale(0.0, 0.1, 1.0, 10.0) - 0.1).abs() < f32::EPSILON);
        assert!((scale(2.0, 0.1, 1.0, 10.0) - 10.0).abs() < f32::EPSILON);
        assert!((scale(5.0, 0.1, 1.0, 10.0) - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_scale_handles_signed_ranges() {
        // speech-dispatcher style: -100..100 with 0 as normal
        assert!((scale(0.5, -100.0, 0.0, 100.0) + 50.0).abs() < 1e-4);
        assert!((scale(1.5, -100.0, 0.0, 100.0) - 50.0).abs() < 1e-4);
    }
}
