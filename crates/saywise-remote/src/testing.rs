//! Scripted doubles for exercising remote synthesis without a network.
//!
//! Available in this crate's tests and, through the `test-utils` feature, to
//! downstream integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use saywise_core::{AudioOutput, SpeechError};
use tokio::sync::Notify;

use crate::error::{RemoteError, RemoteResult};
use crate::protocol::{RemoteRequest, RemoteResponse};
use crate::transport::SpeechTransport;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canned reply of a [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Probe response listing `n` voices.
    Voices(usize),
    /// Synthesis response carrying these audio bytes.
    Audio(Vec<u8>),
    /// `{ "error": ... }` body.
    Error(String),
    /// Transport-level failure (bad status / unreachable).
    Down(String),
    /// `{}`.
    Empty,
}

impl Reply {
    fn into_result(self) -> RemoteResult<RemoteResponse> {
        match self {
            Self::Voices(n) => Ok(RemoteResponse::with_voices(n)),
            Self::Audio(bytes) => Ok(RemoteResponse::with_audio(BASE64.encode(bytes))),
            Self::Error(message) => Err(RemoteError::Api(message)),
            Self::Down(message) => Err(RemoteError::Status {
                status: 503,
                message,
            }),
            Self::Empty => Ok(RemoteResponse::default()),
        }
    }
}

/// Transport answering from a script.
///
/// Each request kind has a queue of one-shot replies and a fallback reply
/// used once the queue is empty. An optional latency applies to probes so
/// tests can observe the "checking" phase.
#[derive(Debug)]
pub struct ScriptedTransport {
    probe_default: Mutex<Reply>,
    probe_script: Mutex<VecDeque<Reply>>,
    synth_default: Mutex<Reply>,
    synth_script: Mutex<VecDeque<Reply>>,
    probe_latency: Mutex<Duration>,
    probes: AtomicUsize,
    syntheses: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    /// Service that lists one voice and returns a short audio clip.
    pub fn available() -> Self {
        Self::new(Reply::Voices(1), Reply::Audio(b"ID3\x04fake-mp3".to_vec()))
    }

    /// Service whose probe fails at the transport level.
    pub fn unreachable() -> Self {
        Self::new(
            Reply::Down("connection refused".to_string()),
            Reply::Down("connection refused".to_string()),
        )
    }

    pub fn new(probe: Reply, synthesis: Reply) -> Self {
        Self {
            probe_default: Mutex::new(probe),
            probe_script: Mutex::new(VecDeque::new()),
            synth_default: Mutex::new(synthesis),
            synth_script: Mutex::new(VecDeque::new()),
            probe_latency: Mutex::new(Duration::ZERO),
            probes: AtomicUsize::new(0),
            syntheses: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Delay every probe by `latency`.
    #[must_use]
    pub fn with_probe_latency(self, latency: Duration) -> Self {
        *lock(&self.probe_latency) = latency;
        self
    }

    /// Replace the fallback probe reply.
    pub fn set_probe(&self, reply: Reply) {
        *lock(&self.probe_default) = reply;
    }

    /// Replace the fallback synthesis reply.
    pub fn set_synthesis(&self, reply: Reply) {
        *lock(&self.synth_default) = reply;
    }

    /// Answer the next probe with `reply`, then return to the fallback.
    pub fn push_probe(&self, reply: Reply) {
        lock(&self.probe_script).push_back(reply);
    }

    /// Answer the next synthesis with `reply`, then return to the fallback.
    pub fn push_synthesis(&self, reply: Reply) {
        lock(&self.synth_script).push_back(reply);
    }

    pub fn probe_calls(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn synthesis_calls(&self) -> usize {
        self.syntheses.load(Ordering::SeqCst)
    }

    /// Texts sent for synthesis, in order.
    pub fn synthesized_texts(&self) -> Vec<String> {
        lock(&self.texts).clone()
    }
}

#[async_trait]
impl SpeechTransport for ScriptedTransport {
    async fn send(&self, request: &RemoteRequest) -> RemoteResult<RemoteResponse> {
        match request {
            RemoteRequest::CheckAvailability => {
                self.probes.fetch_add(1, Ordering::SeqCst);
                let latency = *lock(&self.probe_latency);
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                let reply = lock(&self.probe_script)
                    .pop_front()
                    .unwrap_or_else(|| lock(&self.probe_default).clone());
                reply.into_result()
            }
            RemoteRequest::GenerateSpeech { text, .. } => {
                self.syntheses.fetch_add(1, Ordering::SeqCst);
                lock(&self.texts).push(text.clone());
                let reply = lock(&self.synth_script)
                    .pop_front()
                    .unwrap_or_else(|| lock(&self.synth_default).clone());
                reply.into_result()
            }
        }
    }
}

/// Audio output that records what it was asked to play.
///
/// Playback completes immediately unless a hold is set with
/// [`hold`](Self::hold), in which case it waits for [`release`](Self::release)
/// or [`AudioOutput::stop`].
#[derive(Debug, Default)]
pub struct RecordingOutput {
    played: Mutex<Vec<Vec<u8>>>,
    failure: Mutex<Option<String>>,
    held: Mutex<bool>,
    released: Notify,
    stopped: Notify,
    stops: AtomicUsize,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every subsequent playback with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    /// Keep subsequent playbacks running until released or stopped.
    pub fn hold(&self) {
        *lock(&self.held) = true;
    }

    /// Finish the playback currently held.
    pub fn release(&self) {
        *lock(&self.held) = false;
        self.released.notify_waiters();
    }

    /// Audio clips played so far.
    pub fn played(&self) -> Vec<Vec<u8>> {
        lock(&self.played).clone()
    }

    /// How often `stop` was called.
    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&self, audio: Vec<u8>) -> Result<(), SpeechError> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(SpeechError::RemotePlaybackFailed(message));
        }
        lock(&self.played).push(audio);

        let released = self.released.notified();
        let stopped = self.stopped.notified();
        if !*lock(&self.held) {
            return Ok(());
        }
        tokio::select! {
            () = released => Ok(()),
            () = stopped => Err(SpeechError::Cancelled),
        }
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stopped.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let transport = ScriptedTransport::available();
        transport.push_synthesis(Reply::Error("quota".into()));

        let request = RemoteRequest::generate("a", "v", "m");
        assert!(matches!(
            transport.send(&request).await,
            Err(RemoteError::Api(m)) if m == "quota"
        ));
        assert!(transport.send(&request).await.unwrap().audio_content.is_some());
        assert_eq!(transport.synthesis_calls(), 2);
        assert_eq!(transport.synthesized_texts(), ["a", "a"]);
    }

    #[tokio::test]
    async fn test_unreachable_probe() {
        let transport = ScriptedTransport::unreachable();
        let err = transport.send(&RemoteRequest::CheckAvailability).await.unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 503, .. }));
        assert_eq!(transport.probe_calls(), 1);
    }
}
