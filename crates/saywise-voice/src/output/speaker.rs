//! Default-device playback of encoded audio via `rodio`.
//!
//! `rodio::OutputStream` is `!Send` on several platforms, so the stream lives
//! on a dedicated thread. [`SpeakerOutput`] forwards commands to it and
//! awaits completion over a oneshot channel.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use saywise_core::{AudioOutput, SpeechError};
use tokio::sync::oneshot;

use crate::error::VoiceError;

type PlaybackResult = Result<(), SpeechError>;

enum OutputCommand {
    Play {
        audio: Vec<u8>,
        done: oneshot::Sender<PlaybackResult>,
    },
    Stop,
    Shutdown,
}

/// A sink that is currently playing, plus the flag `stop` raises.
struct Playing {
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
}

impl Playing {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
    }
}

/// `Send + Sync` handle to the playback thread.
pub struct SpeakerOutput {
    cmd_tx: mpsc::Sender<OutputCommand>,
    thread: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for SpeakerOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakerOutput").finish_non_exhaustive()
    }
}

impl SpeakerOutput {
    /// Open the default output device on a dedicated thread.
    pub fn spawn() -> Result<Self, VoiceError> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<OutputCommand>();
        let (init_tx, init_rx) = mpsc::channel::<Result<(), VoiceError>>();

        let thread = thread::Builder::new()
            .name("saywise-audio-out".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = init_tx.send(Err(VoiceError::OutputStreamError(e.to_string())));
                        return;
                    }
                };
                if init_tx.send(Ok(())).is_err() {
                    return;
                }
                run(&cmd_rx, &handle);
                drop(stream);
            })
            .map_err(|e| VoiceError::OutputStreamError(format!("failed to spawn audio thread: {e}")))?;

        init_rx.recv().map_err(|_| VoiceError::WorkerThreadDied)??;
        tracing::info!("Audio output initialised on default device");

        Ok(Self {
            cmd_tx,
            thread: Some(thread),
        })
    }
}

#[async_trait]
impl AudioOutput for SpeakerOutput {
    async fn play(&self, audio: Vec<u8>) -> PlaybackResult {
        let (done, finished) = oneshot::channel();
        self.cmd_tx
            .send(OutputCommand::Play { audio, done })
            .map_err(|_| SpeechError::RemotePlaybackFailed(VoiceError::WorkerThreadDied.to_string()))?;

        finished
            .await
            .unwrap_or_else(|_| Err(SpeechError::RemotePlaybackFailed(VoiceError::WorkerThreadDied.to_string())))
    }

    fn stop(&self) {
        let _ = self.cmd_tx.send(OutputCommand::Stop);
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run(cmd_rx: &mpsc::Receiver<OutputCommand>, handle: &OutputStreamHandle) {
    let mut current: Option<Playing> = None;

    while let Ok(command) = cmd_rx.recv() {
        match command {
            OutputCommand::Play { audio, done } => {
                if let Some(previous) = current.take() {
                    previous.stop();
                }
                match start(handle, audio) {
                    Ok(playing) => {
                        watch_completion(&playing, done);
                        current = Some(playing);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to start audio playback");
                        let _ = done.send(Err(e));
                    }
                }
            }
            OutputCommand::Stop => {
                if let Some(playing) = current.take() {
                    playing.stop();
                    tracing::debug!("Audio playback stopped");
                }
            }
            OutputCommand::Shutdown => break,
        }
    }

    if let Some(playing) = current.take() {
        playing.stop();
    }
    tracing::debug!("Audio output thread exiting");
}

fn start(handle: &OutputStreamHandle, audio: Vec<u8>) -> Result<Playing, SpeechError> {
    let bytes = audio.len();
    let source = Decoder::new(Cursor::new(audio))
        .map_err(|e| SpeechError::RemotePlaybackFailed(format!("undecodable audio: {e}")))?;
    let sink = Sink::try_new(handle).map_err(|e| SpeechError::RemotePlaybackFailed(e.to_string()))?;
    sink.append(source);

    tracing::debug!(bytes, "Audio playback started");
    Ok(Playing {
        sink: Arc::new(sink),
        stopped: Arc::new(AtomicBool::new(false)),
    })
}

/// Block a helper thread until the sink drains, then report how it ended.
fn watch_completion(playing: &Playing, done: oneshot::Sender<PlaybackResult>) {
    let sink = Arc::clone(&playing.sink);
    let stopped = Arc::clone(&playing.stopped);

    thread::spawn(move || {
        sink.sleep_until_end();
        let result = if stopped.load(Ordering::SeqCst) {
            Err(SpeechError::Cancelled)
        } else {
            tracing::debug!("Audio playback finished naturally");
            Ok(())
        };
        let _ = done.send(result);
    });
}
