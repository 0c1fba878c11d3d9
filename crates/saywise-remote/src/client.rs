//! Remote synthesis client.
//!
//! Converts text to audio through the remote service and plays it on an
//! [`AudioOutput`]. Every synthesis is gated by the availability cache: when
//! the cache says the service is down, the call fails immediately without a
//! synthesis request.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use saywise_core::{
    Availability, AudioOutput, EngineKind, PreparedSpeech, SpeechError, SynthesisEngine,
    UtteranceHandle,
};

use crate::availability::AvailabilityCache;
use crate::config::RemoteClientConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::protocol::RemoteRequest;
use crate::transport::{ReqwestTransport, SpeechTransport};

/// Result of one synthesis call.
///
/// Exactly one of `audio` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSynthesis {
    pub audio: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl RemoteSynthesis {
    pub const fn is_ok(&self) -> bool {
        self.audio.is_some()
    }
}

impl From<RemoteResult<Vec<u8>>> for RemoteSynthesis {
    fn from(result: RemoteResult<Vec<u8>>) -> Self {
        match result {
            Ok(audio) => Self {
                audio: Some(audio),
                error: None,
            },
            Err(e) => Self {
                audio: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Client for the premium remote voice.
pub struct RemoteSynthesisClient {
    transport: Arc<dyn SpeechTransport>,
    cache: AvailabilityCache,
    voice_id: RwLock<String>,
    model_id: String,
    output: Arc<dyn AudioOutput>,
}

impl std::fmt::Debug for RemoteSynthesisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSynthesisClient")
            .field("voice_id", &self.voice_id())
            .field("model_id", &self.model_id)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RemoteSynthesisClient {
    /// Create a client talking HTTP to `config.endpoint`.
    pub fn new(config: &RemoteClientConfig, output: Arc<dyn AudioOutput>) -> RemoteResult<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(config, Arc::new(transport), output))
    }

    /// Create a client over any transport.
    pub fn with_transport(
        config: &RemoteClientConfig,
        transport: Arc<dyn SpeechTransport>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        Self {
            cache: AvailabilityCache::new(Arc::clone(&transport), config.availability_ttl),
            transport,
            voice_id: RwLock::new(config.voice_id.clone()),
            model_id: config.model_id.clone(),
            output,
        }
    }

    /// The availability cache in front of this client.
    pub const fn cache(&self) -> &AvailabilityCache {
        &self.cache
    }

    /// See [`AvailabilityCache::check_availability`].
    pub async fn check_availability(&self, force_refresh: bool) -> bool {
        self.cache.check_availability(force_refresh).await
    }

    /// Synthesize `text`, reporting failure as a value.
    ///
    /// A successful call without audio content is a soft failure with an
    /// explicit error string.
    pub async fn synthesize(&self, text: &str) -> RemoteSynthesis {
        self.try_synthesize(text).await.into()
    }

    /// Synthesize `text`.
    pub async fn try_synthesize(&self, text: &str) -> RemoteResult<Vec<u8>> {
        if !self.cache.check_availability(false).await {
            let reason = self
                .cache
                .last_error()
                .unwrap_or_else(|| "remote service unavailable".to_string());
            return Err(RemoteError::Unavailable(reason));
        }

        let request = RemoteRequest::generate(text, self.voice_id(), self.model_id.clone());
        let response = self.transport.send(&request).await?;

        let encoded = response.audio_content.ok_or(RemoteError::MissingAudio)?;
        let audio = BASE64.decode(encoded.trim())?;
        if audio.is_empty() {
            return Err(RemoteError::MissingAudio);
        }

        tracing::debug!(bytes = audio.len(), chars = text.chars().count(), "Remote speech synthesized");
        Ok(audio)
    }

    /// Play previously synthesized audio, resolving when playback finishes.
    pub async fn play(&self, audio: Vec<u8>) -> Result<(), SpeechError> {
        self.output.play(audio).await.map_err(|e| match e {
            SpeechError::Cancelled | SpeechError::RemotePlaybackFailed(_) => e,
            other => SpeechError::RemotePlaybackFailed(other.to_string()),
        })
    }

    /// Use `voice_id` for subsequent synthesis calls.
    pub fn set_voice(&self, voice_id: impl Into<String>) {
        let voice_id = voice_id.into();
        tracing::info!(voice_id = %voice_id, "Remote voice changed");
        *self.voice_id.write().unwrap_or_else(PoisonError::into_inner) = voice_id;
    }

    pub fn voice_id(&self) -> String {
        self.voice_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl SynthesisEngine for RemoteSynthesisClient {
    fn kind(&self) -> EngineKind {
        EngineKind::Remote
    }

    async fn probe(&self, force_refresh: bool) -> bool {
        self.cache.check_availability(force_refresh).await
    }

    fn availability(&self) -> Availability {
        self.cache.availability()
    }

    async fn wait_for_availability(&self) {
        self.cache.wait_for_check().await;
    }

    async fn synthesize(&self, text: &str) -> Result<PreparedSpeech, SpeechError> {
        self.try_synthesize(text)
            .await
            .map(PreparedSpeech::Audio)
            .map_err(RemoteError::into_synthesis_failed)
    }

    async fn play(
        &self,
        speech: PreparedSpeech,
        on_started: &(dyn Fn(Option<UtteranceHandle>) + Send + Sync),
    ) -> Result<(), SpeechError> {
        match speech {
            PreparedSpeech::Audio(audio) => {
                on_started(None);
                Self::play(self, audio).await
            }
            PreparedSpeech::Utterance(_) => Err(SpeechError::RemotePlaybackFailed(
                "remote engine cannot play device utterances".to_string(),
            )),
        }
    }

    fn stop(&self) {
        self.output.stop();
    }

    fn set_voice(&self, voice_id: &str) {
        Self::set_voice(self, voice_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RemoteResponse;
    use crate::testing::RecordingOutput;
    use crate::transport::MockSpeechTransport;
    use mockall::predicate::eq;

    fn client(mock: MockSpeechTransport) -> (RemoteSynthesisClient, Arc<RecordingOutput>) {
        let output = Arc::new(RecordingOutput::new());
        let config = RemoteClientConfig::new("https://example.com/tts").with_voice_id("voice-a");
        let client = RemoteSynthesisClient::with_transport(&config, Arc::new(mock), output.clone());
        (client, output)
    }

    #[tokio::test]
    async fn test_unavailable_fails_fast_without_synthesis_call() {
        let mut mock = MockSpeechTransport::new();
        mock.expect_send()
            .with(eq(RemoteRequest::CheckAvailability))
            .times(1)
            .returning(|_| Ok(RemoteResponse::with_voices(0)));
        let (client, _) = client(mock);

        let result = client.synthesize("Hello").await;
        assert!(result.audio.is_none());
        assert!(result.error.unwrap().contains("no usable voices"));
    }

    #[tokio::test]
    async fn test_synthesize_decodes_audio() {
        let mut mock = MockSpeechTransport::new();
        mock.expect_send()
            .with(eq(RemoteRequest::CheckAvailability))
            .times(1)
            .returning(|_| Ok(RemoteResponse::with_voices(1)));
        mock.expect_send()
            .with(eq(RemoteRequest::generate("Hello", "voice-a", "eleven_multilingual_v2")))
            .times(1)
            .returning(|_| Ok(RemoteResponse::with_audio(BASE64.encode(b"ID3audio"))));
        let (client, _) = client(mock);

        let result = client.synthesize("Hello").await;
        assert!(result.is_ok());
        assert_eq!(result.audio.as_deref(), Some(&b"ID3audio"[..]));
    }

    #[tokio::test]
    async fn test_missing_audio_is_soft_failure() {
        let mut mock = MockSpeechTransport::new();
        mock.expect_send()
            .with(eq(RemoteRequest::CheckAvailability))
            .returning(|_| Ok(RemoteResponse::with_voices(1)));
        mock.expect_send()
            .returning(|_| Ok(RemoteResponse::default()));
        let (client, _) = client(mock);

        let result = client.synthesize("Hello").await;
        assert_eq!(result.error.as_deref(), Some("no audio content in response"));
    }

    #[tokio::test]
    async fn test_api_error_maps_to_synthesis_failed() {
        let mut mock = MockSpeechTransport::new();
        mock.expect_send()
            .with(eq(RemoteRequest::CheckAvailability))
            .returning(|_| Ok(RemoteResponse::with_voices(1)));
        mock.expect_send()
            .returning(|_| Err(RemoteError::Api("quota".into())));
        let (client, _) = client(mock);

        let err = SynthesisEngine::synthesize(&client, "Hello").await.unwrap_err();
        assert_eq!(err, SpeechError::RemoteSynthesisFailed("quota".into()));
        assert!(err.triggers_fallback());
    }

    #[tokio::test]
    async fn test_set_voice_affects_subsequent_calls() {
        let mut mock = MockSpeechTransport::new();
        mock.expect_send()
            .with(eq(RemoteRequest::CheckAvailability))
            .returning(|_| Ok(RemoteResponse::with_voices(1)));
        mock.expect_send()
            .with(eq(RemoteRequest::generate("Hi", "voice-b", "eleven_multilingual_v2")))
            .times(1)
            .returning(|_| Ok(RemoteResponse::with_audio("AQID")));
        let (client, _) = client(mock);

        client.set_voice("voice-b");
        assert_eq!(client.voice_id(), "voice-b");
        assert_eq!(client.try_synthesize("Hi").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_play_reports_start_and_uses_output() {
        let (client, output) = client(MockSpeechTransport::new());
        let started = std::sync::atomic::AtomicBool::new(false);

        SynthesisEngine::play(&client, PreparedSpeech::Audio(vec![9, 9]), &|handle: Option<UtteranceHandle>| {
            assert!(handle.is_none());
            started.store(true, std::sync::atomic::Ordering::SeqCst);
        })
        .await
        .unwrap();

        assert!(started.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(output.played(), vec![vec![9, 9]]);
    }

    #[tokio::test]
    async fn test_playback_failure_is_remote_playback_error() {
        let (client, output) = client(MockSpeechTransport::new());
        output.fail_with("decoder error");

        let err = client.play(vec![1]).await.unwrap_err();
        assert_eq!(err, SpeechError::RemotePlaybackFailed("decoder error".into()));
    }
}
