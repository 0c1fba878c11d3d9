//! Public configuration for the remote synthesis client.

use std::time::Duration;

use saywise_core::config::{DEFAULT_HTTP_TIMEOUT, DEFAULT_MODEL_ID, DEFAULT_VOICE_ID};
use saywise_core::{DEFAULT_AVAILABILITY_TTL, SpeechConfig};

/// Configuration for [`RemoteSynthesisClient`](crate::RemoteSynthesisClient).
///
/// # Example
///
/// ```
/// use saywise_remote::RemoteClientConfig;
/// use std::time::Duration;
///
/// let config = RemoteClientConfig::new("https://voice.example.com/speech")
///     .with_timeout(Duration::from_secs(10))
///     .with_voice_id("EXAVITQu4vr4xnSDxMaL");
/// assert_eq!(config.endpoint(), "https://voice.example.com/speech");
/// ```
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    pub(crate) endpoint: String,
    pub(crate) token: Option<String>,
    pub(crate) user_agent: String,
    pub(crate) timeout: Duration,
    pub(crate) voice_id: String,
    pub(crate) model_id: String,
    pub(crate) availability_ttl: Duration,
}

impl RemoteClientConfig {
    /// Configuration for `endpoint` with default voice, model and timeouts.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            user_agent: concat!("saywise-remote/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            availability_ttl: DEFAULT_AVAILABILITY_TTL,
        }
    }

    /// Derive from a [`SpeechConfig`]. `None` when no endpoint is configured.
    pub fn from_speech_config(config: &SpeechConfig) -> Option<Self> {
        let endpoint = config.remote_endpoint.as_ref()?;
        Some(
            Self::new(endpoint.clone())
                .with_optional_token(config.remote_token.clone())
                .with_timeout(config.http_timeout)
                .with_voice_id(config.voice_id.clone())
                .with_model_id(config.model_id.clone())
                .with_availability_ttl(config.availability_ttl),
        )
    }

    /// Set a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set an optional bearer token.
    #[must_use]
    pub fn with_optional_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the HTTP request timeout.
    ///
    /// Defaults to 30 seconds.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set how long a probe result is reused.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub const fn with_availability_ttl(mut self, ttl: Duration) -> Self {
        self.availability_ttl = ttl;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub const fn availability_ttl(&self) -> Duration {
        self.availability_ttl
    }
}
