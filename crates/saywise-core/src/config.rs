//! Speech configuration.
//!
//! [`SpeechConfig`] carries everything the speech context needs at
//! construction time. Defaults are usable out of the box; environment
//! variables (`SAYWISE_*`) override them, and the builder methods override
//! both.
//!
//! # Example
//!
//! ```
//! use saywise_core::SpeechConfig;
//! use std::time::Duration;
//!
//! let config = SpeechConfig::new()
//!     .with_remote_endpoint("https://voice.example.com/speech")
//!     .with_settle_delay(Duration::from_millis(100));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_AVAILABILITY_TTL;

/// Default premium voice identifier.
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Default premium synthesis model.
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

/// Pause between one request finishing and the next being dequeued.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(250);

/// How long to wait for the device to enumerate its voices.
pub const DEFAULT_VOICE_LOAD_TIMEOUT: Duration = Duration::from_secs(2);

/// HTTP timeout for the remote service.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters for the on-device voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalVoiceConfig {
    /// Speed multiplier (0.1–10.0).
    pub rate: f32,
    /// Pitch multiplier (0.0–2.0).
    pub pitch: f32,
    /// Volume (0.0–1.0).
    pub volume: f32,
    /// Language prefix used for voice selection, e.g. `en`.
    pub language: String,
    /// Explicit voice name or id; bypasses automatic selection.
    pub voice: Option<String>,
}

impl Default for LocalVoiceConfig {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
            language: "en".to_string(),
            voice: None,
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Remote endpoint is not a valid http(s) URL: {0}")]
    InvalidEndpoint(String),

    #[error("Local speech rate must be between 0.1 and 10.0, got {0}")]
    InvalidRate(f32),

    #[error("Local speech pitch must be between 0.0 and 2.0, got {0}")]
    InvalidPitch(f32),

    #[error("Local speech volume must be between 0.0 and 1.0, got {0}")]
    InvalidVolume(f32),

    #[error("Voice id cannot be empty")]
    EmptyVoiceId,

    #[error("Availability TTL must be greater than zero")]
    ZeroAvailabilityTtl,
}

/// Configuration for a speech context.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    /// Remote synthesis endpoint. `None` disables the remote engine.
    pub remote_endpoint: Option<String>,
    /// Bearer token sent to the remote endpoint.
    pub remote_token: Option<String>,
    /// Premium voice id.
    pub voice_id: String,
    /// Premium model id.
    pub model_id: String,
    /// How long an availability probe result is reused.
    pub availability_ttl: Duration,
    /// HTTP timeout for remote calls.
    pub http_timeout: Duration,
    /// Try the remote engine before the device voice.
    pub prefer_remote: bool,
    /// Delay between queue items so audio hardware can settle.
    pub settle_delay: Duration,
    /// Hold the queue until `enable_user_interaction` is called.
    pub require_user_interaction: bool,
    /// Upper bound on waiting for device voices to load.
    pub voice_load_timeout: Duration,
    /// On-device voice parameters.
    pub local: LocalVoiceConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            remote_endpoint: None,
            remote_token: None,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            availability_ttl: DEFAULT_AVAILABILITY_TTL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            prefer_remote: true,
            settle_delay: DEFAULT_SETTLE_DELAY,
            require_user_interaction: false,
            voice_load_timeout: DEFAULT_VOICE_LOAD_TIMEOUT,
            local: LocalVoiceConfig::default(),
        }
    }
}

impl SpeechConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SAYWISE_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `SAYWISE_REMOTE_URL` | `remote_endpoint` |
    /// | `SAYWISE_REMOTE_TOKEN` | `remote_token` |
    /// | `SAYWISE_VOICE_ID` | `voice_id` |
    /// | `SAYWISE_MODEL_ID` | `model_id` |
    /// | `SAYWISE_AVAILABILITY_TTL_MS` | `availability_ttl` |
    /// | `SAYWISE_HTTP_TIMEOUT_SECS` | `http_timeout` |
    /// | `SAYWISE_PREFER_REMOTE` | `prefer_remote` |
    /// | `SAYWISE_SETTLE_DELAY_MS` | `settle_delay` |
    /// | `SAYWISE_REQUIRE_INTERACTION` | `require_user_interaction` |
    /// | `SAYWISE_LOCAL_RATE` / `_PITCH` / `_VOLUME` | `local.*` |
    /// | `SAYWISE_LOCAL_LANGUAGE` / `_VOICE` | `local.*` |
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = get("SAYWISE_REMOTE_URL") {
            config.remote_endpoint = Some(url);
        }
        if let Some(token) = get("SAYWISE_REMOTE_TOKEN") {
            config.remote_token = Some(token);
        }
        if let Some(voice) = get("SAYWISE_VOICE_ID") {
            config.voice_id = voice;
        }
        if let Some(model) = get("SAYWISE_MODEL_ID") {
            config.model_id = model;
        }
        if let Some(ms) = parse_var::<u64>("SAYWISE_AVAILABILITY_TTL_MS", get("SAYWISE_AVAILABILITY_TTL_MS")) {
            config.availability_ttl = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>("SAYWISE_HTTP_TIMEOUT_SECS", get("SAYWISE_HTTP_TIMEOUT_SECS")) {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = parse_flag("SAYWISE_PREFER_REMOTE", get("SAYWISE_PREFER_REMOTE")) {
            config.prefer_remote = flag;
        }
        if let Some(ms) = parse_var::<u64>("SAYWISE_SETTLE_DELAY_MS", get("SAYWISE_SETTLE_DELAY_MS")) {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(flag) = parse_flag("SAYWISE_REQUIRE_INTERACTION", get("SAYWISE_REQUIRE_INTERACTION")) {
            config.require_user_interaction = flag;
        }
        if let Some(rate) = parse_var::<f32>("SAYWISE_LOCAL_RATE", get("SAYWISE_LOCAL_RATE")) {
            config.local.rate = rate;
        }
        if let Some(pitch) = parse_var::<f32>("SAYWISE_LOCAL_PITCH", get("SAYWISE_LOCAL_PITCH")) {
            config.local.pitch = pitch;
        }
        if let Some(volume) = parse_var::<f32>("SAYWISE_LOCAL_VOLUME", get("SAYWISE_LOCAL_VOLUME")) {
            config.local.volume = volume;
        }
        if let Some(language) = get("SAYWISE_LOCAL_LANGUAGE") {
            config.local.language = language;
        }
        if let Some(voice) = get("SAYWISE_LOCAL_VOICE") {
            config.local.voice = Some(voice);
        }

        config
    }

    /// Set the remote synthesis endpoint.
    #[must_use]
    pub fn with_remote_endpoint(mut self, url: impl Into<String>) -> Self {
        self.remote_endpoint = Some(url.into());
        self
    }

    /// Set the bearer token for the remote endpoint.
    #[must_use]
    pub fn with_remote_token(mut self, token: impl Into<String>) -> Self {
        self.remote_token = Some(token.into());
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

    /// Set how long an availability probe result is reused.
    ///
    /// Defaults to 5 seconds.
    #[must_use]
    pub const fn with_availability_ttl(mut self, ttl: Duration) -> Self {
        self.availability_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_prefer_remote(mut self, prefer: bool) -> Self {
        self.prefer_remote = prefer;
        self
    }

    /// Set the pause between queue items.
    ///
    /// Defaults to 250ms.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_require_user_interaction(mut self, required: bool) -> Self {
        self.require_user_interaction = required;
        self
    }

    #[must_use]
    pub const fn with_voice_load_timeout(mut self, timeout: Duration) -> Self {
        self.voice_load_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_local(mut self, local: LocalVoiceConfig) -> Self {
        self.local = local;
        self
    }

    /// Whether a remote engine should be constructed at all.
    pub const fn remote_enabled(&self) -> bool {
        self.remote_endpoint.is_some()
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.remote_endpoint {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidEndpoint(url.clone()));
            }
        }

        if self.voice_id.trim().is_empty() {
            return Err(ConfigError::EmptyVoiceId);
        }

        if self.availability_ttl.is_zero() {
            return Err(ConfigError::ZeroAvailabilityTtl);
        }

        let local = &self.local;
        if !(0.1..=10.0).contains(&local.rate) {
            return Err(ConfigError::InvalidRate(local.rate));
        }
        if !(0.0..=2.0).contains(&local.pitch) {
            return Err(ConfigError::InvalidPitch(local.pitch));
        }
        if !(0.0..=1.0).contains(&local.volume) {
            return Err(ConfigError::InvalidVolume(local.volume));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "Ignoring unparseable configuration value");
            None
        }
    }
}

fn parse_flag(key: &str, value: Option<String>) -> Option<bool> {
    let value = value?;
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(key, value = %value, "Ignoring unparseable boolean flag");
            None
        }
    }
}
