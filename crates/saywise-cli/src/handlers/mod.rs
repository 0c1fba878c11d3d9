//! Command handlers.
//!
//! Each handler takes the resolved [`SpeechConfig`] and prints its result to
//! stdout. Diagnostics go through `tracing`.

pub mod probe;
pub mod say;
pub mod voices;

use saywise_core::SpeechConfig;

/// Environment configuration with the command-line overrides applied.
pub fn load_config(remote_url: Option<String>) -> anyhow::Result<SpeechConfig> {
    let mut config = SpeechConfig::from_env();
    if let Some(url) = remote_url {
        config = config.with_remote_endpoint(url);
    }
    config.validate()?;
    Ok(config)
}
