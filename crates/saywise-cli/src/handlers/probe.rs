//! `saywise probe` - force a remote availability check.

use std::sync::Arc;

use anyhow::Context;
use saywise_core::SpeechConfig;
use saywise_remote::{RemoteClientConfig, RemoteSynthesisClient};
use saywise_voice::NullOutput;

pub async fn execute(config: &SpeechConfig) -> anyhow::Result<()> {
    let remote_config = RemoteClientConfig::from_speech_config(config)
        .context("no remote endpoint configured (set SAYWISE_REMOTE_URL or --remote-url)")?;

    let client = RemoteSynthesisClient::new(&remote_config, Arc::new(NullOutput))?;
    tracing::debug!(endpoint = %remote_config.endpoint(), "Probing remote service");

    let available = client.check_availability(true).await;
    println!("endpoint:  {}", remote_config.endpoint());
    println!("voice:     {}", client.voice_id());
    println!("model:     {}", client.model_id());
    println!("available: {available}");
    if let Some(error) = client.cache().last_error() {
        println!("error:     {error}");
    }
    println!("cached for {} ms", client.cache().ttl().as_millis());

    Ok(())
}
