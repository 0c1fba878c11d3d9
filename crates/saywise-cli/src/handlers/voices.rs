//! `saywise voices` - list device voices.

use saywise_core::SpeechConfig;
use saywise_voice::{LocalSynthesisClient, default_device};

pub async fn execute(config: &SpeechConfig) -> anyhow::Result<()> {
    let client = LocalSynthesisClient::new(default_device(), config.local.clone());
    if !client.is_supported() {
        println!("Device speech is not available in this build.");
        println!("Rebuild with `--features native` to use the OS speech engine.");
        return Ok(());
    }

    let voices = client.load_voices(config.voice_load_timeout).await;
    let selected = client.selected_voice();

    if voices.is_empty() {
        println!("No device voices reported; the runtime default voice will be used.");
        return Ok(());
    }

    for voice in &voices {
        let marker = if selected.as_ref().is_some_and(|s| s.id == voice.id) {
            '*'
        } else {
            ' '
        };
        println!("{marker} {:<40} {:<8} {}", voice.name, voice.language, voice.id);
    }
    println!();
    println!("{} voices, * = selected for language '{}'", voices.len(), config.local.language);

    Ok(())
}
