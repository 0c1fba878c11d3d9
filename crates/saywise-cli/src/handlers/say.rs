//! `saywise say` - speak text through the full facade.

use saywise_core::SpeechConfig;
use saywise_voice::{SpeakDisposition, SpeechContext};

pub struct SayArgs {
    pub text: String,
    pub priority: bool,
    pub local_only: bool,
    pub json: bool,
}

pub async fn execute(config: SpeechConfig, args: SayArgs) -> anyhow::Result<()> {
    let config = if args.local_only {
        config.with_prefer_remote(false)
    } else {
        config
    };

    let speech = SpeechContext::with_default_backends(config)?;
    let _subscription = speech.subscribe(|state| tracing::debug!(?state, "Speech state"));

    speech.initialize().await;
    speech.enable_user_interaction();

    match speech.speak(&args.text, args.priority, Some("cli")) {
        SpeakDisposition::Queued(id) => tracing::debug!(%id, "Queued"),
        other => anyhow::bail!("request was not queued: {other:?}"),
    }

    tokio::select! {
        () = speech.wait_idle() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            speech.force_stop_all();
            speech.dispose();
            anyhow::bail!("interrupted");
        }
    }

    let state = speech.state();
    let report = speech.last_report();
    if args.json {
        let output = serde_json::json!({ "report": report, "state": state });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if let Some(report) = &report {
        println!(
            "engine: {} ({})",
            report.outcome.engine,
            if report.outcome.success { "spoken" } else { "failed" }
        );
        if let Some(remote_error) = &report.remote_error {
            println!("remote: {remote_error}");
        }
        if let Some(error) = &state.last_error {
            println!("notice: {error}");
        }
    }

    speech.dispose();
    Ok(())
}
