//! Integration tests for the availability probe and the client built on it.
//!
//! A counting transport stands in for the network so the tests can assert
//! exactly how many requests reach the service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use saywise_core::{Availability, AudioOutput, SpeechError, SynthesisEngine};
use saywise_remote::{
    RemoteClientConfig, RemoteError, RemoteRequest, RemoteResponse, RemoteResult,
    RemoteSynthesisClient, SpeechTransport,
};

// ── Test doubles ───────────────────────────────────────────────────

/// Transport that lists voices after a fixed latency and counts calls.
struct CountingTransport {
    latency: Duration,
    voices: usize,
    probes: AtomicUsize,
    syntheses: AtomicUsize,
}

impl CountingTransport {
    fn new(latency: Duration, voices: usize) -> Self {
        Self {
            latency,
            voices,
            probes: AtomicUsize::new(0),
            syntheses: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechTransport for CountingTransport {
    async fn send(&self, request: &RemoteRequest) -> RemoteResult<RemoteResponse> {
        match request {
            RemoteRequest::CheckAvailability => {
                self.probes.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(self.latency).await;
                Ok(RemoteResponse::with_voices(self.voices))
            }
            RemoteRequest::GenerateSpeech { .. } => {
                self.syntheses.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::Api("quota".to_string()))
            }
        }
    }
}

/// Output that plays nothing.
struct SilentOutput;

#[async_trait]
impl AudioOutput for SilentOutput {
    async fn play(&self, _audio: Vec<u8>) -> Result<(), SpeechError> {
        Ok(())
    }

    fn stop(&self) {}
}

fn client(transport: Arc<CountingTransport>) -> RemoteSynthesisClient {
    let config = RemoteClientConfig::new("https://voice.invalid/speech");
    RemoteSynthesisClient::with_transport(&config, transport, Arc::new(SilentOutput))
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn concurrent_probes_are_not_coalesced() {
    let transport = Arc::new(CountingTransport::new(Duration::from_millis(200), 1));
    let client = client(Arc::clone(&transport));

    let (a, b) = tokio::join!(
        client.check_availability(false),
        client.check_availability(false)
    );

    assert!(a && b);
    assert_eq!(transport.probes.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn probe_after_completion_within_ttl_is_cached() {
    let transport = Arc::new(CountingTransport::new(Duration::from_millis(50), 1));
    let client = client(Arc::clone(&transport));

    assert!(client.check_availability(false).await);
    tokio::time::advance(Duration::from_millis(4_900)).await;
    assert!(client.check_availability(false).await);
    assert_eq!(transport.probes.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(200)).await;
    assert!(client.check_availability(false).await);
    assert_eq!(transport.probes.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn availability_reports_checking_while_probe_in_flight() {
    let transport = Arc::new(CountingTransport::new(Duration::from_millis(300), 1));
    let client = Arc::new(client(Arc::clone(&transport)));
    assert_eq!(client.availability(), Availability::Unknown);

    let probing = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.probe(false).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(client.availability(), Availability::Checking);

    client.wait_for_availability().await;
    assert_eq!(client.availability(), Availability::Available);
    assert!(probing.await.unwrap());
}

#[tokio::test]
async fn synthesis_is_skipped_when_no_voices() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO, 0));
    let client = client(Arc::clone(&transport));

    let err = SynthesisEngine::synthesize(&client, "Hello").await.unwrap_err();
    assert!(matches!(err, SpeechError::RemoteUnavailable(_)));
    assert_eq!(transport.syntheses.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn quota_error_surfaces_as_synthesis_failure() {
    let transport = Arc::new(CountingTransport::new(Duration::ZERO, 2));
    let client = client(Arc::clone(&transport));

    let result = client.synthesize("Hello").await;
    assert!(result.audio.is_none());
    assert_eq!(result.error.as_deref(), Some("remote service error: quota"));
    assert_eq!(transport.syntheses.load(Ordering::SeqCst), 1);
}
