//! Remote-first, local-fallback state machine.
//!
//! ```text
//! Idle ─▶ [WaitingOnAvailability] ─▶ TryingRemote ─▶ RemoteSucceeded ─▶ Done
//!                                          │
//!                                          └──────▶ TryingLocal ──────▶ Done
//! ```
//!
//! The orchestrator runs exactly one request at a time (the queue processor
//! guarantees this) and never returns an error: every engine failure becomes
//! a state update plus a fallback decision, summarised in a [`RunReport`].
//! Only remote errors for which [`SpeechError::triggers_fallback`] holds move
//! on to the local engine; anything else ends the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use saywise_core::{
    Availability, EngineKind, EngineOutcome, FALLBACK_NOTICE, RequestId, SpeechError,
    SpeechRequest, SpeechStateUpdate, StateStore, SynthesisEngine, UtteranceHandle,
};
use serde::Serialize;

/// Which engine the orchestrator tries first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EnginePreference {
    /// Try the remote service, fall back to the device voice.
    Remote,
    /// Use the device voice only.
    Local,
}

impl EnginePreference {
    pub const fn from_prefer_remote(prefer_remote: bool) -> Self {
        if prefer_remote { Self::Remote } else { Self::Local }
    }
}

/// One step of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrchestratorPhase {
    Idle,
    WaitingOnAvailability,
    TryingRemote,
    RemoteSucceeded,
    TryingLocal,
    Done,
}

/// What happened to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub request_id: RequestId,
    pub outcome: EngineOutcome,
    /// Every phase entered, in order.
    pub phases: Vec<OrchestratorPhase>,
    /// Why the remote engine was skipped or failed, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

impl RunReport {
    /// Whether the device voice spoke after the remote engine was preferred.
    pub const fn fell_back(&self) -> bool {
        self.remote_error.is_some() && matches!(self.outcome.engine, EngineKind::Local)
    }
}

/// Records phases for one run and traces every transition.
struct PhaseTrace {
    request_id: RequestId,
    phases: Vec<OrchestratorPhase>,
}

impl PhaseTrace {
    fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            phases: vec![OrchestratorPhase::Idle],
        }
    }

    fn enter(&mut self, phase: OrchestratorPhase) {
        tracing::debug!(request_id = %self.request_id, ?phase, "Orchestrator transition");
        self.phases.push(phase);
    }

    fn finish(mut self, outcome: EngineOutcome, remote_error: Option<String>) -> RunReport {
        self.enter(OrchestratorPhase::Done);
        RunReport {
            request_id: self.request_id,
            outcome,
            phases: self.phases,
            remote_error,
        }
    }
}

/// Runs a request through the remote engine, falling back to the local one.
pub struct FallbackOrchestrator {
    remote: Option<Arc<dyn SynthesisEngine>>,
    local: Arc<dyn SynthesisEngine>,
    state: StateStore,
    prefer_remote: AtomicBool,
}

impl std::fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOrchestrator")
            .field("remote_configured", &self.remote.is_some())
            .field("preference", &self.preference())
            .finish_non_exhaustive()
    }
}

impl FallbackOrchestrator {
    pub fn new(
        remote: Option<Arc<dyn SynthesisEngine>>,
        local: Arc<dyn SynthesisEngine>,
        state: StateStore,
        preference: EnginePreference,
    ) -> Self {
        Self {
            remote,
            local,
            state,
            prefer_remote: AtomicBool::new(preference == EnginePreference::Remote),
        }
    }

    pub fn preference(&self) -> EnginePreference {
        EnginePreference::from_prefer_remote(self.prefer_remote.load(Ordering::SeqCst))
    }

    pub fn set_preference(&self, preference: EnginePreference) {
        tracing::info!(?preference, "Engine preference changed");
        self.prefer_remote
            .store(preference == EnginePreference::Remote, Ordering::SeqCst);
    }

    pub const fn remote(&self) -> Option<&Arc<dyn SynthesisEngine>> {
        self.remote.as_ref()
    }

    pub const fn local(&self) -> &Arc<dyn SynthesisEngine> {
        &self.local
    }

    /// The remote engine, if it is configured and currently preferred.
    fn preferred_remote(&self) -> Option<&Arc<dyn SynthesisEngine>> {
        self.remote
            .as_ref()
            .filter(|_| self.preference() == EnginePreference::Remote)
    }

    /// Cancel the active local utterance.
    pub fn stop_local(&self) {
        self.local.stop();
    }

    /// Stop both engines.
    pub fn stop_all(&self) {
        if let Some(remote) = &self.remote {
            remote.stop();
        }
        self.local.stop();
    }

    /// Speak one request, returning what happened.
    pub async fn run(&self, request: &SpeechRequest) -> RunReport {
        let mut trace = PhaseTrace::new(request.id);
        let mut remote_error = None;

        if let Some(remote) = self.preferred_remote() {
            if remote.availability() == Availability::Checking {
                trace.enter(OrchestratorPhase::WaitingOnAvailability);
                self.state
                    .update(SpeechStateUpdate::new().with_checking_remote(true));
                remote.wait_for_availability().await;
                self.state
                    .update(SpeechStateUpdate::new().with_checking_remote(false));
            }

            let availability = remote.availability();
            if availability.worth_trying() {
                trace.enter(OrchestratorPhase::TryingRemote);
                match self.try_remote(remote.as_ref(), availability, &request.text).await {
                    Ok(()) => {
                        trace.enter(OrchestratorPhase::RemoteSucceeded);
                        self.state.update(
                            SpeechStateUpdate::new()
                                .with_using_remote(true)
                                .with_error(None),
                        );
                        return trace.finish(EngineOutcome::succeeded(EngineKind::Remote), None);
                    }
                    Err(SpeechError::Cancelled) => {
                        tracing::debug!(request_id = %request.id, "Remote playback cancelled");
                        return trace.finish(
                            EngineOutcome::failed(EngineKind::Remote, SpeechError::Cancelled.to_string()),
                            None,
                        );
                    }
                    Err(e) if e.triggers_fallback() => {
                        tracing::warn!(request_id = %request.id, error = %e, "Remote speech failed, falling back");
                        remote_error = Some(e.to_string());
                    }
                    Err(e) => {
                        tracing::warn!(request_id = %request.id, error = %e, "Remote speech failed");
                        self.state
                            .update(SpeechStateUpdate::new().with_error(Some(e.to_string())));
                        return trace.finish(EngineOutcome::failed(EngineKind::Remote, e.to_string()), None);
                    }
                }
            } else {
                tracing::debug!(request_id = %request.id, "Remote engine known unavailable, skipping");
                remote_error = Some(
                    SpeechError::RemoteUnavailable("cached probe reported no voices".to_string())
                        .to_string(),
                );
            }
        }

        trace.enter(OrchestratorPhase::TryingLocal);
        self.state
            .update(SpeechStateUpdate::new().with_using_remote(false));
        let fell_back = remote_error.is_some();
        let outcome = match self.try_local(&request.text).await {
            Ok(()) => {
                let notice = fell_back.then(|| FALLBACK_NOTICE.to_string());
                self.state.update(SpeechStateUpdate::new().with_error(notice));
                EngineOutcome::succeeded(EngineKind::Local)
            }
            Err(SpeechError::Cancelled) => {
                tracing::debug!(request_id = %request.id, "Local utterance cancelled");
                EngineOutcome::failed(EngineKind::Local, SpeechError::Cancelled.to_string())
            }
            Err(e) => {
                tracing::warn!(request_id = %request.id, error = %e, "Local speech failed");
                self.state
                    .update(SpeechStateUpdate::new().with_error(Some(e.to_string())));
                EngineOutcome::failed(EngineKind::Local, e.to_string())
            }
        };

        trace.finish(outcome, remote_error)
    }

    async fn try_remote(
        &self,
        remote: &dyn SynthesisEngine,
        availability: Availability,
        text: &str,
    ) -> Result<(), SpeechError> {
        if availability == Availability::Unknown {
            self.state
                .update(SpeechStateUpdate::new().with_checking_remote(true));
            let available = remote.probe(false).await;
            self.state
                .update(SpeechStateUpdate::new().with_checking_remote(false));
            if !available {
                return Err(SpeechError::RemoteUnavailable(
                    "probe reported no usable voices".to_string(),
                ));
            }
        }

        self.state.update(SpeechStateUpdate::new().with_loading(true));
        let speech = remote.synthesize(text).await;
        self.state.update(SpeechStateUpdate::new().with_loading(false));

        let state = &self.state;
        remote
            .play(speech?, &|_handle: Option<UtteranceHandle>| {
                state.update(
                    SpeechStateUpdate::new()
                        .with_using_remote(true)
                        .with_handle(None),
                );
            })
            .await
    }

    async fn try_local(&self, text: &str) -> Result<(), SpeechError> {
        let speech = self.local.synthesize(text).await?;

        let state = &self.state;
        let result = self
            .local
            .play(speech, &|handle: Option<UtteranceHandle>| {
                state.update(
                    SpeechStateUpdate::new()
                        .with_using_remote(false)
                        .with_handle(handle),
                );
            })
            .await;

        self.state.update(SpeechStateUpdate::new().with_handle(None));
        result
    }
}
