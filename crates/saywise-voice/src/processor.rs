//! Serial queue processor.
//!
//! Exactly one request is in flight at any time. The `busy` flag is the
//! actual mutex; `SpeechState::is_speaking` is its published mirror. After a
//! request finishes, the next `tick` is scheduled on a separate task after
//! the settle delay, so completion never recurses into the next request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use saywise_core::{Deduplicator, RequestQueue, SpeechRequest, SpeechStateUpdate, StateStore};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::orchestrator::{FallbackOrchestrator, RunReport};

struct Inner {
    queue: Mutex<RequestQueue>,
    orchestrator: Arc<FallbackOrchestrator>,
    state: StateStore,
    dedup: Arc<Deduplicator>,
    busy: AtomicBool,
    disposed: AtomicBool,
    settle_delay: Duration,
    require_interaction: bool,
    completed: watch::Sender<u64>,
    last_report: Mutex<Option<RunReport>>,
    runtime: Handle,
}

/// Drains the request queue through the orchestrator, one request at a time.
#[derive(Clone)]
pub struct QueueProcessor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueueProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProcessor")
            .field("pending", &self.pending())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl QueueProcessor {
    pub fn new(
        orchestrator: Arc<FallbackOrchestrator>,
        state: StateStore,
        dedup: Arc<Deduplicator>,
        settle_delay: Duration,
        require_interaction: bool,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(RequestQueue::new()),
                orchestrator,
                state,
                dedup,
                busy: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                settle_delay,
                require_interaction,
                completed: watch::Sender::new(0),
                last_report: Mutex::new(None),
                runtime,
            }),
        }
    }

    fn queue(&self) -> MutexGuard<'_, RequestQueue> {
        self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a request and try to start it.
    pub fn enqueue(&self, request: SpeechRequest) {
        tracing::debug!(
            request_id = %request.id,
            priority = request.priority,
            text = request.preview(),
            "Speech request queued"
        );
        self.queue().enqueue(request);
        self.tick();
    }

    /// Number of requests waiting (not counting the one in flight).
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    /// Drop every waiting request, returning how many were dropped.
    pub fn clear_queue(&self) -> usize {
        let dropped = self.queue().clear();
        if dropped > 0 {
            tracing::debug!(dropped, "Speech queue cleared");
        }
        dropped
    }

    /// Report of the most recently finished request.
    pub fn last_report(&self) -> Option<RunReport> {
        self.inner
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a new request may start right now (ignoring `busy`).
    fn can_start(&self) -> bool {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return false;
        }
        let state = self.inner.state.get_state();
        state.is_enabled && (!self.inner.require_interaction || state.has_user_interacted)
    }

    /// Start the next request if nothing is in flight.
    ///
    /// No-op when busy, when the queue is empty, when speech is disabled, or
    /// when a user gesture is required and has not happened yet.
    pub fn tick(&self) {
        loop {
            if !self.can_start() {
                return;
            }
            if self
                .inner
                .busy
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }

            let next = self.queue().dequeue();
            if let Some(request) = next {
                self.inner
                    .state
                    .update(SpeechStateUpdate::new().with_speaking(true));
                let this = self.clone();
                self.inner.runtime.spawn(async move { this.process(request).await });
                return;
            }

            self.inner.busy.store(false, Ordering::SeqCst);
            // An enqueue may have raced with the empty dequeue above.
            if self.queue().is_empty() {
                return;
            }
        }
    }

    async fn process(self, request: SpeechRequest) {
        tracing::info!(
            request_id = %request.id,
            priority = request.priority,
            context = request.context.as_deref().unwrap_or(""),
            text = request.preview(),
            "Speaking request"
        );

        let report = self.inner.orchestrator.run(&request).await;
        tracing::debug!(
            request_id = %request.id,
            engine = %report.outcome.engine,
            success = report.outcome.success,
            "Speech request finished"
        );

        if request.priority {
            self.inner.dedup.remember(&request.text);
        }
        *self
            .inner
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report);

        self.inner
            .state
            .update(SpeechStateUpdate::new().with_speaking(false));
        self.inner.busy.store(false, Ordering::SeqCst);
        self.inner.completed.send_modify(|n| *n += 1);

        let this = self.clone();
        let delay = self.inner.settle_delay;
        self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            this.tick();
        });
    }

    /// Resolve once nothing is in flight and nothing startable is queued.
    pub async fn wait_idle(&self) {
        let mut completed = self.inner.completed.subscribe();
        let mut state = self.inner.state.watch();
        loop {
            let idle = !self.is_busy() && (self.queue().is_empty() || !self.can_start());
            if idle {
                return;
            }
            tokio::select! {
                changed = completed.changed() => if changed.is_err() { return },
                changed = state.changed() => if changed.is_err() { return },
            }
        }
    }

    /// Stop accepting work and drop everything queued.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.clear_queue();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::EnginePreference;
    use async_trait::async_trait;
    use saywise_core::{EngineKind, PreparedSpeech, SpeechError, SynthesisEngine, UtteranceHandle};

    /// Local engine that finishes instantly and records what it spoke.
    #[derive(Default)]
    struct InstantEngine {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SynthesisEngine for InstantEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::Local
        }

        async fn probe(&self, _force_refresh: bool) -> bool {
            true
        }

        async fn synthesize(&self, text: &str) -> Result<PreparedSpeech, SpeechError> {
            Ok(PreparedSpeech::Audio(text.as_bytes().to_vec()))
        }

        async fn play(
            &self,
            speech: PreparedSpeech,
            on_started: &(dyn Fn(Option<UtteranceHandle>) + Send + Sync),
        ) -> Result<(), SpeechError> {
            on_started(Some(UtteranceHandle(1)));
            if let PreparedSpeech::Audio(bytes) = speech {
                self.spoken
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&bytes).into_owned());
            }
            Ok(())
        }

        fn stop(&self) {}
    }

    fn processor(engine: &Arc<InstantEngine>, require_interaction: bool) -> (QueueProcessor, StateStore) {
        let state = StateStore::new();
        let local: Arc<dyn SynthesisEngine> = engine.clone();
        let orchestrator = Arc::new(FallbackOrchestrator::new(
            None,
            local,
            state.clone(),
            EnginePreference::Local,
        ));
        let processor = QueueProcessor::new(
            orchestrator,
            state.clone(),
            Arc::new(Deduplicator::new()),
            Duration::from_millis(250),
            require_interaction,
            Handle::current(),
        );
        (processor, state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_request_waits_for_settle_delay() {
        let engine = Arc::new(InstantEngine::default());
        let (processor, _state) = processor(&engine, false);

        processor.enqueue(SpeechRequest::new("one", false));
        processor.enqueue(SpeechRequest::new("two", false));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(engine.spoken.lock().unwrap().clone(), vec!["one"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(engine.spoken.lock().unwrap().len(), 1);

        processor.wait_idle().await;
        assert_eq!(engine.spoken.lock().unwrap().clone(), vec!["one", "two"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interaction_gate_holds_queue() {
        let engine = Arc::new(InstantEngine::default());
        let (processor, state) = processor(&engine, true);

        processor.enqueue(SpeechRequest::new("hello", false));
        processor.wait_idle().await;
        assert!(engine.spoken.lock().unwrap().is_empty());
        assert_eq!(processor.pending(), 1);

        state.update(SpeechStateUpdate::new().with_user_interacted(true));
        processor.tick();
        processor.wait_idle().await;
        assert_eq!(engine.spoken.lock().unwrap().clone(), vec!["hello"]);
        assert!(!state.get_state().is_speaking);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disposed_processor_ignores_requests() {
        let engine = Arc::new(InstantEngine::default());
        let (processor, _state) = processor(&engine, false);

        processor.dispose();
        processor.enqueue(SpeechRequest::new("late", false));
        processor.wait_idle().await;
        assert!(engine.spoken.lock().unwrap().is_empty());
        assert!(processor.last_report().is_none());
    }
}
