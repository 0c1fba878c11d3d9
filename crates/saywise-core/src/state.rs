//! Observable speech state.
//!
//! [`StateStore`] holds the single [`SpeechState`] of a speech context and
//! publishes changes to subscribers. It is the only way UI surfaces learn
//! what the speech subsystem is doing.
//!
//! Two subscription styles are offered:
//!
//! - [`StateStore::subscribe`] takes a callback, replays the current state
//!   synchronously and then calls it on every change
//! - [`StateStore::watch`] hands out a `tokio::sync::watch` receiver for async
//!   consumers
//!
//! Callbacks run one snapshot at a time and never see an older state after a
//! newer one. Under contention, intermediate snapshots may be skipped; the
//! final state is always delivered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::UtteranceHandle;

/// Snapshot of everything the speech subsystem publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechState {
    /// A request is being processed (the audio channel is taken).
    pub is_speaking: bool,
    /// Speech output is switched on.
    pub is_enabled: bool,
    /// A user gesture has been recorded.
    pub has_user_interacted: bool,
    /// Initialization finished.
    pub is_ready: bool,
    /// Remote audio is being synthesized.
    pub is_loading: bool,
    /// A remote availability probe is in flight.
    pub is_checking_remote: bool,
    /// Device voices have been enumerated.
    pub voices_loaded: bool,
    /// The last request was spoken by the remote engine.
    pub using_remote_engine: bool,
    /// Last terminal error or fallback notice.
    pub last_error: Option<String>,
    /// Handle of the active local utterance.
    pub current_handle: Option<UtteranceHandle>,
}

impl Default for SpeechState {
    fn default() -> Self {
        Self {
            is_speaking: false,
            is_enabled: true,
            has_user_interacted: false,
            is_ready: false,
            is_loading: false,
            is_checking_remote: false,
            voices_loaded: false,
            using_remote_engine: false,
            last_error: None,
            current_handle: None,
        }
    }
}

impl SpeechState {
    /// Apply a partial update, returning whether anything changed.
    pub fn apply(&mut self, update: &SpeechStateUpdate) -> bool {
        let before = self.clone();

        if let Some(v) = update.is_speaking {
            self.is_speaking = v;
        }
        if let Some(v) = update.is_enabled {
            self.is_enabled = v;
        }
        if let Some(v) = update.has_user_interacted {
            self.has_user_interacted = v;
        }
        if let Some(v) = update.is_ready {
            self.is_ready = v;
        }
        if let Some(v) = update.is_loading {
            self.is_loading = v;
        }
        if let Some(v) = update.is_checking_remote {
            self.is_checking_remote = v;
        }
        if let Some(v) = update.voices_loaded {
            self.voices_loaded = v;
        }
        if let Some(v) = update.using_remote_engine {
            self.using_remote_engine = v;
        }
        if let Some(ref err) = update.last_error {
            self.last_error.clone_from(err);
        }
        if let Some(handle) = update.current_handle {
            self.current_handle = handle;
        }

        *self != before
    }
}

/// Partial state update.
///
/// `None` leaves a field unchanged. The optional fields are
/// `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = clear it
/// - `Some(Some(value))` = set it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechStateUpdate {
    pub is_speaking: Option<bool>,
    pub is_enabled: Option<bool>,
    pub has_user_interacted: Option<bool>,
    pub is_ready: Option<bool>,
    pub is_loading: Option<bool>,
    pub is_checking_remote: Option<bool>,
    pub voices_loaded: Option<bool>,
    pub using_remote_engine: Option<bool>,
    pub last_error: Option<Option<String>>,
    pub current_handle: Option<Option<UtteranceHandle>>,
}

impl SpeechStateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_speaking(mut self, v: bool) -> Self {
        self.is_speaking = Some(v);
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, v: bool) -> Self {
        self.is_enabled = Some(v);
        self
    }

    #[must_use]
    pub const fn with_user_interacted(mut self, v: bool) -> Self {
        self.has_user_interacted = Some(v);
        self
    }

    #[must_use]
    pub const fn with_ready(mut self, v: bool) -> Self {
        self.is_ready = Some(v);
        self
    }

    #[must_use]
    pub const fn with_loading(mut self, v: bool) -> Self {
        self.is_loading = Some(v);
        self
    }

    #[must_use]
    pub const fn with_checking_remote(mut self, v: bool) -> Self {
        self.is_checking_remote = Some(v);
        self
    }

    #[must_use]
    pub const fn with_voices_loaded(mut self, v: bool) -> Self {
        self.voices_loaded = Some(v);
        self
    }

    #[must_use]
    pub const fn with_using_remote(mut self, v: bool) -> Self {
        self.using_remote_engine = Some(v);
        self
    }

    /// Set (`Some`) or clear (`None`) the last error.
    #[must_use]
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.last_error = Some(error);
        self
    }

    /// Set (`Some`) or clear (`None`) the active utterance handle.
    #[must_use]
    pub const fn with_handle(mut self, handle: Option<UtteranceHandle>) -> Self {
        self.current_handle = Some(handle);
        self
    }
}

type Callback = Arc<dyn Fn(&SpeechState) + Send + Sync>;

/// Callback delivery bookkeeping.
#[derive(Default)]
struct Delivery {
    /// Newest snapshot not yet handed to callbacks, with its version.
    pending: Option<(u64, SpeechState)>,
    /// Version of the last snapshot handed to callbacks.
    delivered: u64,
    /// Some thread is currently running callbacks.
    running: bool,
}

struct Inner {
    state: watch::Sender<SpeechState>,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    next_id: AtomicU64,
    version: AtomicU64,
    delivery: Mutex<Delivery>,
}

impl Inner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<(u64, Callback)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn delivery(&self) -> MutexGuard<'_, Delivery> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Version for a state change; must be taken while the watch value is
    /// locked so versions follow the order of changes.
    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Hand `snapshot` to callbacks unless something newer already went out.
    ///
    /// Only one thread delivers at a time. A publish that arrives meanwhile,
    /// including a re-entrant one from inside a callback, parks its snapshot
    /// for the delivering thread to pick up.
    fn publish(&self, version: u64, snapshot: SpeechState) {
        let mut delivery = self.delivery();
        if delivery.pending.as_ref().is_none_or(|(v, _)| *v < version) {
            delivery.pending = Some((version, snapshot));
        }
        if delivery.running {
            return;
        }
        delivery.running = true;

        loop {
            let delivered = delivery.delivered;
            let Some((version, snapshot)) = delivery.pending.take().filter(|(v, _)| *v > delivered)
            else {
                delivery.running = false;
                return;
            };
            delivery.delivered = version;
            drop(delivery);

            self.notify(&snapshot);
            delivery = self.delivery();
        }
    }

    fn notify(&self, snapshot: &SpeechState) {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Callback> = self
            .subscribers()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }
}

/// Holder and publisher of the speech state.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &*self.inner.state.borrow())
            .field("subscribers", &self.inner.subscribers().len())
            .finish()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::with_state(SpeechState::default())
    }

    pub fn with_state(initial: SpeechState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: watch::Sender::new(initial),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                version: AtomicU64::new(0),
                delivery: Mutex::new(Delivery::default()),
            }),
        }
    }

    /// Current state.
    pub fn get_state(&self) -> SpeechState {
        self.inner.state.borrow().clone()
    }

    /// Apply a partial update and return the resulting state.
    ///
    /// Subscribers are notified only when something actually changed.
    pub fn update(&self, update: SpeechStateUpdate) -> SpeechState {
        let mut changed = None;
        self.inner.state.send_if_modified(|state| {
            if state.apply(&update) {
                changed = Some((self.inner.next_version(), state.clone()));
                true
            } else {
                false
            }
        });

        match changed {
            Some((version, snapshot)) => {
                tracing::trace!(?update, version, "Speech state changed");
                self.inner.publish(version, snapshot.clone());
                snapshot
            }
            None => self.get_state(),
        }
    }

    /// Register a callback.
    ///
    /// The callback receives the current state before this returns, then
    /// every subsequent change until the [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SpeechState) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback = Arc::new(callback);

        let snapshot = {
            let mut subscribers = self.inner.subscribers();
            subscribers.push((id, Arc::clone(&callback)));
            self.get_state()
        };
        callback(&snapshot);

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Async receiver of state changes.
    pub fn watch(&self) -> watch::Receiver<SpeechState> {
        self.inner.state.subscribe()
    }

    /// Number of live callback subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }

    /// Restore the default state and notify subscribers.
    pub fn reset(&self) {
        let mut version = 0;
        self.inner.state.send_modify(|state| {
            *state = SpeechState::default();
            version = self.inner.next_version();
        });
        self.inner.publish(version, SpeechState::default());
    }
}

/// Keeps a [`StateStore::subscribe`] callback registered.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) removes the
/// callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.subscribers().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<SpeechState>>>, impl Fn(&SpeechState) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |s: &SpeechState| sink.lock().unwrap().push(s.clone()))
    }

    #[test]
    fn default_state_is_enabled_and_idle() {
        let state = SpeechState::default();
        assert!(state.is_enabled);
        assert!(!state.is_speaking);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn apply_reports_changes_only() {
        let mut state = SpeechState::default();
        assert!(state.apply(&SpeechStateUpdate::new().with_speaking(true)));
        assert!(!state.apply(&SpeechStateUpdate::new().with_speaking(true)));
        assert!(!state.apply(&SpeechStateUpdate::new()));
    }

    #[test]
    fn nested_option_distinguishes_clear_from_untouched() {
        let mut state = SpeechState::default();
        state.apply(&SpeechStateUpdate::new().with_error(Some("boom".into())));
        assert_eq!(state.last_error.as_deref(), Some("boom"));

        state.apply(&SpeechStateUpdate::new().with_speaking(true));
        assert_eq!(state.last_error.as_deref(), Some("boom"));

        state.apply(&SpeechStateUpdate::new().with_error(None));
        assert!(state.last_error.is_none());
    }

    #[test]
    fn late_subscriber_gets_current_state_synchronously() {
        let store = StateStore::new();
        store.update(SpeechStateUpdate::new().with_speaking(true));
        store.update(SpeechStateUpdate::new().with_using_remote(true));
        store.update(SpeechStateUpdate::new().with_error(Some("x".into())));

        let (seen, callback) = recorder();
        let _sub = store.subscribe(callback);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_speaking);
        assert!(seen[0].using_remote_engine);
        assert_eq!(seen[0].last_error.as_deref(), Some("x"));
    }

    #[test]
    fn subscribers_see_changes_but_not_no_ops() {
        let store = StateStore::new();
        let (seen, callback) = recorder();
        let _sub = store.subscribe(callback);

        store.update(SpeechStateUpdate::new().with_speaking(true));
        store.update(SpeechStateUpdate::new().with_speaking(true));
        store.update(SpeechStateUpdate::new().with_speaking(false));

        let flags: Vec<bool> = seen.lock().unwrap().iter().map(|s| s.is_speaking).collect();
        assert_eq!(flags, [false, true, false]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = StateStore::new();
        let (seen, callback) = recorder();
        let sub = store.subscribe(callback);
        assert_eq!(store.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);

        store.update(SpeechStateUpdate::new().with_loading(true));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn reset_restores_defaults_and_notifies() {
        let store = StateStore::new();
        store.update(
            SpeechStateUpdate::new()
                .with_enabled(false)
                .with_handle(Some(UtteranceHandle(3))),
        );
        let (seen, callback) = recorder();
        let _sub = store.subscribe(callback);

        store.reset();
        assert_eq!(store.get_state(), SpeechState::default());
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn update_from_inside_a_callback_is_delivered_after_it() {
        let store = StateStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let inner_store = store.clone();
        let _sub = store.subscribe(move |s: &SpeechState| {
            sink.lock().unwrap().push(s.clone());
            if s.is_speaking && !s.is_loading {
                inner_store.update(SpeechStateUpdate::new().with_loading(true));
            }
        });

        store.update(SpeechStateUpdate::new().with_speaking(true));

        let flags: Vec<(bool, bool)> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|s| (s.is_speaking, s.is_loading))
            .collect();
        assert_eq!(flags, [(false, false), (true, false), (true, true)]);
    }

    #[test]
    fn concurrent_updates_end_on_the_final_state() {
        for _ in 0..50 {
            let store = StateStore::new();
            let (seen, callback) = recorder();
            let _sub = store.subscribe(callback);

            std::thread::scope(|scope| {
                for t in 0..4_u64 {
                    let store = store.clone();
                    scope.spawn(move || {
                        for i in 0..100_u64 {
                            store.update(
                                SpeechStateUpdate::new()
                                    .with_speaking((i + t) % 2 == 0)
                                    .with_handle(Some(UtteranceHandle(t * 1_000 + i))),
                            );
                        }
                    });
                }
            });

            assert_eq!(seen.lock().unwrap().last(), Some(&store.get_state()));
        }
    }

    #[tokio::test]
    async fn watch_receiver_observes_updates() {
        let store = StateStore::new();
        let mut rx = store.watch();

        store.update(SpeechStateUpdate::new().with_checking_remote(true));
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_checking_remote);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let mut state = SpeechState::default();
        state.current_handle = Some(UtteranceHandle(7));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isEnabled"], true);
        assert_eq!(json["usingRemoteEngine"], false);
        assert_eq!(json["currentHandle"], 7);

        let back: SpeechState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
