//! Memoized reachability of the remote service.
//!
//! A completed probe is reused for its TTL. Outside the TTL (or when forced)
//! every caller issues its own probe: concurrent callers are not coalesced
//! into one in-flight request, so two callers racing on a cold cache both hit
//! the network.
//!
//! While any probe is in flight the cache reports
//! [`Availability::Checking`]; [`AvailabilityCache::wait_for_check`] lets the
//! orchestrator park a request until the probe settles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use saywise_core::{Availability, AvailabilityRecord};
use tokio::sync::watch;

use crate::protocol::RemoteRequest;
use crate::transport::SpeechTransport;

/// TTL cache in front of the remote availability probe.
pub struct AvailabilityCache {
    transport: Arc<dyn SpeechTransport>,
    ttl: Duration,
    record: Mutex<Option<AvailabilityRecord>>,
    in_flight: AtomicUsize,
    settled: watch::Sender<u64>,
}

impl std::fmt::Debug for AvailabilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityCache")
            .field("ttl", &self.ttl)
            .field("record", &*self.lock_record())
            .field("in_flight", &self.in_flight.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Marks a probe as in flight for its lifetime.
struct ProbeGuard<'a> {
    cache: &'a AvailabilityCache,
}

impl<'a> ProbeGuard<'a> {
    fn enter(cache: &'a AvailabilityCache) -> Self {
        cache.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { cache }
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.cache.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.cache.settled.send_modify(|generation| *generation += 1);
    }
}

impl AvailabilityCache {
    pub fn new(transport: Arc<dyn SpeechTransport>, ttl: Duration) -> Self {
        Self {
            transport,
            ttl,
            record: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            settled: watch::Sender::new(0),
        }
    }

    fn lock_record(&self) -> MutexGuard<'_, Option<AvailabilityRecord>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the remote service can serve requests.
    ///
    /// Returns the cached answer when the last completed probe is younger
    /// than the TTL and `force_refresh` is false. Otherwise probes the
    /// service: a response listing at least one voice means available;
    /// an empty list, an `error` body, a bad status or a network failure
    /// means unavailable, with the error text recorded.
    pub async fn check_availability(&self, force_refresh: bool) -> bool {
        if !force_refresh {
            if let Some(record) = self.lock_record().as_ref().filter(|r| r.is_fresh()) {
                tracing::trace!(available = record.is_available, "Using cached remote availability");
                return record.is_available;
            }
        }

        let _guard = ProbeGuard::enter(self);
        let record = match self.transport.send(&RemoteRequest::CheckAvailability).await {
            Ok(response) if response.voice_count() > 0 => {
                tracing::debug!(voices = response.voice_count(), "Remote voice service available");
                AvailabilityRecord::available(self.ttl)
            }
            Ok(_) => {
                tracing::warn!("Remote voice service reported no usable voices");
                AvailabilityRecord::unavailable(self.ttl, "no usable voices")
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote availability probe failed");
                AvailabilityRecord::unavailable(self.ttl, e.to_string())
            }
        };

        let available = record.is_available;
        *self.lock_record() = Some(record);
        available
    }

    /// Availability without probing.
    pub fn availability(&self) -> Availability {
        let in_flight = self.in_flight.load(Ordering::SeqCst);
        Availability::from_record(in_flight, self.lock_record().as_ref())
    }

    fn is_checking(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Resolve once no probe is in flight.
    pub async fn wait_for_check(&self) {
        let mut settled = self.settled.subscribe();
        while self.is_checking() {
            if settled.changed().await.is_err() {
                break;
            }
        }
    }

    /// Error text from the last failed probe.
    pub fn last_error(&self) -> Option<String> {
        self.lock_record().as_ref().and_then(|r| r.last_error.clone())
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }
}
