use std::time::Duration;

use tokio::time::Instant;

/// Default time a completed availability probe stays authoritative.
pub const DEFAULT_AVAILABILITY_TTL: Duration = Duration::from_millis(5_000);

/// Result of the most recent completed availability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRecord {
    /// Whether the remote service reported at least one usable voice.
    pub is_available: bool,

    /// When the probe completed.
    pub checked_at: Instant,

    /// How long this record may be reused instead of probing again.
    pub ttl: Duration,

    /// Diagnostic text from a failed probe.
    pub last_error: Option<String>,
}

impl AvailabilityRecord {
    pub fn available(ttl: Duration) -> Self {
        Self {
            is_available: true,
            checked_at: Instant::now(),
            ttl,
            last_error: None,
        }
    }

    pub fn unavailable(ttl: Duration, error: impl Into<String>) -> Self {
        Self {
            is_available: false,
            checked_at: Instant::now(),
            ttl,
            last_error: Some(error.into()),
        }
    }

    /// Whether the record is still within its TTL.
    pub fn is_fresh(&self) -> bool {
        self.checked_at.elapsed() < self.ttl
    }
}

/// Coarse engine availability as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// No fresh probe result; the next request will probe.
    Unknown,
    /// A probe is in flight.
    Checking,
    /// A fresh probe found usable voices.
    Available,
    /// A fresh probe failed or found no voices.
    Unavailable,
}

impl Availability {
    /// Derive availability from the in-flight probe count and the last record.
    pub fn from_record(in_flight: usize, record: Option<&AvailabilityRecord>) -> Self {
        if in_flight > 0 {
            return Self::Checking;
        }
        match record {
            Some(r) if r.is_fresh() && r.is_available => Self::Available,
            Some(r) if r.is_fresh() => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    /// Whether the remote path is still worth attempting.
    pub const fn worth_trying(self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn record_expires_after_ttl() {
        let record = AvailabilityRecord::available(Duration::from_millis(100));
        assert!(record.is_fresh());

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(!record.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn availability_prefers_in_flight_probe() {
        let record = AvailabilityRecord::unavailable(DEFAULT_AVAILABILITY_TTL, "boom");
        assert_eq!(Availability::from_record(1, Some(&record)), Availability::Checking);
        assert_eq!(Availability::from_record(0, Some(&record)), Availability::Unavailable);
        assert_eq!(Availability::from_record(0, None), Availability::Unknown);

        tokio::time::advance(DEFAULT_AVAILABILITY_TTL).await;
        assert_eq!(Availability::from_record(0, Some(&record)), Availability::Unknown);
    }

    #[test]
    fn only_known_unavailable_skips_remote() {
        assert!(Availability::Unknown.worth_trying());
        assert!(Availability::Checking.worth_trying());
        assert!(Availability::Available.worth_trying());
        assert!(!Availability::Unavailable.worth_trying());
    }
}
