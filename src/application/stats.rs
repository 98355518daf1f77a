//! Process-wide observability counters.
//!
//! Best-effort: updated atomically after each successfully served (non-304)
//! request, never persisted, reset only on process restart. Values may be
//! approximate under concurrent increments; they are not used for
//! correctness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Running counters for served requests.
#[derive(Debug, Default)]
pub struct ServiceStats {
    images_processed: AtomicU64,
    bytes_served: AtomicU64,
    total_response_millis: AtomicU64,
}

impl ServiceStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one served image of `output_bytes` length that took
    /// `elapsed` to produce.
    pub fn record(&self, output_bytes: u64, elapsed: Duration) {
        self.images_processed.fetch_add(1, Ordering::Relaxed);
        self.bytes_served.fetch_add(output_bytes, Ordering::Relaxed);
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.total_response_millis.fetch_add(millis, Ordering::Relaxed);
    }

    /// Snapshot of the current counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let images_processed = self.images_processed.load(Ordering::Relaxed);
        let bytes_served = self.bytes_served.load(Ordering::Relaxed);
        let total_millis = self.total_response_millis.load(Ordering::Relaxed);

        let average_response_millis = if images_processed > 0 {
            total_millis / images_processed
        } else {
            0
        };

        StatsSnapshot {
            images_processed,
            bytes_served,
            average_response_millis,
        }
    }
}

/// Point-in-time view of the service counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Number of images successfully served.
    pub images_processed: u64,
    /// Cumulative size of served output bytes.
    pub bytes_served: u64,
    /// Running average response time in milliseconds.
    pub average_response_millis: u64,
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} images served, {} bytes, {} ms average",
            self.images_processed, self.bytes_served, self.average_response_millis
        )
    }
}
