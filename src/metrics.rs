//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Detector counters
//!
//! Counters are plain atomics read through [`DetectorMetrics::snapshot`]. With
//! the `metrics` feature each record is mirrored to the global `metrics`
//! recorder under the `anr_pulse_` prefix.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Counters for one detector instance
#[derive(Debug)]
pub struct DetectorMetrics {
    /// Poll cycles executed by the timer thread
    pub polls: AtomicU64,
    /// Pings posted to the monitored thread
    pub pings_posted: AtomicU64,
    /// Pings observed as acknowledged
    pub pings_acknowledged: AtomicU64,
    /// Pings that could not be posted
    pub post_failures: AtomicU64,
    /// Threshold breaches dispatched for reporting
    pub blockages_detected: AtomicU64,
    /// Threshold breaches suppressed by the exemption
    pub exempted_breaches: AtomicU64,
    /// Reports abandoned because threads or stacks could not be captured
    pub sample_failures: AtomicU64,
    /// Events handed to the listener without panicking
    pub events_delivered: AtomicU64,
    /// Listener invocations that panicked
    pub listener_failures: AtomicU64,
    /// Queued reports dropped because detection stopped
    pub jobs_cancelled: AtomicU64,

    created_at: Instant,
}

impl DetectorMetrics {
    /// Create zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self {
            polls: AtomicU64::new(0),
            pings_posted: AtomicU64::new(0),
            pings_acknowledged: AtomicU64::new(0),
            post_failures: AtomicU64::new(0),
            blockages_detected: AtomicU64::new(0),
            exempted_breaches: AtomicU64::new(0),
            sample_failures: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
            jobs_cancelled: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    pub(crate) fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_polls_total").increment(1);
    }

    pub(crate) fn record_ping_posted(&self) {
        self.pings_posted.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_pings_posted_total").increment(1);
    }

    pub(crate) fn record_ping_acknowledged(&self) {
        self.pings_acknowledged.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_pings_acknowledged_total").increment(1);
    }

    pub(crate) fn record_post_failure(&self) {
        self.post_failures.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_post_failures_total").increment(1);
    }

    pub(crate) fn record_blockage(&self) {
        self.blockages_detected.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_blockages_detected_total").increment(1);
    }

    pub(crate) fn record_exempted(&self) {
        self.exempted_breaches.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_exempted_breaches_total").increment(1);
    }

    pub(crate) fn record_sample_failure(&self) {
        self.sample_failures.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_sample_failures_total").increment(1);
    }

    pub(crate) fn record_event_delivered(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_events_delivered_total").increment(1);
    }

    pub(crate) fn record_listener_failure(&self) {
        self.listener_failures.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_listener_failures_total").increment(1);
    }

    pub(crate) fn record_job_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        counter!("anr_pulse_jobs_cancelled_total").increment(1);
    }

    /// Seconds since the detector was built
    #[must_use]
    pub fn uptime_seconds(&self) -> f64 {
        self.created_at.elapsed().as_secs_f64()
    }

    /// Point-in-time copy of every counter
    #[must_use]
    pub fn snapshot(&self) -> DetectorMetricsSnapshot {
        DetectorMetricsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            pings_posted: self.pings_posted.load(Ordering::Relaxed),
            pings_acknowledged: self.pings_acknowledged.load(Ordering::Relaxed),
            post_failures: self.post_failures.load(Ordering::Relaxed),
            blockages_detected: self.blockages_detected.load(Ordering::Relaxed),
            exempted_breaches: self.exempted_breaches.load(Ordering::Relaxed),
            sample_failures: self.sample_failures.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            listener_failures: self.listener_failures.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`DetectorMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorMetricsSnapshot {
    /// Poll cycles executed
    pub polls: u64,
    /// Pings posted
    pub pings_posted: u64,
    /// Pings acknowledged
    pub pings_acknowledged: u64,
    /// Failed ping posts
    pub post_failures: u64,
    /// Breaches dispatched for reporting
    pub blockages_detected: u64,
    /// Breaches suppressed by the exemption
    pub exempted_breaches: u64,
    /// Failed thread or stack captures
    pub sample_failures: u64,
    /// Events delivered to the listener
    pub events_delivered: u64,
    /// Listener panics
    pub listener_failures: u64,
    /// Reports cancelled by stop
    pub jobs_cancelled: u64,
    /// Seconds since the detector was built
    pub uptime_seconds: f64,
}
