//! Request metrics for the Steward daemon.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Atomic metrics for daemon performance tracking.
pub struct Metrics {
    /// Total number of requests processed
    pub requests_total: AtomicU64,
    /// Requests answered with an error response
    pub errors_total: AtomicU64,
    /// Sum of all request latencies in microseconds
    pub requests_latency_us: AtomicU64,
    /// Project resolutions served from cache
    pub cache_hits: AtomicU64,
    /// Project resolutions that hit the filesystem
    pub cache_misses: AtomicU64,
    start_time: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            requests_latency_us: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed request.
    pub fn record_request(&self, latency: Duration, failed: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.errors_total.fetch_add(1, Ordering::Relaxed);
        }
        self.requests_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Record a project resolution.
    pub fn record_resolution(&self, cached: bool) {
        if cached {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get cache hit rate (0.0 - 1.0).
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Get average request latency.
    pub fn avg_latency(&self) -> Duration {
        let total = self.requests_total.load(Ordering::Relaxed);
        let latency_us = self.requests_latency_us.load(Ordering::Relaxed);
        if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(latency_us / total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_request_recording() {
        let metrics = Metrics::new();
        metrics.record_request(Duration::from_millis(10), false);
        metrics.record_request(Duration::from_millis(20), true);

        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.errors_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.avg_latency(), Duration::from_millis(15));
    }

    #[test]
    fn test_metrics_cache_hit_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.cache_hit_rate(), 0.0);

        metrics.record_resolution(true);
        metrics.record_resolution(true);
        metrics.record_resolution(true);
        metrics.record_resolution(false);

        assert!((metrics.cache_hit_rate() - 0.75).abs() < 0.01);
    }
}
