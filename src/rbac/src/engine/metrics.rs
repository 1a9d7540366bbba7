//! Decision metrics for engine observability

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Engine decision metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineMetrics {
    /// Total number of access checks
    pub total_checks: u64,

    /// Number of allowed decisions
    pub allowed_decisions: u64,

    /// Number of denied decisions
    pub denied_decisions: u64,

    /// Decisions taken by a matching policy
    pub policy_decisions: u64,

    /// Decisions taken from role permissions alone
    pub permission_fallbacks: u64,

    /// Audit sink failures swallowed by the engine
    pub audit_failures: u64,

    /// Checks that failed with a storage error
    pub error_count: u64,

    /// Average decision latency
    pub avg_latency_ms: f64,

    /// 99th percentile decision latency
    pub latency_p99_ms: f64,
}

impl EngineMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Metrics collector
///
/// Counters are lock-free. Latency samples sit in a bounded ring behind a
/// short-held mutex; aggregates are computed on `snapshot`.
pub struct MetricsCollector {
    total_checks: AtomicU64,
    allowed_decisions: AtomicU64,
    denied_decisions: AtomicU64,
    policy_decisions: AtomicU64,
    permission_fallbacks: AtomicU64,
    audit_failures: AtomicU64,
    error_count: AtomicU64,

    /// Recent latency samples for percentile calculation
    latency_samples: Mutex<VecDeque<f64>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Collector keeping at most `max_samples` latency samples
    pub fn with_capacity(max_samples: usize) -> Self {
        Self {
            total_checks: AtomicU64::new(0),
            allowed_decisions: AtomicU64::new(0),
            denied_decisions: AtomicU64::new(0),
            policy_decisions: AtomicU64::new(0),
            permission_fallbacks: AtomicU64::new(0),
            audit_failures: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            latency_samples: Mutex::new(VecDeque::with_capacity(max_samples.min(1_024))),
            max_samples: max_samples.max(1),
        }
    }

    /// Record one decision and how it was reached
    pub fn record_decision(&self, allowed: bool, by_policy: bool) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        if allowed {
            self.allowed_decisions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.denied_decisions.fetch_add(1, Ordering::Relaxed);
        }

        if by_policy {
            self.policy_decisions.fetch_add(1, Ordering::Relaxed);
        } else {
            self.permission_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_audit_failure(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record decision latency
    pub fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let mut samples = self.latency_samples.lock();
        if samples.len() == self.max_samples {
            samples.pop_front();
        }
        samples.push_back(latency_ms);
    }

    /// Number of latency samples currently retained
    pub fn sample_count(&self) -> usize {
        self.latency_samples.lock().len()
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> EngineMetrics {
        // Copy out so sorting happens without the lock
        let mut sorted: Vec<f64> = self.latency_samples.lock().iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        let avg_latency_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };

        EngineMetrics {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            allowed_decisions: self.allowed_decisions.load(Ordering::Relaxed),
            denied_decisions: self.denied_decisions.load(Ordering::Relaxed),
            policy_decisions: self.policy_decisions.load(Ordering::Relaxed),
            permission_fallbacks: self.permission_fallbacks.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms,
            latency_p99_ms: Self::percentile(&sorted, 0.99),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_checks,
            &self.allowed_decisions,
            &self.denied_decisions,
            &self.policy_decisions,
            &self.permission_fallbacks,
            &self.audit_failures,
            &self.error_count,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.latency_samples.lock().clear();
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let index = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_decisions() {
        let collector = MetricsCollector::new();
        collector.record_decision(true, true);
        collector.record_decision(false, false);
        collector.record_decision(true, false);

        let metrics = collector.snapshot();
        assert_eq!(metrics.total_checks, 3);
        assert_eq!(metrics.allowed_decisions, 2);
        assert_eq!(metrics.denied_decisions, 1);
        assert_eq!(metrics.policy_decisions, 1);
        assert_eq!(metrics.permission_fallbacks, 2);
        assert!((metrics.allow_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_latency_percentiles() {
        let collector = MetricsCollector::new();
        for ms in 1..=100 {
            collector.record_latency(Duration::from_millis(ms));
        }

        let metrics = collector.snapshot();
        assert!((metrics.avg_latency_ms - 50.5).abs() < 0.01);
        assert!((metrics.latency_p99_ms - 99.0).abs() < 1.01);
    }

    #[test]
    fn test_latency_samples_are_bounded() {
        let collector = MetricsCollector::with_capacity(100);
        for ms in 1..=1_000 {
            collector.record_latency(Duration::from_millis(ms));
        }

        assert_eq!(collector.sample_count(), 100);

        // Only the most recent 901..=1000 ms samples remain
        let metrics = collector.snapshot();
        assert!((metrics.avg_latency_ms - 950.5).abs() < 0.01);
        assert!(metrics.latency_p99_ms >= 990.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let metrics = MetricsCollector::new().snapshot();
        assert_eq!(metrics, EngineMetrics::default());
    }

    #[tokio::test]
    async fn test_concurrent_recording() {
        let collector = Arc::new(MetricsCollector::with_capacity(64));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let collector = collector.clone();
                tokio::spawn(async move {
                    for _ in 0..250 {
                        collector.record_decision(i % 2 == 0, false);
                        collector.record_latency(Duration::from_micros(50));
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let metrics = collector.snapshot();
        assert_eq!(metrics.total_checks, 2_000);
        assert_eq!(metrics.allowed_decisions, 1_000);
        assert_eq!(collector.sample_count(), 64);
    }

    #[test]
    fn test_reset() {
        let collector = MetricsCollector::new();
        collector.record_error();
        collector.record_audit_failure();
        collector.record_latency(Duration::from_millis(3));
        collector.reset();
        assert_eq!(collector.snapshot(), EngineMetrics::default());
        assert_eq!(collector.sample_count(), 0);
    }
}
