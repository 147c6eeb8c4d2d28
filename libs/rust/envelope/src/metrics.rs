//! Prometheus metrics for envelope operations and key lifecycle.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, HistogramVec, register_counter_vec, register_histogram_vec};
use std::time::Duration;

static ENVELOPE_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "envelope_crypto_operations_total",
        "Total envelope crypto operations",
        &["operation", "status"]
    )
    .expect("Failed to register envelope_crypto_operations metric")
});

static ENVELOPE_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "envelope_crypto_latency_seconds",
        "Envelope crypto operation latency",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register envelope_crypto_latency metric")
});

static DEK_CACHE: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "envelope_dek_cache_total",
        "DEK cache events",
        &["result"]
    )
    .expect("Failed to register envelope_dek_cache metric")
});

static KEY_LIFECYCLE: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "envelope_key_lifecycle_total",
        "DEK and KEK lifecycle events",
        &["event"]
    )
    .expect("Failed to register envelope_key_lifecycle metric")
});

/// Key lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A tenant's first DEK was stored
    DekCreated,
    /// A DEK was replaced
    DekRotated,
    /// A tenant's first KEK was provisioned
    KekCreated,
    /// A KEK was replaced and its DEK re-wrapped
    KekRotated,
    /// A concurrent creator stored its key first
    CreationRaceLost,
}

impl LifecycleEvent {
    const fn as_str(self) -> &'static str {
        match self {
            Self::DekCreated => "dek_created",
            Self::DekRotated => "dek_rotated",
            Self::KekCreated => "kek_created",
            Self::KekRotated => "kek_rotated",
            Self::CreationRaceLost => "creation_race_lost",
        }
    }
}

/// Metrics collector for the envelope service and DEK cache.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeMetrics;

impl Default for EnvelopeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeMetrics {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Lazy::force(&ENVELOPE_OPERATIONS);
        Lazy::force(&ENVELOPE_LATENCY);
        Lazy::force(&DEK_CACHE);
        Lazy::force(&KEY_LIFECYCLE);
        Self
    }

    /// Record an operation.
    pub fn record_operation(&self, operation: &str, success: bool, latency: Duration) {
        let status = if success { "success" } else { "failure" };
        ENVELOPE_OPERATIONS
            .with_label_values(&[operation, status])
            .inc();
        ENVELOPE_LATENCY
            .with_label_values(&[operation])
            .observe(latency.as_secs_f64());
    }

    /// Record cache hit.
    pub fn record_cache_hit(&self) {
        DEK_CACHE.with_label_values(&["hit"]).inc();
    }

    /// Record cache miss.
    pub fn record_cache_miss(&self) {
        DEK_CACHE.with_label_values(&["miss"]).inc();
    }

    /// Record cache eviction.
    pub fn record_cache_eviction(&self) {
        DEK_CACHE.with_label_values(&["evict"]).inc();
    }

    /// Record a key lifecycle event.
    pub fn record_lifecycle(&self, event: LifecycleEvent) {
        KEY_LIFECYCLE.with_label_values(&[event.as_str()]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_counter_increments() {
        let metrics = EnvelopeMetrics::new();
        let before = KEY_LIFECYCLE
            .with_label_values(&["creation_race_lost"])
            .get();
        metrics.record_lifecycle(LifecycleEvent::CreationRaceLost);
        let after = KEY_LIFECYCLE
            .with_label_values(&["creation_race_lost"])
            .get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_record_operation() {
        let metrics = EnvelopeMetrics::new();
        metrics.record_operation("encrypt", true, Duration::from_micros(150));
        assert!(
            ENVELOPE_OPERATIONS
                .with_label_values(&["encrypt", "success"])
                .get()
                >= 1.0
        );
    }
}
