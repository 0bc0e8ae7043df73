//! Metrics registry
//!
//! - Counters are monotonic
//! - Gauges go up and down; decrement saturates at zero so a doubled cleanup
//!   path cannot wrap around
//! - Thread-safe but lock-free

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Operational counters and gauges of one database instance
///
/// All values use Relaxed ordering; readers only need eventual consistency.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Upserted documents observed
    doc_count: AtomicU64,
    /// Queries executed
    query_count: AtomicU64,
    /// Queries that returned an error
    query_failed: AtomicU64,
    /// Queries classified as slow
    query_slow: AtomicU64,
    cold_cache_hits: AtomicU64,
    cold_cache_misses: AtomicU64,

    /// Queries in flight
    query_active: AtomicU64,
    /// Wait-for races in flight
    wait_for_active: AtomicU64,
    /// Open subscriptions
    subscription_active: AtomicU64,

    query_time_ms_total: AtomicU64,
    query_time_samples: AtomicU64,
}

fn saturating_decrement(gauge: &AtomicU64) {
    let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
        Some(v.saturating_sub(1))
    });
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Counters

    pub fn add_docs(&self, count: u64) {
        self.doc_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_queries(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed_queries(&self) {
        self.query_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_slow_queries(&self) {
        self.query_slow.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cold_cache_hits(&self) {
        self.cold_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cold_cache_misses(&self) {
        self.cold_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one query duration.
    pub fn record_query_time(&self, millis: u64) {
        self.query_time_ms_total.fetch_add(millis, Ordering::Relaxed);
        self.query_time_samples.fetch_add(1, Ordering::Relaxed);
    }

    // Gauges

    pub fn increment_gauge(&self, gauge: Gauge) {
        self.gauge(gauge).fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_gauge(&self, gauge: Gauge) {
        saturating_decrement(self.gauge(gauge));
    }

    /// Increments `gauge` until the returned guard is dropped.
    pub fn track(self: &Arc<Self>, gauge: Gauge) -> GaugeGuard {
        self.increment_gauge(gauge);
        GaugeGuard {
            metrics: Arc::clone(self),
            gauge,
        }
    }

    fn gauge(&self, gauge: Gauge) -> &AtomicU64 {
        match gauge {
            Gauge::QueryActive => &self.query_active,
            Gauge::WaitForActive => &self.wait_for_active,
            Gauge::SubscriptionActive => &self.subscription_active,
        }
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            doc_count: self.doc_count.load(Ordering::Relaxed),
            query_count: self.query_count.load(Ordering::Relaxed),
            query_failed: self.query_failed.load(Ordering::Relaxed),
            query_slow: self.query_slow.load(Ordering::Relaxed),
            cold_cache_hits: self.cold_cache_hits.load(Ordering::Relaxed),
            cold_cache_misses: self.cold_cache_misses.load(Ordering::Relaxed),
            query_active: self.query_active.load(Ordering::Relaxed),
            wait_for_active: self.wait_for_active.load(Ordering::Relaxed),
            subscription_active: self.subscription_active.load(Ordering::Relaxed),
            query_time_ms_total: self.query_time_ms_total.load(Ordering::Relaxed),
            query_time_samples: self.query_time_samples.load(Ordering::Relaxed),
        }
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Gauges of in-flight work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gauge {
    QueryActive,
    WaitForActive,
    SubscriptionActive,
}

/// Decrements its gauge on drop
#[derive(Debug)]
pub struct GaugeGuard {
    metrics: Arc<MetricsRegistry>,
    gauge: Gauge,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.metrics.decrement_gauge(self.gauge);
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub doc_count: u64,
    pub query_count: u64,
    pub query_failed: u64,
    pub query_slow: u64,
    pub cold_cache_hits: u64,
    pub cold_cache_misses: u64,
    pub query_active: u64,
    pub wait_for_active: u64,
    pub subscription_active: u64,
    pub query_time_ms_total: u64,
    pub query_time_samples: u64,
}

impl MetricsSnapshot {
    /// Mean query duration in milliseconds, 0 before the first sample
    pub fn average_query_time_ms(&self) -> u64 {
        if self.query_time_samples == 0 {
            0
        } else {
            self.query_time_ms_total / self.query_time_samples
        }
    }
}
