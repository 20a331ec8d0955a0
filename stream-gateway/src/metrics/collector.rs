//! Metrics collector implementation.
//!
//! Process-wide counters for the aggregation path. Every counter is an
//! atomic (or a DashMap of atomics) so concurrent requests never lose an
//! increment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Last engine-level failure, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastError {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Metrics collector for the gateway.
#[derive(Debug)]
pub struct MetricsCollector {
    // Request metrics
    requests_total: AtomicU64,
    requests_failed: AtomicU64,
    streams_returned_total: AtomicU64,

    // Provider metrics
    provider_calls_total: AtomicU64,
    provider_calls: DashMap<String, AtomicU64>,
    provider_failures: DashMap<String, AtomicU64>,
    provider_duration_total_ms: DashMap<String, AtomicU64>,

    last_error: RwLock<Option<LastError>>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            streams_returned_total: AtomicU64::new(0),
            provider_calls_total: AtomicU64::new(0),
            provider_calls: DashMap::new(),
            provider_failures: DashMap::new(),
            provider_duration_total_ms: DashMap::new(),
            last_error: RwLock::new(None),
        }
    }

    // ========== Request Metrics ==========

    /// Record an aggregation request.
    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the number of streams handed back to a client.
    pub fn record_streams_returned(&self, count: u64) {
        self.streams_returned_total
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Record an engine-level failure and keep its message.
    pub fn record_error(&self, message: impl Into<String>) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
        *self.last_error.write() = Some(LastError {
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.last_error.read().clone()
    }

    // ========== Provider Metrics ==========

    /// Record a provider invocation.
    pub fn record_provider_call(&self, provider: impl Into<String>) {
        self.provider_calls_total.fetch_add(1, Ordering::Relaxed);
        self.provider_calls
            .entry(provider.into())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful provider call duration.
    pub fn record_provider_duration(&self, provider: impl Into<String>, duration_ms: u64) {
        self.provider_duration_total_ms
            .entry(provider.into())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(duration_ms, Ordering::Relaxed);
    }

    /// Record a failed provider call.
    pub fn record_provider_failure(&self, provider: impl Into<String>) {
        self.provider_failures
            .entry(provider.into())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn provider_calls(&self, provider: &str) -> u64 {
        self.provider_calls
            .get(provider)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn provider_failures(&self, provider: &str) -> u64 {
        self.provider_failures
            .get(provider)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // ========== Snapshot ==========

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            streams_returned_total: self.streams_returned_total.load(Ordering::Relaxed),
            provider_calls_total: self.provider_calls_total.load(Ordering::Relaxed),
            provider_calls: collect_counters(&self.provider_calls),
            provider_failures: collect_counters(&self.provider_failures),
            provider_duration_avg_ms: self.avg_provider_duration_ms(),
            last_error: self.last_error(),
        }
    }

    fn avg_provider_duration_ms(&self) -> HashMap<String, f64> {
        self.provider_duration_total_ms
            .iter()
            .map(|e| {
                let provider = e.key().clone();
                let total = e.value().load(Ordering::Relaxed);
                // Only successful calls are timed.
                let calls = self.provider_calls(&provider);
                let succeeded = calls.saturating_sub(self.provider_failures(&provider));
                let avg = if succeeded > 0 {
                    total as f64 / succeeded as f64
                } else {
                    0.0
                };
                (provider, avg)
            })
            .collect()
    }
}

fn collect_counters(map: &DashMap<String, AtomicU64>) -> HashMap<String, u64> {
    map.iter()
        .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
        .collect()
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub requests_failed: u64,
    pub streams_returned_total: u64,
    pub provider_calls_total: u64,
    pub provider_calls: HashMap<String, u64>,
    pub provider_failures: HashMap<String, u64>,
    pub provider_duration_avg_ms: HashMap<String, f64>,
    pub last_error: Option<LastError>,
}
