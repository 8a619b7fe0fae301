//! Per-adapter attempt counters.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Default)]
struct StatsInner {
    total_sent: u64,
    total_delivered: u64,
    total_failed: u64,
    avg_latency_ms: f64,
    latency_recorded: bool,
    last_used: Option<OffsetDateTime>,
}

/// Mutable statistics owned by one adapter for the life of the process.
///
/// Updates are serialized through a mutex so concurrent sends through the
/// same adapter never lose an increment.
#[derive(Debug, Default)]
pub struct ProviderStats {
    inner: Mutex<StatsInner>,
}

impl ProviderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt. `latency_ms` is folded into the running average
    /// weighted by the post-increment attempt count.
    pub fn record_attempt(&self, success: bool, latency_ms: Option<u64>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.total_sent = inner.total_sent.saturating_add(1);
        if success {
            inner.total_delivered = inner.total_delivered.saturating_add(1);
        } else {
            inner.total_failed = inner.total_failed.saturating_add(1);
        }

        if let Some(latency) = latency_ms {
            let n = inner.total_sent as f64;
            inner.avg_latency_ms = (inner.avg_latency_ms * (n - 1.0) + latency as f64) / n;
            inner.latency_recorded = true;
        }

        inner.last_used = Some(OffsetDateTime::now_utc());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        StatsSnapshot {
            total_sent: inner.total_sent,
            total_delivered: inner.total_delivered,
            total_failed: inner.total_failed,
            success_rate: success_rate(inner.total_delivered, inner.total_sent),
            avg_latency_ms: inner.latency_recorded.then_some(inner.avg_latency_ms),
            last_used: inner.last_used,
        }
    }
}

/// Point-in-time copy of [`ProviderStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    /// Percentage in `0.0..=100.0`, derived from the counters on every read.
    pub success_rate: f64,
    /// `None` until an attempt with a measured latency is recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_latency_ms: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_used: Option<OffsetDateTime>,
}

fn success_rate(delivered: u64, attempts: u64) -> f64 {
    if attempts == 0 {
        0.0
    } else {
        delivered as f64 / attempts as f64 * 100.0
    }
}
