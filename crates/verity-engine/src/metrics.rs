//! Metrics for verification activity
//!
//! Lock-free counters updated on the verify path and read as snapshots by
//! status queries and exporters.
//!
//! ## Usage
//!
//! ```ignore
//! use verity_engine::metrics::VerityMetrics;
//!
//! let metrics = VerityMetrics::new();
//! metrics.record_data_verified();
//! let snapshot = metrics.snapshot();
//! ```

use crate::domain::cache::CacheStats;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Verification counters
#[derive(Default)]
pub struct VerityMetrics {
    /// Data blocks whose content matched the tree
    pub data_blocks_verified: AtomicU64,
    /// Blocks answered with synthesized zeros
    pub zero_blocks: AtomicU64,
    /// Hash blocks that matched their parent digest
    pub hash_blocks_verified: AtomicU64,
    /// Primary-digest mismatches resolved by the fallback
    pub soft_mismatches: AtomicU64,
    /// Blocks repaired by FEC
    pub fec_corrections: AtomicU64,
    /// Unresolved corruptions handed to the policy
    pub corruption_events: AtomicU64,
    /// Prefetch tasks issued
    pub prefetches_issued: AtomicU64,
    /// Requests completed successfully
    pub requests_completed: AtomicU64,
    /// Requests that returned an error
    pub requests_failed: AtomicU64,
    /// Cumulative request time in nanoseconds
    pub request_time_ns: AtomicU64,
}

impl VerityMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verified data block
    pub fn record_data_verified(&self) {
        self.data_blocks_verified.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a zero-synthesized block
    pub fn record_zero_block(&self) {
        self.zero_blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a verified hash block
    pub fn record_hash_verified(&self) {
        self.hash_blocks_verified.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a soft mismatch
    pub fn record_soft_mismatch(&self) {
        self.soft_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an FEC repair
    pub fn record_fec_correction(&self) {
        self.fec_corrections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unresolved corruption
    pub fn record_corruption(&self) {
        self.corruption_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a prefetch task
    pub fn record_prefetch(&self) {
        self.prefetches_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished request
    ///
    /// # Arguments
    /// * `duration` - Time from submission to completion
    /// * `ok` - Whether the request succeeded
    pub fn record_request(&self, duration: Duration, ok: bool) {
        if ok {
            self.requests_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.request_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Average request time in nanoseconds
    pub fn avg_request_time_ns(&self) -> u64 {
        let total = self.request_time_ns.load(Ordering::Relaxed);
        let count = self.requests_completed.load(Ordering::Relaxed)
            + self.requests_failed.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }

    /// Get current metrics snapshot, including cache counters
    pub fn snapshot(&self, cache: CacheStats) -> MetricsSnapshot {
        MetricsSnapshot {
            data_blocks_verified: self.data_blocks_verified.load(Ordering::Relaxed),
            zero_blocks: self.zero_blocks.load(Ordering::Relaxed),
            hash_blocks_verified: self.hash_blocks_verified.load(Ordering::Relaxed),
            soft_mismatches: self.soft_mismatches.load(Ordering::Relaxed),
            fec_corrections: self.fec_corrections.load(Ordering::Relaxed),
            corruption_events: self.corruption_events.load(Ordering::Relaxed),
            prefetches_issued: self.prefetches_issued.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            avg_request_ns: self.avg_request_time_ns(),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_resident: cache.resident as u64,
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub data_blocks_verified: u64,
    pub zero_blocks: u64,
    pub hash_blocks_verified: u64,
    pub soft_mismatches: u64,
    pub fec_corrections: u64,
    pub corruption_events: u64,
    pub prefetches_issued: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub avg_request_ns: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_resident: u64,
}
