//! Prometheus export of verity metrics.
//!
//! Engine counters are read as snapshots and labelled by device. Cumulative
//! values become counters named `verity_<metric>_total`; point-in-time values
//! (`corrupted`, `cache_resident`, `request_avg_seconds`) stay gauges.

use crate::TelemetryError;
use lazy_static::lazy_static;
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use verity_engine::{MetricsSnapshot, VerityStatus};

/// Prefix of every exported metric name.
pub const METRIC_PREFIX: &str = "verity";

fn int_counter(name: &str, help: &str) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help).namespace(METRIC_PREFIX), &["device"])
        .expect("metric creation failed")
}

fn int_gauge(name: &str, help: &str) -> IntGaugeVec {
    IntGaugeVec::new(Opts::new(name, help).namespace(METRIC_PREFIX), &["device"])
        .expect("metric creation failed")
}

lazy_static! {
    /// Registry holding the verity metrics
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // VERIFICATION
    // =========================================================================

    static ref DATA_BLOCKS_VERIFIED: IntCounterVec =
        int_counter("data_blocks_verified_total", "Data blocks that matched the hash tree");
    static ref ZERO_BLOCKS: IntCounterVec =
        int_counter("zero_blocks_total", "Data blocks answered with synthesized zeros");
    static ref HASH_BLOCKS_VERIFIED: IntCounterVec =
        int_counter("hash_blocks_verified_total", "Hash blocks that matched their parent digest");

    // =========================================================================
    // ANOMALIES
    // =========================================================================

    static ref SOFT_MISMATCHES: IntCounterVec =
        int_counter("soft_mismatches_total", "Primary digest mismatches resolved by the fallback");
    static ref FEC_CORRECTIONS: IntCounterVec =
        int_counter("fec_corrections_total", "Blocks repaired by forward error correction");
    static ref CORRUPTION_EVENTS: IntCounterVec =
        int_counter("corruption_events_total", "Corruptions handed to the corruption policy");
    static ref CORRUPTED: IntGaugeVec =
        int_gauge("corrupted", "1 once any corruption was seen");

    // =========================================================================
    // REQUESTS AND CACHE
    // =========================================================================

    static ref REQUESTS_COMPLETED: IntCounterVec =
        int_counter("requests_completed_total", "Read requests that succeeded");
    static ref REQUESTS_FAILED: IntCounterVec =
        int_counter("requests_failed_total", "Read requests that returned an error");
    static ref REQUEST_AVG_SECONDS: GaugeVec = GaugeVec::new(
        Opts::new("request_avg_seconds", "Mean request latency").namespace(METRIC_PREFIX),
        &["device"]
    ).expect("metric creation failed");
    static ref PREFETCHES_ISSUED: IntCounterVec =
        int_counter("prefetches_issued_total", "Hash prefetch tasks issued");
    static ref CACHE_HITS: IntCounterVec =
        int_counter("cache_hits_total", "Hash cache hits");
    static ref CACHE_MISSES: IntCounterVec =
        int_counter("cache_misses_total", "Hash cache misses");
    static ref CACHE_RESIDENT: IntGaugeVec =
        int_gauge("cache_resident", "Hash blocks resident in the cache");

    static ref REGISTERED: Result<(), String> = register_all();
}

fn register_all() -> Result<(), String> {
    let counters: [&IntCounterVec; 11] = [
        &DATA_BLOCKS_VERIFIED,
        &ZERO_BLOCKS,
        &HASH_BLOCKS_VERIFIED,
        &SOFT_MISMATCHES,
        &FEC_CORRECTIONS,
        &CORRUPTION_EVENTS,
        &REQUESTS_COMPLETED,
        &REQUESTS_FAILED,
        &PREFETCHES_ISSUED,
        &CACHE_HITS,
        &CACHE_MISSES,
    ];
    for counter in counters {
        REGISTRY
            .register(Box::new(counter.clone()))
            .map_err(|e| e.to_string())?;
    }
    for gauge in [&*CORRUPTED, &*CACHE_RESIDENT] {
        REGISTRY
            .register(Box::new(gauge.clone()))
            .map_err(|e| e.to_string())?;
    }
    REGISTRY
        .register(Box::new(REQUEST_AVG_SECONDS.clone()))
        .map_err(|e| e.to_string())
}

/// Handle to the registered verity metrics.
#[derive(Debug, Clone, Copy)]
pub struct VerityExporter {
    _registered: (),
}

impl VerityExporter {
    /// Register the metrics. Safe to call more than once.
    pub fn register() -> Result<Self, TelemetryError> {
        (*REGISTERED)
            .clone()
            .map(|_| Self { _registered: () })
            .map_err(TelemetryError::Metrics)
    }

    /// Copy a snapshot into the metrics for `device`.
    ///
    /// Counters advance by the difference to the last exported value and
    /// never move backwards, even when a snapshot comes from a reopened target.
    pub fn export(&self, device: &str, snapshot: &MetricsSnapshot, status: VerityStatus) {
        let labels = [device];
        let counters: [(&IntCounterVec, u64); 11] = [
            (&DATA_BLOCKS_VERIFIED, snapshot.data_blocks_verified),
            (&ZERO_BLOCKS, snapshot.zero_blocks),
            (&HASH_BLOCKS_VERIFIED, snapshot.hash_blocks_verified),
            (&SOFT_MISMATCHES, snapshot.soft_mismatches),
            (&FEC_CORRECTIONS, snapshot.fec_corrections),
            (&CORRUPTION_EVENTS, snapshot.corruption_events),
            (&REQUESTS_COMPLETED, snapshot.requests_completed),
            (&REQUESTS_FAILED, snapshot.requests_failed),
            (&PREFETCHES_ISSUED, snapshot.prefetches_issued),
            (&CACHE_HITS, snapshot.cache_hits),
            (&CACHE_MISSES, snapshot.cache_misses),
        ];
        for (counter, value) in counters {
            let counter = counter.with_label_values(&labels);
            counter.inc_by(value.saturating_sub(counter.get()));
        }

        CORRUPTED
            .with_label_values(&labels)
            .set(i64::from(status == VerityStatus::Corrupted));
        CACHE_RESIDENT
            .with_label_values(&labels)
            .set(i64::try_from(snapshot.cache_resident).unwrap_or(i64::MAX));
        REQUEST_AVG_SECONDS
            .with_label_values(&labels)
            .set(snapshot.avg_request_ns as f64 / 1e9);
    }

    /// Encode all verity metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
