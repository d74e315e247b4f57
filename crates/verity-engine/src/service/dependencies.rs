//! Outbound dependencies of a verity target.

use crate::domain::policy::DEFAULT_TELEMETRY_INTERVAL;
use crate::ports::outbound::{
    BlockRegion, FatalActionHandler, FecDecoder, LoggingFatalHandler, NoFec, NoopTelemetry,
    TelemetrySink,
};
use std::sync::Arc;
use std::time::Duration;
use verity_crypto::{DigestBackend, SoftwareBackend};

/// Everything a `VerityTarget` talks to.
///
/// Only the two regions are required; the rest default to FEC disabled,
/// no telemetry, a logging fatal handler and software digests.
pub struct VerityDependencies {
    /// Data region (read-only)
    pub data_region: Arc<dyn BlockRegion>,
    /// Hash region (read-only)
    pub hash_region: Arc<dyn BlockRegion>,
    /// Error-correction decoder
    pub fec: Arc<dyn FecDecoder>,
    /// Anomaly observer
    pub telemetry: Arc<dyn TelemetrySink>,
    /// Restart-mode action
    pub fatal: Arc<dyn FatalActionHandler>,
    /// First-attempt digest backend
    pub primary_backend: Arc<dyn DigestBackend>,
    /// Retry digest backend
    pub fallback_backend: Arc<dyn DigestBackend>,
    /// Minimum spacing of telemetry notifications
    pub telemetry_interval: Duration,
}

impl VerityDependencies {
    /// Dependencies with default collaborators.
    pub fn new(data_region: Arc<dyn BlockRegion>, hash_region: Arc<dyn BlockRegion>) -> Self {
        let software: Arc<dyn DigestBackend> = Arc::new(SoftwareBackend::new());
        Self {
            data_region,
            hash_region,
            fec: Arc::new(NoFec),
            telemetry: Arc::new(NoopTelemetry),
            fatal: Arc::new(LoggingFatalHandler),
            primary_backend: software.clone(),
            fallback_backend: software,
            telemetry_interval: DEFAULT_TELEMETRY_INTERVAL,
        }
    }

    /// Use `fec` for corrections.
    pub fn with_fec(mut self, fec: Arc<dyn FecDecoder>) -> Self {
        self.fec = fec;
        self
    }

    /// Report anomalies to `telemetry`.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Invoke `fatal` in restart mode.
    pub fn with_fatal_handler(mut self, fatal: Arc<dyn FatalActionHandler>) -> Self {
        self.fatal = fatal;
        self
    }

    /// Use `backend` for first attempts.
    pub fn with_primary_backend(mut self, backend: Arc<dyn DigestBackend>) -> Self {
        self.primary_backend = backend;
        self
    }

    /// Use `backend` for retries.
    pub fn with_fallback_backend(mut self, backend: Arc<dyn DigestBackend>) -> Self {
        self.fallback_backend = backend;
        self
    }

    /// Replace the telemetry interval.
    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }
}
