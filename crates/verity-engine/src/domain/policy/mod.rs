//! # Corruption Policy
//!
//! Decides what happens when a block fails every digest attempt and FEC.
//!
//! | Mode | Outcome | Side effects |
//! |------|---------|--------------|
//! | `FailFast` | `Fail` | status becomes corrupted |
//! | `Logging` | `Continue` | status becomes corrupted |
//! | `Restart` | `Continue` | status becomes corrupted, fatal handler notified |
//!
//! The first `MAX_CORRUPTED_ERRS` events are logged and forwarded to the
//! telemetry sink; later ones only set the status. Soft mismatch and FEC
//! notices are informational and go through a `RateLimiter`. Corruption
//! notices are never throttled.

use crate::domain::config::CorruptionMode;
use crate::domain::entities::{BlockKind, VerityStatus};
use crate::ports::outbound::{FatalActionHandler, TelemetrySink};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[cfg(test)]
mod tests;

/// Reported corruption events before reporting stops.
pub const MAX_CORRUPTED_ERRS: u32 = 100;

/// Default minimum spacing of soft mismatch and FEC notifications.
pub const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Policy verdict for one unresolved corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Abort the request with an I/O error
    Fail,
    /// Let the request complete
    Continue,
}

/// Allows at most one event per interval.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Limiter with the given spacing; zero allows everything.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Whether an event at `now` may be emitted. Records it if so.
    pub fn should_emit(&self, now: Instant) -> bool {
        let mut last = self.last.lock();
        match *last {
            Some(previous) if now.saturating_duration_since(previous) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Configured spacing.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Corruption state and response.
pub struct CorruptionPolicy {
    mode: CorruptionMode,
    hash_failed: AtomicBool,
    corrupted_errs: AtomicU32,
    limiter: RateLimiter,
    sink: Arc<dyn TelemetrySink>,
    fatal: Arc<dyn FatalActionHandler>,
}

impl CorruptionPolicy {
    /// Create a policy with the default telemetry interval.
    pub fn new(
        mode: CorruptionMode,
        sink: Arc<dyn TelemetrySink>,
        fatal: Arc<dyn FatalActionHandler>,
    ) -> Self {
        Self {
            mode,
            hash_failed: AtomicBool::new(false),
            corrupted_errs: AtomicU32::new(0),
            limiter: RateLimiter::new(DEFAULT_TELEMETRY_INTERVAL),
            sink,
            fatal,
        }
    }

    /// Replace the spacing of informational notices.
    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.limiter = RateLimiter::new(interval);
        self
    }

    /// Handle one unresolved corruption.
    pub fn handle(&self, kind: BlockKind, block: u64) -> PolicyDecision {
        self.hash_failed.store(true, Ordering::Release);

        let reported = self
            .corrupted_errs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < MAX_CORRUPTED_ERRS).then_some(count + 1)
            })
            .ok()
            .map(|previous| previous + 1);

        if let Some(count) = reported {
            error!(%kind, block, count, "{} block {} is corrupted", kind, block);
            if count == MAX_CORRUPTED_ERRS {
                error!(count, "reached maximum errors");
            }
            self.sink.on_corruption(kind, block, count);
        }

        match self.mode {
            CorruptionMode::FailFast => PolicyDecision::Fail,
            CorruptionMode::Logging => PolicyDecision::Continue,
            CorruptionMode::Restart => {
                self.fatal.on_fatal_corruption(kind, block);
                PolicyDecision::Continue
            }
        }
    }

    /// Primary digest path disagreed but the fallback matched.
    pub fn report_soft_mismatch(&self, kind: BlockKind, block: u64) {
        warn!(%kind, block, "primary digest mismatch, fallback digest matched");
        if self.limiter.should_emit(Instant::now()) {
            self.sink.on_soft_mismatch(kind, block);
        }
    }

    /// FEC repaired a block.
    pub fn report_fec_corrected(&self, kind: BlockKind, block: u64) {
        info!(%kind, block, "block corrected by FEC");
        if self.limiter.should_emit(Instant::now()) {
            self.sink.on_fec_corrected(kind, block);
        }
    }

    /// Whether any corruption was ever seen.
    pub fn hash_failed(&self) -> bool {
        self.hash_failed.load(Ordering::Acquire)
    }

    /// Reported corruption events (saturates at `MAX_CORRUPTED_ERRS`).
    pub fn corrupted_error_count(&self) -> u32 {
        self.corrupted_errs.load(Ordering::Acquire)
    }

    /// Device status.
    pub fn status(&self) -> VerityStatus {
        if self.hash_failed() {
            VerityStatus::Corrupted
        } else {
            VerityStatus::Valid
        }
    }

    /// Configured mode.
    pub fn mode(&self) -> CorruptionMode {
        self.mode
    }
}
