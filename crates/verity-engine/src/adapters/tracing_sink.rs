//! Telemetry sink that forwards events to `tracing`.
//!
//! Events are emitted under the `verity::telemetry` target so a subscriber
//! can route them separately from the engine's own logs.

use crate::domain::entities::BlockKind;
use crate::ports::outbound::TelemetrySink;
use tracing::{error, info, warn};

/// Sink that logs each event with structured fields.
#[derive(Debug, Default, Clone)]
pub struct TracingTelemetrySink {
    device: String,
}

impl TracingTelemetrySink {
    /// Sink labelling every event with `device`.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Device label.
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl TelemetrySink for TracingTelemetrySink {
    fn on_soft_mismatch(&self, kind: BlockKind, block: u64) {
        warn!(target: "verity::telemetry", device = %self.device, %kind, block, event = "soft_mismatch");
    }

    fn on_fec_corrected(&self, kind: BlockKind, block: u64) {
        info!(target: "verity::telemetry", device = %self.device, %kind, block, event = "fec_corrected");
    }

    fn on_corruption(&self, kind: BlockKind, block: u64, count: u32) {
        error!(target: "verity::telemetry", device = %self.device, %kind, block, count, event = "corruption");
    }
}
