//! # Verity Telemetry
//!
//! Observability for verity targets.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter`, pretty or JSON output
//! - **Metrics**: Prometheus counters and gauges fed from engine metric snapshots
//!
//! ## Usage
//!
//! ```rust,ignore
//! use verity_telemetry::{init_logging, TelemetryConfig, VerityExporter};
//!
//! init_logging(&TelemetryConfig::from_env())?;
//!
//! let exporter = VerityExporter::register()?;
//! exporter.export("vroot", &target.metrics(), target.status());
//! println!("{}", exporter.render()?);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VERITY_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `VERITY_JSON_LOGS` | `false` | JSON formatted logs |
//! | `VERITY_SERVICE_NAME` | `block-verity` | Service name in logs |

#![warn(missing_docs)]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{VerityExporter, METRIC_PREFIX};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metric registration or encoding failed
    #[error("Prometheus metrics error: {0}")]
    Metrics(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Structured log entry with the device label attached.
///
/// # Example
///
/// ```rust,ignore
/// log_event!(warn, "vroot", "hash cache thrashing", misses = 1200);
/// ```
#[macro_export]
macro_rules! log_event {
    (info, $device:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::info!(device = $device, $($($field)*,)? $msg)
    };
    (warn, $device:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::warn!(device = $device, $($($field)*,)? $msg)
    };
    (error, $device:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::error!(device = $device, $($($field)*,)? $msg)
    };
    (debug, $device:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::debug!(device = $device, $($($field)*,)? $msg)
    };
}
