//! Adapters Layer (Driven Adapters)
//!
//! Implementations of the outbound ports for a host process.
//!
//! ## Adapters
//!
//! - `FileRegion` - Block region over a file or block device
//! - `TracingTelemetrySink` - Telemetry sink that emits `tracing` events

pub mod file_region;
pub mod tracing_sink;

pub use file_region::FileRegion;
pub use tracing_sink::TracingTelemetrySink;
