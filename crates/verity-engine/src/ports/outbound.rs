//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the verity engine.
//!
//! These are the interfaces the host application implements: block storage
//! for both regions, an optional FEC decoder, and the corruption observers.

use crate::domain::entities::BlockKind;
use crate::domain::errors::{FecError, RegionError};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// Read-only block storage.
///
/// Production: `FileRegion` (adapters/file_region.rs)
/// In memory: `MemoryRegion` (below)
pub trait BlockRegion: Send + Sync {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Number of blocks in the region.
    fn block_count(&self) -> u64;

    /// Read `buf.len() / block_size` blocks starting at `start`.
    ///
    /// Blocks until the read completes.
    fn read_blocks(&self, start: u64, buf: &mut [u8]) -> Result<(), RegionError>;
}

/// Forward-error-correction decoder (black box).
pub trait FecDecoder: Send + Sync {
    /// Whether parity data is configured.
    fn is_enabled(&self) -> bool;

    /// Reconstruct a block from parity.
    ///
    /// `block` is the data block index for `Data` and the hash-block address
    /// for `Metadata`. `original` is the content that failed verification.
    fn correct(&self, kind: BlockKind, block: u64, original: &[u8]) -> Result<Vec<u8>, FecError>;
}

/// Observer of verification anomalies.
///
/// Calls are rate-limited by the corruption policy.
pub trait TelemetrySink: Send + Sync {
    /// Primary digest disagreed, fallback matched.
    fn on_soft_mismatch(&self, kind: BlockKind, block: u64);

    /// FEC repaired a block.
    fn on_fec_corrected(&self, kind: BlockKind, block: u64);

    /// Unresolved corruption; `count` is the reported-event count so far.
    fn on_corruption(&self, kind: BlockKind, block: u64, count: u32);
}

/// External action taken in restart mode.
pub trait FatalActionHandler: Send + Sync {
    /// Corruption was found and the device should be restarted.
    fn on_fatal_corruption(&self, kind: BlockKind, block: u64);
}

// =============================================================================
// Default implementations
// =============================================================================

/// FEC disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFec;

impl FecDecoder for NoFec {
    fn is_enabled(&self) -> bool {
        false
    }

    fn correct(&self, _kind: BlockKind, _block: u64, _original: &[u8]) -> Result<Vec<u8>, FecError> {
        Err(FecError::Disabled)
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn on_soft_mismatch(&self, _: BlockKind, _: u64) {}
    fn on_fec_corrected(&self, _: BlockKind, _: u64) {}
    fn on_corruption(&self, _: BlockKind, _: u64, _: u32) {}
}

/// Fatal handler that only logs; the host decides how to restart.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFatalHandler;

impl FatalActionHandler for LoggingFatalHandler {
    fn on_fatal_corruption(&self, kind: BlockKind, block: u64) {
        error!(%kind, block, "verity device corrupted, restart requested");
    }
}

// =============================================================================
// In-memory region
// =============================================================================

/// Immutable block region held in memory.
pub struct MemoryRegion {
    block_size: usize,
    bytes: Vec<u8>,
    reads: AtomicU64,
}

impl MemoryRegion {
    /// Wrap `bytes`, zero-padded to a whole number of blocks.
    pub fn new(block_size: usize, mut bytes: Vec<u8>) -> Self {
        pad_to_blocks(&mut bytes, block_size);
        Self {
            block_size,
            bytes,
            reads: AtomicU64::new(0),
        }
    }

    /// All-zero region of `count` blocks.
    pub fn zeroed(block_size: usize, count: u64) -> Self {
        Self::new(block_size, vec![0u8; block_size * count as usize])
    }

    /// Completed read calls.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl BlockRegion for MemoryRegion {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        (self.bytes.len() / self.block_size) as u64
    }

    fn read_blocks(&self, start: u64, buf: &mut [u8]) -> Result<(), RegionError> {
        let range = checked_range(self.block_size, self.block_count(), start, buf.len())?;
        let offset = range.start as usize * self.block_size;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

pub(crate) fn pad_to_blocks(bytes: &mut Vec<u8>, block_size: usize) {
    let remainder = bytes.len() % block_size;
    if remainder != 0 {
        bytes.resize(bytes.len() + block_size - remainder, 0);
    }
}

/// Block range covered by a read of `len` bytes at `start`.
pub(crate) fn checked_range(
    block_size: usize,
    total: u64,
    start: u64,
    len: usize,
) -> Result<Range<u64>, RegionError> {
    if len % block_size != 0 {
        return Err(RegionError::BufferLength {
            expected: len - len % block_size,
            actual: len,
        });
    }
    let count = (len / block_size) as u64;
    let end = start
        .checked_add(count)
        .filter(|end| *end <= total)
        .ok_or(RegionError::OutOfBounds {
            start,
            end: start.saturating_add(count),
            total,
        })?;
    Ok(start..end)
}
