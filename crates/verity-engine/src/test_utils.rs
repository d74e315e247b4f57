//! Test doubles and fixtures shared by unit and integration tests.
//!
//! Enabled for `cfg(test)` and through the `test-utils` feature.

use crate::domain::builder::{BuiltTree, HashTreeBuilder};
use crate::domain::config::{VerityConfig, VerityConfigBuilder};
use crate::domain::entities::BlockKind;
use crate::domain::errors::{FecError, RegionError};
use crate::ports::outbound::{
    checked_range, pad_to_blocks, BlockRegion, FatalActionHandler, FecDecoder, MemoryRegion,
    TelemetrySink,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use verity_crypto::{Digest, DigestAlgorithm, DigestBackend, DigestContext, SoftwareBackend};

// =============================================================================
// Observers
// =============================================================================

/// One telemetry notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    SoftMismatch(BlockKind, u64),
    FecCorrected(BlockKind, u64),
    Corruption(BlockKind, u64, u32),
}

/// Sink that records every event it receives.
#[derive(Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn corruption_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::Corruption(..)))
            .count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn on_soft_mismatch(&self, kind: BlockKind, block: u64) {
        self.events.lock().push(TelemetryEvent::SoftMismatch(kind, block));
    }

    fn on_fec_corrected(&self, kind: BlockKind, block: u64) {
        self.events.lock().push(TelemetryEvent::FecCorrected(kind, block));
    }

    fn on_corruption(&self, kind: BlockKind, block: u64, count: u32) {
        self.events
            .lock()
            .push(TelemetryEvent::Corruption(kind, block, count));
    }
}

/// Fatal handler that records its calls.
#[derive(Default)]
pub struct RecordingFatalHandler {
    calls: Mutex<Vec<(BlockKind, u64)>>,
}

impl RecordingFatalHandler {
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<(BlockKind, u64)> {
        self.calls.lock().clone()
    }
}

impl FatalActionHandler for RecordingFatalHandler {
    fn on_fatal_corruption(&self, kind: BlockKind, block: u64) {
        self.calls.lock().push((kind, block));
    }
}

// =============================================================================
// Faulty digest backend
// =============================================================================

/// Backend that corrupts the digest of any input containing a marker.
///
/// Wraps the software backend; digests of inputs without the marker are
/// correct. Stands in for a misbehaving hardware offload.
pub struct FaultyBackend {
    marker: Vec<u8>,
    faults: Arc<AtomicUsize>,
}

impl FaultyBackend {
    pub fn new(marker: &[u8]) -> Self {
        Self {
            marker: marker.to_vec(),
            faults: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Digests corrupted so far.
    pub fn faults(&self) -> usize {
        self.faults.load(Ordering::Relaxed)
    }
}

struct FaultyContext {
    inner: Box<dyn DigestContext>,
    seen: Vec<u8>,
    marker: Vec<u8>,
    faults: Arc<AtomicUsize>,
}

impl DigestContext for FaultyContext {
    fn update(&mut self, data: &[u8]) {
        self.seen.extend_from_slice(data);
        self.inner.update(data);
    }

    fn finalize(self: Box<Self>) -> Digest {
        let hit = self
            .seen
            .windows(self.marker.len())
            .any(|w| w == self.marker.as_slice());
        let digest = self.inner.finalize();
        if !hit {
            return digest;
        }
        self.faults.fetch_add(1, Ordering::Relaxed);
        let mut bytes = digest.as_bytes().to_vec();
        bytes[0] ^= 0x01;
        Digest::new(bytes)
    }
}

impl DigestBackend for FaultyBackend {
    fn name(&self) -> &str {
        "faulty"
    }

    fn supports(&self, algorithm: DigestAlgorithm) -> bool {
        SoftwareBackend.supports(algorithm)
    }

    fn begin(&self, algorithm: DigestAlgorithm) -> Box<dyn DigestContext> {
        Box::new(FaultyContext {
            inner: SoftwareBackend.begin(algorithm),
            seen: Vec::new(),
            marker: self.marker.clone(),
            faults: self.faults.clone(),
        })
    }
}

// =============================================================================
// FEC
// =============================================================================

/// FEC decoder that repairs blocks from pristine copies of both regions.
pub struct MirrorFec {
    data: Vec<u8>,
    hash: Vec<u8>,
    data_block_size: usize,
    hash_block_size: usize,
    broken: Mutex<HashSet<(BlockKind, u64)>>,
    calls: AtomicUsize,
}

impl MirrorFec {
    pub fn new(fixture: &Fixture) -> Self {
        Self {
            data: fixture.data.snapshot(),
            hash: fixture.hash.snapshot(),
            data_block_size: fixture.config.data_block_size as usize,
            hash_block_size: fixture.config.hash_block_size as usize,
            broken: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make a block unrecoverable.
    pub fn break_block(&self, kind: BlockKind, block: u64) {
        self.broken.lock().insert((kind, block));
    }

    /// Correction attempts so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl FecDecoder for MirrorFec {
    fn is_enabled(&self) -> bool {
        true
    }

    fn correct(&self, kind: BlockKind, block: u64, _original: &[u8]) -> Result<Vec<u8>, FecError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.broken.lock().contains(&(kind, block)) {
            return Err(FecError::Uncorrectable { kind, block });
        }
        let (source, size) = match kind {
            BlockKind::Data => (&self.data, self.data_block_size),
            BlockKind::Metadata => (&self.hash, self.hash_block_size),
        };
        let offset = block as usize * size;
        source
            .get(offset..offset + size)
            .map(<[u8]>::to_vec)
            .ok_or(FecError::Uncorrectable { kind, block })
    }
}

/// FEC decoder that returns the input unchanged; its output never verifies.
#[derive(Default)]
pub struct EchoFec;

impl FecDecoder for EchoFec {
    fn is_enabled(&self) -> bool {
        true
    }

    fn correct(&self, _kind: BlockKind, _block: u64, original: &[u8]) -> Result<Vec<u8>, FecError> {
        Ok(original.to_vec())
    }
}

// =============================================================================
// Regions
// =============================================================================

/// In-memory region whose bytes can be tampered with and whose reads can be
/// made to fail while a target is using it.
pub struct TamperableRegion {
    block_size: usize,
    bytes: RwLock<Vec<u8>>,
    failing: Mutex<HashSet<u64>>,
    reads: AtomicU64,
}

impl TamperableRegion {
    /// Wrap `bytes`, zero-padded to a whole number of blocks.
    pub fn new(block_size: usize, mut bytes: Vec<u8>) -> Self {
        pad_to_blocks(&mut bytes, block_size);
        Self {
            block_size,
            bytes: RwLock::new(bytes),
            failing: Mutex::new(HashSet::new()),
            reads: AtomicU64::new(0),
        }
    }

    /// Overwrite bytes at `offset`.
    pub fn write_at(&self, offset: usize, data: &[u8]) {
        self.bytes.write()[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Flip every bit of the byte at `offset`.
    pub fn corrupt_byte(&self, offset: usize) {
        self.bytes.write()[offset] ^= 0xff;
    }

    /// Make reads touching `block` fail.
    pub fn fail_block(&self, block: u64) {
        self.failing.lock().insert(block);
    }

    /// Undo `fail_block`.
    pub fn heal_block(&self, block: u64) {
        self.failing.lock().remove(&block);
    }

    /// Copy of the whole region.
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }

    /// Completed read calls.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl BlockRegion for TamperableRegion {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        (self.bytes.read().len() / self.block_size) as u64
    }

    fn read_blocks(&self, start: u64, buf: &mut [u8]) -> Result<(), RegionError> {
        let range = checked_range(self.block_size, self.block_count(), start, buf.len())?;
        let failed = {
            let failing = self.failing.lock();
            range.clone().find(|b| failing.contains(b))
        };
        if let Some(block) = failed {
            return Err(RegionError::Io {
                block,
                message: "injected read failure".to_string(),
            });
        }

        let offset = range.start as usize * self.block_size;
        buf.copy_from_slice(&self.bytes.read()[offset..offset + buf.len()]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A data region, its formatted hash region, and a rooted configuration.
pub struct Fixture {
    pub config: VerityConfig,
    pub data: Arc<TamperableRegion>,
    pub hash: Arc<TamperableRegion>,
    pub tree: BuiltTree,
}

impl Fixture {
    /// Build the tree for `data` under `config` and root the config.
    pub fn build(config: VerityConfig, data: Vec<u8>) -> Self {
        let tree = HashTreeBuilder::from_config(&config)
            .expect("valid layout")
            .build(&MemoryRegion::new(config.data_block_size as usize, data.clone()))
            .expect("tree builds");
        let config = config.with_root_digest(tree.root_digest.as_bytes().to_vec());
        Self {
            data: Arc::new(TamperableRegion::new(config.data_block_size as usize, data)),
            hash: Arc::new(TamperableRegion::new(config.hash_block_size as usize, tree.image())),
            config,
            tree,
        }
    }

    /// Patterned data under a small default layout.
    pub fn patterned(version: u32, blocks: u64) -> Self {
        Self::build(small_config(version, blocks), patterned_data(blocks, 512))
    }

    /// Byte offset of data block `block`.
    pub fn data_offset(&self, block: u64) -> usize {
        block as usize * self.config.data_block_size as usize
    }

    /// Byte offset of hash block `address`.
    pub fn hash_offset(&self, address: u64) -> usize {
        address as usize * self.config.hash_block_size as usize
    }

    /// Expected content of data block `block`.
    pub fn block(&self, block: u64) -> Vec<u8> {
        let offset = self.data_offset(block);
        self.data.snapshot()[offset..offset + self.config.data_block_size as usize].to_vec()
    }
}

/// 512-byte blocks, sha256, salted, unrooted.
pub fn small_config(version: u32, blocks: u64) -> VerityConfig {
    VerityConfigBuilder::new()
        .version(version)
        .block_sizes(512, 512)
        .data_block_count(blocks)
        .salt(b"verity-salt".to_vec())
        .prefetch_cluster_bytes(0)
        .worker_threads(2)
        .build_unrooted()
        .expect("valid small config")
}

/// Deterministic non-zero content; every block differs.
pub fn patterned_data(blocks: u64, block_size: usize) -> Vec<u8> {
    (0..blocks as usize * block_size)
        .map(|i| (((i / block_size) as u8).wrapping_mul(31) ^ (i % 251) as u8) | 1)
        .collect()
}
