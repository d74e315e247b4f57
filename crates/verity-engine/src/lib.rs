//! # Block Verity Engine
//!
//! Verifies every block read from a read-only data region against a Merkle
//! hash tree stored in a separate hash region, rooted at one trusted digest.
//! Content is released to the caller only after its chain root→leaf has been
//! matched.
//!
//! ## Architecture
//!
//! ```text
//!  read(block, n) ──→ Prefetcher ──→ HashBlockCache (speculative, best effort)
//!        │
//!        ↓  per block, index order
//!  resolve_digest_chain ──→ verify_level(L-1 .. 0) ──→ HashBlockCache + Hasher
//!        │
//!        ↓
//!  verify data ──→ primary ─✗→ fallback ─✗→ FEC ─✗→ CorruptionPolicy
//! ```
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Minimal Levels | `levels` is the smallest count covering `data_block_count - 1` |
//! | 2 | One-Way Verified Flag | A cached hash block never becomes unverified |
//! | 3 | Sticky Failure | `hash_failed` never resets once set |
//! | 4 | Saturating Reports | At most 100 corruption events are reported |
//! | 5 | Bounded Retry | One fallback digest and one FEC attempt per block and level |
//! | 6 | Read Only | No write path is exposed |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Geometry, cache, hasher, policy, verifier, tree builder
//! - `ports/` - Port traits (inbound API, outbound regions, FEC, telemetry)
//! - `adapters/` - File-backed region, tracing telemetry sink
//! - `service` - `VerityTarget`, the application service
//! - `metrics` - Lock-free verification counters
//!
//! ## Usage
//!
//! ```ignore
//! use verity_engine::{HashTreeBuilder, MemoryRegion, VerityConfig, VerityDependencies, VerityTarget};
//!
//! let data = Arc::new(MemoryRegion::new(4096, image));
//! let tree = HashTreeBuilder::from_config(&config)?.build(data.as_ref())?;
//! let hash = Arc::new(MemoryRegion::new(4096, tree.image()));
//!
//! let config = config.with_root_digest(tree.root_digest.as_bytes().to_vec());
//! let target = VerityTarget::new(config, VerityDependencies::new(data, hash))?;
//! let content = target.read_blocks(0, 16)?;
//! ```

pub mod adapters;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenience
pub use adapters::{FileRegion, TracingTelemetrySink};
pub use domain::builder::{BuiltTree, HashTreeBuilder};
pub use domain::cache::{CacheStats, HashBlock, HashBlockCache};
pub use domain::config::{CorruptionMode, VerityConfig, VerityConfigBuilder};
pub use domain::entities::{BlockKind, CancellationFlag, ReadRequest, VerityStatus};
pub use domain::errors::{ConfigError, FecError, RegionError, VerityError};
pub use domain::geometry::{TreeGeometry, MAX_LEVELS};
pub use domain::hasher::{HashMode, HashStream, VerityHasher};
pub use domain::policy::{CorruptionPolicy, PolicyDecision, RateLimiter, MAX_CORRUPTED_ERRS};
pub use domain::prefetch::{PrefetchRange, Prefetcher};
pub use domain::segments::{IoSegments, SegmentCursor};
pub use domain::verifier::{AttemptState, LevelOutcome, ResolvedLeaf, Verifier, VerifierParts};
pub use metrics::{MetricsSnapshot, VerityMetrics};
pub use ports::inbound::BlockVerityApi;
pub use ports::outbound::{
    BlockRegion, FatalActionHandler, FecDecoder, LoggingFatalHandler, MemoryRegion, NoFec,
    NoopTelemetry, TelemetrySink,
};
pub use service::{VerityDependencies, VerityTarget};

// Digest primitives used across the public API
pub use verity_crypto::{Digest, DigestAlgorithm, DigestBackend, SoftwareBackend};
