//! # Domain Errors
//!
//! Error types for the verity engine.
//!
//! ## Design Principles
//!
//! - `ConfigError` is construction-time only; no engine exists after one
//! - Storage failures (`RegionError`) always reach the caller
//! - Unresolved corruption surfaces only when the policy says `Fail`
//! - A digest disagreement between backends is telemetry, never an error

use crate::domain::entities::BlockKind;
use thiserror::Error;

/// Rejected construction parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Only format versions 0 and 1 exist
    #[error("Invalid version: {0}")]
    InvalidVersion(u32),

    /// Block size not a power of two or outside device limits
    #[error("Invalid {region} block size: {size}")]
    InvalidBlockSize {
        /// "data", "hash" or "logical"
        region: &'static str,
        /// Offending size
        size: u64,
    },

    /// Algorithm name not recognised
    #[error("Unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),

    /// A backend cannot compute the configured algorithm
    #[error("Backend {backend} does not support {algorithm}")]
    UnsupportedBackend {
        /// Backend name
        backend: String,
        /// Algorithm name
        algorithm: &'static str,
    },

    /// Two digests must fit in one hash block
    #[error("Digest size {digest_size} too big for hash block size {hash_block_size}")]
    DigestTooLarge {
        /// Digest output size
        digest_size: usize,
        /// Hash block size
        hash_block_size: u32,
    },

    /// Root digest length differs from the algorithm output size
    #[error("Invalid root digest: expected {expected} bytes, got {actual}")]
    InvalidRootDigest {
        /// Algorithm output size
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Tree would be deeper than supported
    #[error("Too many tree levels: {levels} (max {max})")]
    TooManyLevels {
        /// Computed levels
        levels: u32,
        /// Maximum supported
        max: u32,
    },

    /// Region sizing arithmetic overflowed
    #[error("{0} overflow")]
    Overflow(&'static str),

    /// Hash region cannot hold the tree
    #[error("Hash region too small: need {required} blocks, have {available}")]
    HashRegionTooSmall {
        /// Blocks needed (one past the last tree block)
        required: u64,
        /// Blocks in the region
        available: u64,
    },

    /// Data region shorter than `data_block_count`
    #[error("Data region too small: need {required} blocks, have {available}")]
    DataRegionTooSmall {
        /// Configured data blocks
        required: u64,
        /// Blocks in the region
        available: u64,
    },

    /// Region block size differs from the configured one
    #[error("{region} region block size {actual} does not match configured {expected}")]
    RegionBlockSizeMismatch {
        /// "data" or "hash"
        region: &'static str,
        /// Configured size
        expected: usize,
        /// Region's size
        actual: usize,
    },

    /// Any other rejected parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Block region I/O failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegionError {
    /// Read past the end of the region
    #[error("Read out of bounds: blocks {start}..{end} of {total}")]
    OutOfBounds {
        /// First block requested
        start: u64,
        /// One past the last block requested
        end: u64,
        /// Blocks in the region
        total: u64,
    },

    /// Caller buffer does not match the requested block count
    #[error("Read buffer is {actual} bytes, expected {expected}")]
    BufferLength {
        /// Expected byte count
        expected: usize,
        /// Supplied byte count
        actual: usize,
    },

    /// Underlying storage failed
    #[error("I/O error at block {block}: {message}")]
    Io {
        /// First failing block
        block: u64,
        /// Cause
        message: String,
    },
}

/// Error-correction failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FecError {
    /// No decoder configured
    #[error("FEC not configured")]
    Disabled,

    /// Too many erasures to reconstruct
    #[error("Uncorrectable {kind} block {block}")]
    Uncorrectable {
        /// Region of the block
        kind: BlockKind,
        /// Block index or hash-block address
        block: u64,
    },

    /// Parity data could not be read
    #[error("FEC I/O error: {0}")]
    Io(String),
}

/// Verification failure surfaced to a caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerityError {
    /// Storage read failed
    #[error(transparent)]
    Io(#[from] RegionError),

    /// Unresolved corruption under fail-fast policy
    #[error("{kind} block {block} is corrupted")]
    Corruption {
        /// Region of the block
        kind: BlockKind,
        /// Data block index or hash-block address
        block: u64,
    },

    /// Request extends past the last data block
    #[error("Request out of range: blocks {block}+{count} of {total}")]
    OutOfRange {
        /// First block requested
        block: u64,
        /// Blocks requested
        count: u64,
        /// Data blocks in the target
        total: u64,
    },

    /// Segments do not hold exactly the requested blocks
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        /// Requested bytes
        expected: usize,
        /// Segment bytes
        actual: usize,
    },

    /// Request aborted by its origin
    #[error("Request cancelled")]
    Cancelled,
}

impl VerityError {
    /// True for an unresolved-corruption failure.
    pub fn is_corruption(&self) -> bool {
        matches!(self, VerityError::Corruption { .. })
    }
}
