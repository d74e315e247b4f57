//! # Verity Configuration
//!
//! Construction parameters of a verity target and their validation.
//!
//! # Example
//!
//! ```ignore
//! use verity_engine::domain::config::VerityConfigBuilder;
//!
//! let config = VerityConfigBuilder::new()
//!     .data_block_count(1 << 20)
//!     .algorithm("sha256")
//!     .root_digest(root)
//!     .salt(salt)
//!     .ignore_zero_blocks(true)
//!     .build()
//!     .expect("Valid config");
//! ```

use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use verity_crypto::DigestAlgorithm;

/// Largest supported data block (one page).
pub const MAX_DATA_BLOCK_SIZE: u32 = 4096;

/// Sector size used for region sizing arithmetic.
pub const SECTOR_SIZE: u32 = 512;

/// Default prefetch cluster in bytes.
pub const DEFAULT_PREFETCH_CLUSTER_BYTES: u32 = 262_144;

/// Default number of resident hash blocks.
pub const DEFAULT_HASH_CACHE_BLOCKS: usize = 4096;

/// Response to corruption that survives retry and FEC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorruptionMode {
    /// Fail the read with an I/O error
    #[default]
    #[serde(rename = "fail_fast")]
    FailFast,
    /// Record the corruption and let the read complete
    #[serde(rename = "ignore_corruption")]
    Logging,
    /// As `Logging`, plus notify the fatal-action handler
    #[serde(rename = "restart_on_corruption")]
    Restart,
}

/// Verity target parameters.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerityConfig {
    /// On-disk format version (0 or 1)
    pub version: u32,
    /// Data block size in bytes
    pub data_block_size: u32,
    /// Hash block size in bytes
    pub hash_block_size: u32,
    /// Number of data blocks covered by the tree
    pub data_block_count: u64,
    /// First hash-region block of the tree
    pub hash_start_block: u64,
    /// Digest algorithm name
    pub algorithm: String,
    /// Trusted root digest
    #[serde_as(as = "Hex")]
    pub root_digest: Vec<u8>,
    /// Salt mixed into every digest
    #[serde_as(as = "Option<Hex>")]
    pub salt: Option<Vec<u8>>,
    /// Response to unresolved corruption
    pub corruption_mode: CorruptionMode,
    /// Synthesize zeros for blocks whose leaf is the zero-block digest
    pub ignore_zero_blocks: bool,
    /// Leaf-level prefetch granularity in bytes (0 disables clustering)
    pub prefetch_cluster_bytes: u32,
    /// Resident hash blocks kept by the cache
    pub hash_cache_blocks: usize,
    /// Minimum I/O size of the underlying devices
    pub logical_block_size: u32,
    /// Verification workers (`None` = one per CPU)
    pub worker_threads: Option<usize>,
}

impl Default for VerityConfig {
    fn default() -> Self {
        Self {
            version: 1,
            data_block_size: 4096,
            hash_block_size: 4096,
            data_block_count: 0,
            hash_start_block: 0,
            algorithm: "sha256".to_string(),
            root_digest: Vec::new(),
            salt: None,
            corruption_mode: CorruptionMode::FailFast,
            ignore_zero_blocks: false,
            prefetch_cluster_bytes: DEFAULT_PREFETCH_CLUSTER_BYTES,
            hash_cache_blocks: DEFAULT_HASH_CACHE_BLOCKS,
            logical_block_size: SECTOR_SIZE,
            worker_threads: None,
        }
    }
}

impl VerityConfig {
    /// Validate everything, including the root digest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let algorithm = self.validate_layout()?;
        if self.root_digest.len() != algorithm.output_size() {
            return Err(ConfigError::InvalidRootDigest {
                expected: algorithm.output_size(),
                actual: self.root_digest.len(),
            });
        }
        Ok(())
    }

    /// Validate the tree layout parameters; the root digest is not checked.
    ///
    /// Used when formatting, before a root digest exists.
    pub fn validate_layout(&self) -> Result<DigestAlgorithm, ConfigError> {
        if self.version > 1 {
            return Err(ConfigError::InvalidVersion(self.version));
        }

        if !self.logical_block_size.is_power_of_two() || self.logical_block_size < SECTOR_SIZE {
            return Err(ConfigError::InvalidBlockSize {
                region: "logical",
                size: self.logical_block_size as u64,
            });
        }

        if !self.data_block_size.is_power_of_two()
            || self.data_block_size < self.logical_block_size
            || self.data_block_size > MAX_DATA_BLOCK_SIZE
        {
            return Err(ConfigError::InvalidBlockSize {
                region: "data",
                size: self.data_block_size as u64,
            });
        }

        if !self.hash_block_size.is_power_of_two()
            || self.hash_block_size < self.logical_block_size
            || self.hash_block_size > i32::MAX as u32
        {
            return Err(ConfigError::InvalidBlockSize {
                region: "hash",
                size: self.hash_block_size as u64,
            });
        }

        // Both regions must stay addressable in sectors.
        let data_sectors = (self.data_block_size / SECTOR_SIZE) as u64;
        if self.data_block_count.checked_mul(data_sectors).is_none() {
            return Err(ConfigError::Overflow("Data blocks"));
        }
        let hash_sectors = (self.hash_block_size / SECTOR_SIZE) as u64;
        if self.hash_start_block.checked_mul(hash_sectors).is_none() {
            return Err(ConfigError::Overflow("Hash start"));
        }

        let algorithm = self.digest_algorithm()?;
        if algorithm.output_size() * 2 > self.hash_block_size as usize {
            return Err(ConfigError::DigestTooLarge {
                digest_size: algorithm.output_size(),
                hash_block_size: self.hash_block_size,
            });
        }

        if self.hash_cache_blocks == 0 {
            return Err(ConfigError::InvalidParameter(
                "hash_cache_blocks cannot be 0".to_string(),
            ));
        }

        if self.worker_threads == Some(0) {
            return Err(ConfigError::InvalidParameter(
                "worker_threads cannot be 0".to_string(),
            ));
        }

        Ok(algorithm)
    }

    /// Resolve the algorithm name.
    pub fn digest_algorithm(&self) -> Result<DigestAlgorithm, ConfigError> {
        DigestAlgorithm::from_name(&self.algorithm)
            .map_err(|_| ConfigError::UnknownAlgorithm(self.algorithm.clone()))
    }

    /// Salt bytes (empty when absent).
    pub fn salt_bytes(&self) -> &[u8] {
        self.salt.as_deref().unwrap_or_default()
    }

    /// Worker count, defaulting to the CPU count.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get)
    }

    /// Builder-style method to set the root digest
    pub fn with_root_digest(mut self, root_digest: Vec<u8>) -> Self {
        self.root_digest = root_digest;
        self
    }

    /// Builder-style method to set the corruption mode
    pub fn with_corruption_mode(mut self, mode: CorruptionMode) -> Self {
        self.corruption_mode = mode;
        self
    }

    /// Builder-style method to toggle zero-block synthesis
    pub fn with_ignore_zero_blocks(mut self, enabled: bool) -> Self {
        self.ignore_zero_blocks = enabled;
        self
    }

    /// Builder-style method to set the prefetch cluster
    pub fn with_prefetch_cluster_bytes(mut self, bytes: u32) -> Self {
        self.prefetch_cluster_bytes = bytes;
        self
    }

    /// Builder-style method to set the cache capacity
    pub fn with_hash_cache_blocks(mut self, blocks: usize) -> Self {
        self.hash_cache_blocks = blocks;
        self
    }

    /// Builder-style method to set the worker count
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }
}

/// Builder for VerityConfig with validation
///
/// # Example
///
/// ```ignore
/// let config = VerityConfigBuilder::new()
///     .version(0)
///     .block_sizes(4096, 4096)
///     .data_block_count(256)
///     .root_digest(root)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct VerityConfigBuilder {
    config: VerityConfig,
}

impl VerityConfigBuilder {
    /// Start from the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the format version
    pub fn version(mut self, version: u32) -> Self {
        self.config.version = version;
        self
    }

    /// Set data and hash block sizes
    pub fn block_sizes(mut self, data_block_size: u32, hash_block_size: u32) -> Self {
        self.config.data_block_size = data_block_size;
        self.config.hash_block_size = hash_block_size;
        self
    }

    /// Set the number of data blocks
    pub fn data_block_count(mut self, count: u64) -> Self {
        self.config.data_block_count = count;
        self
    }

    /// Set the first hash-region block of the tree
    pub fn hash_start_block(mut self, block: u64) -> Self {
        self.config.hash_start_block = block;
        self
    }

    /// Set the digest algorithm
    pub fn algorithm(mut self, name: impl Into<String>) -> Self {
        self.config.algorithm = name.into();
        self
    }

    /// Set the root digest
    pub fn root_digest(mut self, digest: Vec<u8>) -> Self {
        self.config.root_digest = digest;
        self
    }

    /// Set the salt
    pub fn salt(mut self, salt: Vec<u8>) -> Self {
        self.config.salt = Some(salt);
        self
    }

    /// Set the corruption mode
    pub fn corruption_mode(mut self, mode: CorruptionMode) -> Self {
        self.config.corruption_mode = mode;
        self
    }

    /// Enable zero-block synthesis
    pub fn ignore_zero_blocks(mut self, enabled: bool) -> Self {
        self.config.ignore_zero_blocks = enabled;
        self
    }

    /// Set the prefetch cluster in bytes
    pub fn prefetch_cluster_bytes(mut self, bytes: u32) -> Self {
        self.config.prefetch_cluster_bytes = bytes;
        self
    }

    /// Set the cache capacity in hash blocks
    pub fn hash_cache_blocks(mut self, blocks: usize) -> Self {
        self.config.hash_cache_blocks = blocks;
        self
    }

    /// Set the device logical block size
    pub fn logical_block_size(mut self, size: u32) -> Self {
        self.config.logical_block_size = size;
        self
    }

    /// Set the worker count
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = Some(threads);
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<VerityConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Validate the layout only and return the configuration
    ///
    /// For formatting a tree whose root digest is not yet known.
    pub fn build_unrooted(self) -> Result<VerityConfig, ConfigError> {
        self.config.validate_layout()?;
        Ok(self.config)
    }
}
