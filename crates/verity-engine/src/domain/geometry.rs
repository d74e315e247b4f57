//! # Hash Tree Geometry
//!
//! Maps a data block and a tree level to the hash block holding its digest
//! and the byte offset of the digest slot inside that block.
//!
//! ## Layout
//!
//! ```text
//!  hash_start
//!     │
//!     ↓
//!  [ level L-1 ][ level L-2 .......... ][ level 0 ............................ ]
//!     1 block     ceil(n / 2^(L-1)*b)     ceil(n / 2^b) blocks
//! ```
//!
//! `b` is `hash_per_block_bits`. The topmost level is stored first. Its single
//! block is hashed into the root digest.
//!
//! Version 0 packs digests back to back. Version 1 gives each digest a
//! power-of-two slot so slots never straddle alignment boundaries.

use crate::domain::errors::ConfigError;

/// Deepest supported tree.
pub const MAX_LEVELS: u32 = 63;

/// Immutable tree geometry, computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeGeometry {
    version: u32,
    data_block_bits: u32,
    hash_block_bits: u32,
    hash_per_block_bits: u32,
    digest_size: usize,
    data_block_count: u64,
    hash_start: u64,
    levels: u32,
    level_base: Vec<u64>,
    hash_blocks: u64,
}

impl TreeGeometry {
    /// Compute the geometry.
    ///
    /// Block sizes must already be validated powers of two.
    pub fn new(
        version: u32,
        data_block_size: u32,
        hash_block_size: u32,
        digest_size: usize,
        data_block_count: u64,
        hash_start: u64,
    ) -> Result<Self, ConfigError> {
        if digest_size == 0 || digest_size * 2 > hash_block_size as usize {
            return Err(ConfigError::DigestTooLarge {
                digest_size,
                hash_block_size,
            });
        }

        let hash_block_bits = hash_block_size.trailing_zeros();
        let data_block_bits = data_block_size.trailing_zeros();
        let hash_per_block_bits = (hash_block_size as usize / digest_size).ilog2();

        let mut levels = 0u32;
        if data_block_count > 0 {
            while hash_per_block_bits * levels < 64
                && (data_block_count - 1) >> (hash_per_block_bits * levels) != 0
            {
                levels += 1;
            }
        }
        if levels > MAX_LEVELS {
            return Err(ConfigError::TooManyLevels {
                levels,
                max: MAX_LEVELS,
            });
        }

        let mut level_base = vec![0u64; levels as usize];
        let mut hash_position = hash_start;
        for level in (0..levels).rev() {
            level_base[level as usize] = hash_position;
            let blocks = blocks_at_level(data_block_count, level, hash_per_block_bits);
            hash_position = hash_position
                .checked_add(blocks)
                .ok_or(ConfigError::Overflow("Hash region offset"))?;
        }

        Ok(Self {
            version,
            data_block_bits,
            hash_block_bits,
            hash_per_block_bits,
            digest_size,
            data_block_count,
            hash_start,
            levels,
            level_base,
            hash_blocks: hash_position,
        })
    }

    /// Hash position of `block` at `level`.
    ///
    /// The low `hash_per_block_bits` bits select the slot inside a hash
    /// block, the rest select the block within the level.
    pub fn position_at_level(&self, block: u64, level: u32) -> u64 {
        let shift = level * self.hash_per_block_bits;
        if shift >= 64 {
            0
        } else {
            block >> shift
        }
    }

    /// Hash-block address and slot offset for `block` at `level`.
    pub fn hash_block_and_offset(&self, block: u64, level: u32) -> (u64, usize) {
        let position = self.position_at_level(block, level);
        let address = self.level_base[level as usize] + (position >> self.hash_per_block_bits);
        let index = position & ((1u64 << self.hash_per_block_bits) - 1);
        (address, self.slot_offset(index))
    }

    /// Hash-block address only.
    pub fn hash_block_address(&self, block: u64, level: u32) -> u64 {
        let position = self.position_at_level(block, level);
        self.level_base[level as usize] + (position >> self.hash_per_block_bits)
    }

    /// Byte offset of slot `index` inside a hash block.
    pub fn slot_offset(&self, index: u64) -> usize {
        if self.version == 0 {
            index as usize * self.digest_size
        } else {
            (index << (self.hash_block_bits - self.hash_per_block_bits)) as usize
        }
    }

    /// Bytes between consecutive slots.
    pub fn slot_size(&self) -> usize {
        self.slot_offset(1)
    }

    /// Hash blocks occupied by `level`.
    pub fn level_block_count(&self, level: u32) -> u64 {
        blocks_at_level(self.data_block_count, level, self.hash_per_block_bits)
    }

    /// First hash block of `level`.
    pub fn level_base(&self, level: u32) -> u64 {
        self.level_base[level as usize]
    }

    /// Tree depth below the root digest.
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// log2 of digests per hash block.
    pub fn hash_per_block_bits(&self) -> u32 {
        self.hash_per_block_bits
    }

    /// One past the last hash block used.
    pub fn hash_blocks(&self) -> u64 {
        self.hash_blocks
    }

    /// First hash block of the tree.
    pub fn hash_start(&self) -> u64 {
        self.hash_start
    }

    /// Format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Digest size in bytes.
    pub fn digest_size(&self) -> usize {
        self.digest_size
    }

    /// Data blocks covered.
    pub fn data_block_count(&self) -> u64 {
        self.data_block_count
    }

    /// log2 of the data block size.
    pub fn data_block_bits(&self) -> u32 {
        self.data_block_bits
    }

    /// Data block size in bytes.
    pub fn data_block_size(&self) -> usize {
        1usize << self.data_block_bits
    }

    /// log2 of the hash block size.
    pub fn hash_block_bits(&self) -> u32 {
        self.hash_block_bits
    }

    /// Hash block size in bytes.
    pub fn hash_block_size(&self) -> usize {
        1usize << self.hash_block_bits
    }
}

/// `ceil(n / 2^((level+1) * bits))`, widened so the top shift cannot overflow.
fn blocks_at_level(data_block_count: u64, level: u32, hash_per_block_bits: u32) -> u64 {
    let shift = (level + 1) * hash_per_block_bits;
    let n = data_block_count as u128;
    if shift >= 128 {
        return u64::from(n > 0);
    }
    ((n + (1u128 << shift) - 1) >> shift) as u64
}
