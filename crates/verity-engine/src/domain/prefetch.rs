//! # Hash Prefetch Planning
//!
//! For a read of `count` data blocks, computes the hash-block ranges that
//! will be needed, level by level from just below the top down to the leaves.
//! The top hash block is left out since it stays resident once read.
//!
//! Leaf ranges are widened to the prefetch cluster so that sequential reads
//! pull hash blocks in large batches.

use crate::domain::geometry::TreeGeometry;

/// A contiguous hash-block range to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchRange {
    /// Tree level
    pub level: u32,
    /// First hash-block address
    pub start: u64,
    /// Number of blocks
    pub count: u64,
}

/// Prefetch range planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefetcher {
    cluster_blocks: u64,
}

impl Prefetcher {
    /// Planner for a cluster of `cluster_bytes`, measured against data blocks.
    ///
    /// The cluster is rounded down to a power-of-two block count. Zero
    /// disables clustering.
    pub fn new(cluster_bytes: u32, data_block_bits: u32) -> Self {
        let cluster = (cluster_bytes as u64) >> data_block_bits;
        let cluster_blocks = if cluster == 0 {
            0
        } else {
            1u64 << cluster.ilog2()
        };
        Self { cluster_blocks }
    }

    /// Leaf-level alignment in hash blocks (0 = none).
    pub fn cluster_blocks(&self) -> u64 {
        self.cluster_blocks
    }

    /// Ranges for a read of `count` blocks starting at `block`.
    pub fn plan(&self, geometry: &TreeGeometry, block: u64, count: u64) -> Vec<PrefetchRange> {
        let levels = geometry.levels();
        if count == 0 || levels < 2 {
            return Vec::new();
        }
        let last = block + count - 1;

        (0..levels - 1)
            .rev()
            .map(|level| {
                let mut start = geometry.hash_block_address(block, level);
                let mut end = geometry.hash_block_address(last, level);
                if level == 0 && self.cluster_blocks > 0 {
                    start &= !(self.cluster_blocks - 1);
                    end |= self.cluster_blocks - 1;
                    end = end.min(geometry.hash_blocks() - 1);
                }
                PrefetchRange {
                    level,
                    start,
                    count: end - start + 1,
                }
            })
            .collect()
    }
}
