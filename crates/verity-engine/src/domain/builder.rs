//! # Hash Tree Builder
//!
//! Formats the hash tree for a data region in the layout `TreeGeometry`
//! describes and returns the root digest.
//!
//! Level 0 holds one digest per data block. Each higher level holds one
//! digest per hash block of the level below. The single top block is hashed
//! into the root. Unused slot bytes and block tails are zero.

use crate::domain::config::VerityConfig;
use crate::domain::errors::{ConfigError, VerityError};
use crate::domain::geometry::TreeGeometry;
use crate::domain::hasher::{HashMode, VerityHasher};
use crate::ports::outbound::BlockRegion;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::info;
use verity_crypto::{Digest, DigestBackend, SoftwareBackend};

/// Data blocks read per batch while hashing level 0.
const READ_BATCH_BLOCKS: u64 = 256;

/// A formatted hash tree.
#[derive(Debug, Clone)]
pub struct BuiltTree {
    /// Root digest to configure the verity target with
    pub root_digest: Digest,
    /// Hash-region block where `tree` starts
    pub hash_start_block: u64,
    /// Hash block size in bytes
    pub hash_block_size: usize,
    /// Tree blocks, top level first
    pub tree: Vec<u8>,
}

impl BuiltTree {
    /// Full hash-region image: `hash_start_block` zero blocks, then the tree.
    pub fn image(&self) -> Vec<u8> {
        let mut image = vec![0u8; self.hash_start_block as usize * self.hash_block_size];
        image.extend_from_slice(&self.tree);
        image
    }

    /// Blocks occupied by the tree.
    pub fn tree_blocks(&self) -> u64 {
        (self.tree.len() / self.hash_block_size) as u64
    }
}

/// Hash tree formatter.
pub struct HashTreeBuilder {
    geometry: TreeGeometry,
    hasher: VerityHasher,
}

impl HashTreeBuilder {
    /// Builder for the layout in `config`; the root digest is ignored.
    pub fn from_config(config: &VerityConfig) -> Result<Self, ConfigError> {
        let algorithm = config.validate_layout()?;
        let geometry = TreeGeometry::new(
            config.version,
            config.data_block_size,
            config.hash_block_size,
            algorithm.output_size(),
            config.data_block_count,
            config.hash_start_block,
        )?;
        let backend: Arc<dyn DigestBackend> = Arc::new(SoftwareBackend::new());
        let hasher = VerityHasher::new(
            algorithm,
            config.version,
            config.salt_bytes().to_vec(),
            backend.clone(),
            backend,
        )?;
        Ok(Self { geometry, hasher })
    }

    /// Geometry of the tree being built.
    pub fn geometry(&self) -> &TreeGeometry {
        &self.geometry
    }

    /// Hash `data` and lay out the tree.
    pub fn build(&self, data: &dyn BlockRegion) -> Result<BuiltTree, VerityError> {
        let geometry = &self.geometry;
        let levels = geometry.levels();
        let count = geometry.data_block_count();
        let data_block_size = geometry.data_block_size();
        let hash_block_size = geometry.hash_block_size();

        if levels == 0 {
            let mut block = vec![0u8; data_block_size * count as usize];
            data.read_blocks(0, &mut block)?;
            return Ok(BuiltTree {
                root_digest: self.hasher.digest(HashMode::Primary, &block),
                hash_start_block: geometry.hash_start(),
                hash_block_size,
                tree: Vec::new(),
            });
        }

        let mut level_bufs: Vec<Vec<u8>> = (0..levels)
            .map(|level| vec![0u8; geometry.level_block_count(level) as usize * hash_block_size])
            .collect();

        let mut start = 0u64;
        while start < count {
            let batch = READ_BATCH_BLOCKS.min(count - start);
            let mut buf = vec![0u8; data_block_size * batch as usize];
            data.read_blocks(start, &mut buf)?;
            let digests: Vec<Digest> = buf
                .par_chunks(data_block_size)
                .map(|block| self.hasher.digest(HashMode::Primary, block))
                .collect();
            for (i, digest) in digests.iter().enumerate() {
                self.write_slot(&mut level_bufs[0], start + i as u64, digest);
            }
            start += batch;
        }

        for level in 1..levels as usize {
            let (lower, upper) = level_bufs.split_at_mut(level);
            let digests: Vec<Digest> = lower[level - 1]
                .par_chunks(hash_block_size)
                .map(|block| self.hasher.digest(HashMode::Primary, block))
                .collect();
            for (position, digest) in digests.iter().enumerate() {
                self.write_slot(&mut upper[0], position as u64, digest);
            }
        }

        let top = &level_bufs[levels as usize - 1];
        let root_digest = self.hasher.digest(HashMode::Primary, &top[..hash_block_size]);

        let mut tree = Vec::with_capacity(level_bufs.iter().map(Vec::len).sum());
        for level in (0..levels as usize).rev() {
            tree.extend_from_slice(&level_bufs[level]);
        }

        info!(
            data_blocks = count,
            levels,
            hash_blocks = tree.len() / hash_block_size,
            root = %root_digest,
            "hash tree built"
        );

        Ok(BuiltTree {
            root_digest,
            hash_start_block: geometry.hash_start(),
            hash_block_size,
            tree,
        })
    }

    fn write_slot(&self, level_buf: &mut [u8], position: u64, digest: &Digest) {
        let bits = self.geometry.hash_per_block_bits();
        let block = (position >> bits) as usize;
        let index = position & ((1u64 << bits) - 1);
        let offset = block * self.geometry.hash_block_size() + self.geometry.slot_offset(index);
        level_buf[offset..offset + digest.len()].copy_from_slice(digest.as_bytes());
    }
}
