//! # Hash Block Cache
//!
//! Resident hash-tree blocks, each with a one-way `verified` flag.
//!
//! ## Concurrency
//!
//! - The flag is an `AtomicBool` that only ever receives `true`. Two tasks
//!   may verify the same block and both store it; the result is identical.
//! - A miss reads outside the lock and inserts only if the address is still
//!   absent, so a racing miss can never replace an entry that was verified
//!   in the meantime.
//! - The mutex guards LRU bookkeeping only. Flags are never touched under it.
//! - Entry content is immutable. FEC repair installs a fresh entry.

use crate::domain::errors::RegionError;
use crate::ports::outbound::BlockRegion;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One hash-tree block and its verified flag.
#[derive(Debug)]
pub struct HashBlock {
    address: u64,
    content: Box<[u8]>,
    verified: AtomicBool,
}

impl HashBlock {
    /// Freshly read block, not yet verified.
    pub fn new(address: u64, content: Vec<u8>) -> Self {
        Self {
            address,
            content: content.into_boxed_slice(),
            verified: AtomicBool::new(false),
        }
    }

    /// Block whose content is already known to be correct.
    pub fn new_verified(address: u64, content: Vec<u8>) -> Self {
        Self {
            address,
            content: content.into_boxed_slice(),
            verified: AtomicBool::new(true),
        }
    }

    /// Hash-region address.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Block bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Digest slot at `offset`.
    pub fn digest_at(&self, offset: usize, digest_size: usize) -> &[u8] {
        &self.content[offset..offset + digest_size]
    }

    /// Whether the block matched its parent digest.
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Acquire)
    }

    /// Record a match. Safe to repeat.
    pub fn mark_verified(&self) {
        self.verified.store(true, Ordering::Release);
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups served from memory
    pub hits: u64,
    /// Lookups that read the hash region
    pub misses: u64,
    /// Blocks loaded by prefetch
    pub prefetched: u64,
    /// Entries currently resident
    pub resident: usize,
    /// Maximum resident entries
    pub capacity: usize,
}

/// LRU cache of hash blocks.
pub struct HashBlockCache {
    entries: Mutex<LruCache<u64, Arc<HashBlock>>>,
    capacity: NonZeroUsize,
    hits: AtomicU64,
    misses: AtomicU64,
    prefetched: AtomicU64,
}

impl HashBlockCache {
    /// Cache holding at most `capacity` blocks (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            prefetched: AtomicU64::new(0),
        }
    }

    /// Get the block at `address`, reading it from `region` on a miss.
    pub fn fetch(&self, region: &dyn BlockRegion, address: u64) -> Result<Arc<HashBlock>, RegionError> {
        if let Some(entry) = self.entries.lock().get(&address).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let mut content = vec![0u8; region.block_size()];
        region.read_blocks(address, &mut content)?;
        Ok(self.insert_if_absent(address, content))
    }

    /// Load missing blocks in `[start, start + count)`, best effort.
    ///
    /// Each run of absent addresses is read with one region call. Read
    /// errors are dropped; the verify path will read synchronously.
    /// Returns the number of blocks loaded.
    pub fn prefetch(&self, region: &dyn BlockRegion, start: u64, count: u64) -> u64 {
        let end = start
            .saturating_add(count.min(self.capacity.get() as u64))
            .min(region.block_count());
        if start >= end {
            return 0;
        }

        let runs = {
            let entries = self.entries.lock();
            let mut runs: Vec<(u64, u64)> = Vec::new();
            for address in start..end {
                if entries.contains(&address) {
                    continue;
                }
                match runs.last_mut() {
                    Some((run_start, run_len)) if *run_start + *run_len == address => *run_len += 1,
                    _ => runs.push((address, 1)),
                }
            }
            runs
        };

        let block_size = region.block_size();
        let mut loaded = 0;
        for (run_start, run_len) in runs {
            let mut buf = vec![0u8; block_size * run_len as usize];
            if let Err(e) = region.read_blocks(run_start, &mut buf) {
                debug!(start = run_start, count = run_len, error = %e, "hash prefetch failed");
                continue;
            }
            for (i, chunk) in buf.chunks_exact(block_size).enumerate() {
                self.insert_if_absent(run_start + i as u64, chunk.to_vec());
            }
            loaded += run_len;
        }
        self.prefetched.fetch_add(loaded, Ordering::Relaxed);
        loaded
    }

    /// Install FEC-corrected content as a verified entry.
    pub fn replace_verified(&self, address: u64, content: Vec<u8>) -> Arc<HashBlock> {
        let entry = Arc::new(HashBlock::new_verified(address, content));
        self.entries.lock().put(address, entry.clone());
        entry
    }

    /// Resident entry without touching LRU order.
    pub fn peek(&self, address: u64) -> Option<Arc<HashBlock>> {
        self.entries.lock().peek(&address).cloned()
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            prefetched: self.prefetched.load(Ordering::Relaxed),
            resident: self.entries.lock().len(),
            capacity: self.capacity.get(),
        }
    }

    fn insert_if_absent(&self, address: u64, content: Vec<u8>) -> Arc<HashBlock> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&address) {
            return existing.clone();
        }
        let entry = Arc::new(HashBlock::new(address, content));
        entries.put(address, entry.clone());
        entry
    }
}
