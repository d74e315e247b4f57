//! # Verity Target
//!
//! Read-only verified view of a data region.
//!
//! ## Request Flow
//!
//! 1. Range check against `data_block_count`
//! 2. Prefetch plan handed to the worker pool (fire and forget)
//! 3. Per block, in index order: resolve the leaf digest, synthesize zeros
//!    or read the data block, verify
//!
//! Requests submitted with `submit` or `read_many` run on the target's own
//! rayon pool. Blocks of one request are never verified in parallel.

use crate::domain::cache::{CacheStats, HashBlockCache};
use crate::domain::config::VerityConfig;
use crate::domain::entities::{CancellationFlag, ReadRequest, VerityStatus};
use crate::domain::errors::{ConfigError, VerityError};
use crate::domain::geometry::TreeGeometry;
use crate::domain::hasher::VerityHasher;
use crate::domain::policy::CorruptionPolicy;
use crate::domain::prefetch::Prefetcher;
use crate::domain::segments::IoSegments;
use crate::domain::verifier::{Verifier, VerifierParts};
use crate::metrics::{MetricsSnapshot, VerityMetrics};
use crate::ports::inbound::BlockVerityApi;
use crate::ports::outbound::BlockRegion;
use crate::service::dependencies::VerityDependencies;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use verity_crypto::Digest;

/// Verified block device.
pub struct VerityTarget {
    inner: Arc<TargetInner>,
}

struct TargetInner {
    config: VerityConfig,
    verifier: Verifier,
    data_region: Arc<dyn BlockRegion>,
    prefetcher: Prefetcher,
    metrics: Arc<VerityMetrics>,
    pool: ThreadPool,
}

impl VerityTarget {
    /// Validate `config` against the regions and assemble the target.
    ///
    /// Nothing is retained on failure.
    pub fn new(config: VerityConfig, deps: VerityDependencies) -> Result<Self, ConfigError> {
        config.validate()?;
        let algorithm = config.digest_algorithm()?;
        let geometry = TreeGeometry::new(
            config.version,
            config.data_block_size,
            config.hash_block_size,
            algorithm.output_size(),
            config.data_block_count,
            config.hash_start_block,
        )?;

        check_block_size("data", deps.data_region.as_ref(), config.data_block_size)?;
        check_block_size("hash", deps.hash_region.as_ref(), config.hash_block_size)?;
        if deps.data_region.block_count() < config.data_block_count {
            return Err(ConfigError::DataRegionTooSmall {
                required: config.data_block_count,
                available: deps.data_region.block_count(),
            });
        }
        if deps.hash_region.block_count() < geometry.hash_blocks() {
            return Err(ConfigError::HashRegionTooSmall {
                required: geometry.hash_blocks(),
                available: deps.hash_region.block_count(),
            });
        }

        let hasher = VerityHasher::new(
            algorithm,
            config.version,
            config.salt_bytes().to_vec(),
            deps.primary_backend,
            deps.fallback_backend,
        )?;
        let zero_digest = config
            .ignore_zero_blocks
            .then(|| hasher.zero_digest(config.data_block_size as usize));

        let threads = config.effective_worker_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("verity-worker-{i}"))
            .build()
            .map_err(|e| ConfigError::InvalidParameter(format!("worker pool: {e}")))?;

        let metrics = Arc::new(VerityMetrics::new());
        let policy = CorruptionPolicy::new(config.corruption_mode, deps.telemetry, deps.fatal)
            .with_telemetry_interval(deps.telemetry_interval);
        let prefetcher = Prefetcher::new(config.prefetch_cluster_bytes, geometry.data_block_bits());

        info!(
            version = config.version,
            algorithm = %algorithm,
            data_blocks = config.data_block_count,
            levels = geometry.levels(),
            hash_blocks = geometry.hash_blocks(),
            mode = ?config.corruption_mode,
            threads,
            backends = ?hasher.backend_names(),
            "verity target ready"
        );

        let verifier = Verifier::new(VerifierParts {
            geometry,
            hasher,
            cache: HashBlockCache::new(config.hash_cache_blocks),
            hash_region: deps.hash_region,
            fec: deps.fec,
            policy,
            metrics: metrics.clone(),
            root_digest: Digest::from(config.root_digest.clone()),
            zero_digest,
        });

        Ok(Self {
            inner: Arc::new(TargetInner {
                config,
                verifier,
                data_region: deps.data_region,
                prefetcher,
                metrics,
                pool,
            }),
        })
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Run `request` on the worker pool and hand the result to `completion`.
    ///
    /// A request cancelled before it finishes completes with
    /// `VerityError::Cancelled` and its content is discarded.
    pub fn submit<F>(&self, request: ReadRequest, completion: F)
    where
        F: FnOnce(Result<Vec<u8>, VerityError>) + Send + 'static,
    {
        let inner = self.inner.clone();
        self.inner.pool.spawn(move || {
            let result = inner.run_request(&request);
            completion(result);
        });
    }

    /// Run several requests in parallel, one task each.
    pub fn read_many(&self, requests: &[ReadRequest]) -> Vec<Result<Vec<u8>, VerityError>> {
        let inner = &self.inner;
        inner
            .pool
            .install(|| requests.par_iter().map(|request| inner.run_request(request)).collect())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Counters, including the hash cache.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot(self.cache_stats())
    }

    /// Hash cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.inner.verifier.cache().stats()
    }

    /// Tree geometry.
    pub fn geometry(&self) -> &TreeGeometry {
        self.inner.verifier.geometry()
    }

    /// Active configuration.
    pub fn config(&self) -> &VerityConfig {
        &self.inner.config
    }

    /// Trusted root digest.
    pub fn root_digest(&self) -> &Digest {
        self.inner.verifier.root_digest()
    }
}

impl BlockVerityApi for VerityTarget {
    fn verify_read(&self, block: u64, count: u64, segments: &mut IoSegments<'_>) -> Result<(), VerityError> {
        let started = Instant::now();
        let result = self.inner.verify_segments(block, count, segments);
        self.inner.metrics.record_request(started.elapsed(), result.is_ok());
        result
    }

    fn read_blocks(&self, block: u64, count: u64) -> Result<Vec<u8>, VerityError> {
        let started = Instant::now();
        let result = self.inner.read_range(block, count, None);
        self.inner.metrics.record_request(started.elapsed(), result.is_ok());
        result
    }

    fn status(&self) -> VerityStatus {
        self.inner.verifier.policy().status()
    }

    fn corrupted_error_count(&self) -> u32 {
        self.inner.verifier.policy().corrupted_error_count()
    }
}

impl TargetInner {
    fn run_request(self: &Arc<Self>, request: &ReadRequest) -> Result<Vec<u8>, VerityError> {
        let started = Instant::now();
        let result = match self.read_range(request.block, request.count, Some(&request.cancel)) {
            Ok(_) if request.cancel.is_cancelled() => Err(VerityError::Cancelled),
            other => other,
        };
        self.metrics.record_request(started.elapsed(), result.is_ok());
        result
    }

    fn check_range(&self, block: u64, count: u64) -> Result<(), VerityError> {
        let total = self.config.data_block_count;
        match block.checked_add(count) {
            Some(end) if end <= total => Ok(()),
            _ => Err(VerityError::OutOfRange { block, count, total }),
        }
    }

    fn verify_segments(
        self: &Arc<Self>,
        block: u64,
        count: u64,
        segments: &mut IoSegments<'_>,
    ) -> Result<(), VerityError> {
        self.check_range(block, count)?;
        let block_size = self.config.data_block_size as usize;
        let expected = count as usize * block_size;
        if segments.total_len() != expected {
            return Err(VerityError::BufferSizeMismatch {
                expected,
                actual: segments.total_len(),
            });
        }
        self.spawn_prefetch(block, count);

        let mut at = segments.start();
        for index in block..block + count {
            self.verifier.verify_block(index, segments, at)?;
            at = segments.advance(at, block_size);
        }
        Ok(())
    }

    fn read_range(
        self: &Arc<Self>,
        block: u64,
        count: u64,
        cancel: Option<&CancellationFlag>,
    ) -> Result<Vec<u8>, VerityError> {
        self.check_range(block, count)?;
        self.spawn_prefetch(block, count);

        let block_size = self.config.data_block_size as usize;
        let mut content = vec![0u8; count as usize * block_size];
        for (index, buf) in (block..block + count).zip(content.chunks_exact_mut(block_size)) {
            if cancel.is_some_and(CancellationFlag::is_cancelled) {
                debug!(block = index, "request cancelled");
                return Err(VerityError::Cancelled);
            }

            let leaf = self.verifier.resolve_digest_chain(index)?;
            if leaf.is_zero {
                let mut segments = IoSegments::single(buf);
                let at = segments.start();
                self.verifier.fill_zero(&mut segments, at);
                continue;
            }

            if let Err(e) = self.data_region.read_blocks(index, buf) {
                if !self.verifier.fec_enabled() {
                    return Err(e.into());
                }
                // FEC reconstructs from parity; the read content is unused.
                warn!(block = index, error = %e, "data read failed, attempting FEC");
                buf.fill(0);
            }

            let mut segments = IoSegments::single(buf);
            let at = segments.start();
            self.verifier.verify_data(index, &leaf, &mut segments, at)?;
        }
        Ok(content)
    }

    fn spawn_prefetch(self: &Arc<Self>, block: u64, count: u64) {
        let plan = self.prefetcher.plan(self.verifier.geometry(), block, count);
        if plan.is_empty() {
            return;
        }
        self.metrics.record_prefetch();
        let inner = self.clone();
        self.pool.spawn(move || {
            let cache = inner.verifier.cache();
            let region = inner.verifier.hash_region();
            for range in plan {
                let loaded = cache.prefetch(region, range.start, range.count);
                debug!(level = range.level, start = range.start, count = range.count, loaded, "hash prefetch");
            }
        });
    }
}

fn check_block_size(region: &'static str, device: &dyn BlockRegion, expected: u32) -> Result<(), ConfigError> {
    if device.block_size() != expected as usize {
        return Err(ConfigError::RegionBlockSizeMismatch {
            region,
            expected: expected as usize,
            actual: device.block_size(),
        });
    }
    Ok(())
}
