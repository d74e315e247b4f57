//! # Verifier
//!
//! Validates the hash chain from the root digest down to a data block's leaf
//! digest, then the data block itself.
//!
//! ## Attempt State Machine
//!
//! ```text
//!  Init ──✗──→ PrimaryMismatch ──→ FallbackAttempted ──✗──→ FecAttempted ──→ PolicyInvoked
//!   │ ✓                               │ ✓                    ↑ ✓ (repaired)
//!   └──→ verified                     └──→ verified + soft-mismatch event
//! ```
//!
//! Each transition happens at most once per block and level, so a block
//! gets at most one fallback digest and one FEC attempt.

use crate::domain::cache::{HashBlock, HashBlockCache};
use crate::domain::entities::BlockKind;
use crate::domain::errors::VerityError;
use crate::domain::geometry::TreeGeometry;
use crate::domain::hasher::{HashMode, VerityHasher};
use crate::domain::policy::{CorruptionPolicy, PolicyDecision};
use crate::domain::segments::{IoSegments, SegmentCursor};
use crate::metrics::VerityMetrics;
use crate::ports::outbound::{BlockRegion, FecDecoder};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use verity_crypto::Digest;


/// Progress of one block's verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AttemptState {
    /// Nothing tried yet
    Init,
    /// Primary digest did not match
    PrimaryMismatch,
    /// Fallback digest computed
    FallbackAttempted,
    /// FEC tried (or unavailable)
    FecAttempted,
    /// Corruption policy consulted
    PolicyInvoked,
}

/// Result of `verify_level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelOutcome {
    /// Digest for the next lower level (or the data block)
    Resolved(Digest),
    /// Hash block not yet verified and the caller asked to skip it
    Unresolved,
}

/// Leaf digest of a data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLeaf {
    /// Expected digest of the block content
    pub digest: Digest,
    /// Leaf equals the zero-block digest
    pub is_zero: bool,
}

/// How content was accepted.
enum Verdict {
    Matched,
    MatchedOnFallback,
    Corrected(Vec<u8>),
    Tolerated,
}

struct VerificationContext<'w> {
    kind: BlockKind,
    block: u64,
    want: &'w Digest,
    state: AttemptState,
}

impl<'w> VerificationContext<'w> {
    fn new(kind: BlockKind, block: u64, want: &'w Digest) -> Self {
        Self {
            kind,
            block,
            want,
            state: AttemptState::Init,
        }
    }

    fn advance(&mut self, next: AttemptState) {
        debug_assert!(next > self.state, "attempt state must move forward");
        self.state = next;
    }
}

/// Everything a `Verifier` owns.
pub struct VerifierParts {
    /// Tree geometry
    pub geometry: TreeGeometry,
    /// Salted dual-backend hasher
    pub hasher: VerityHasher,
    /// Hash block cache
    pub cache: HashBlockCache,
    /// Hash region
    pub hash_region: Arc<dyn BlockRegion>,
    /// Error-correction decoder
    pub fec: Arc<dyn FecDecoder>,
    /// Corruption response
    pub policy: CorruptionPolicy,
    /// Counters
    pub metrics: Arc<VerityMetrics>,
    /// Trusted root digest
    pub root_digest: Digest,
    /// Digest of an all-zero data block, when zero synthesis is enabled
    pub zero_digest: Option<Digest>,
}

/// Hash-chain and data-block verifier.
pub struct Verifier {
    geometry: TreeGeometry,
    hasher: VerityHasher,
    cache: HashBlockCache,
    hash_region: Arc<dyn BlockRegion>,
    fec: Arc<dyn FecDecoder>,
    policy: CorruptionPolicy,
    metrics: Arc<VerityMetrics>,
    root_digest: Digest,
    zero_digest: Option<Digest>,
}

impl Verifier {
    /// Assemble a verifier.
    pub fn new(parts: VerifierParts) -> Self {
        Self {
            geometry: parts.geometry,
            hasher: parts.hasher,
            cache: parts.cache,
            hash_region: parts.hash_region,
            fec: parts.fec,
            policy: parts.policy,
            metrics: parts.metrics,
            root_digest: parts.root_digest,
            zero_digest: parts.zero_digest,
        }
    }

    // =========================================================================
    // Hash chain
    // =========================================================================

    /// Verify the hash block holding `block`'s digest at `level` against
    /// `want` and return the digest slot.
    pub fn verify_level(
        &self,
        block: u64,
        level: u32,
        skip_unverified: bool,
        want: &Digest,
    ) -> Result<LevelOutcome, VerityError> {
        let (address, offset) = self.geometry.hash_block_and_offset(block, level);
        let mut entry = self.cache.fetch(self.hash_region.as_ref(), address)?;

        if !entry.is_verified() {
            if skip_unverified {
                return Ok(LevelOutcome::Unresolved);
            }
            entry = self.verify_hash_block(entry, want)?;
        }

        let slot = entry.digest_at(offset, self.geometry.digest_size());
        Ok(LevelOutcome::Resolved(Digest::from(slot)))
    }

    /// Leaf digest for `block`, walking from the root when the leaf hash
    /// block is not yet verified.
    pub fn resolve_digest_chain(&self, block: u64) -> Result<ResolvedLeaf, VerityError> {
        let levels = self.geometry.levels();
        let mut digest = None;

        if levels > 0 {
            if let LevelOutcome::Resolved(leaf) = self.verify_level(block, 0, true, &self.root_digest)? {
                digest = Some(leaf);
            }
        }

        let digest = match digest {
            Some(leaf) => leaf,
            None => {
                let mut want = self.root_digest.clone();
                for level in (0..levels).rev() {
                    // Never unresolved when not skipping.
                    if let LevelOutcome::Resolved(next) = self.verify_level(block, level, false, &want)? {
                        want = next;
                    }
                }
                want
            }
        };

        let is_zero = self.zero_digest.as_ref().is_some_and(|zero| *zero == digest);
        Ok(ResolvedLeaf { digest, is_zero })
    }

    fn verify_hash_block(&self, entry: Arc<HashBlock>, want: &Digest) -> Result<Arc<HashBlock>, VerityError> {
        let address = entry.address();
        let mut ctx = VerificationContext::new(BlockKind::Metadata, address, want);
        let verdict = self.run_attempts(
            &mut ctx,
            |mode| self.hasher.digest(mode, entry.content()),
            || entry.content().to_vec(),
        )?;

        Ok(match verdict {
            Verdict::Matched | Verdict::MatchedOnFallback => {
                entry.mark_verified();
                self.metrics.record_hash_verified();
                entry
            }
            Verdict::Corrected(content) => {
                self.metrics.record_hash_verified();
                self.cache.replace_verified(address, content)
            }
            // Best effort: the slot is served from unverified content.
            Verdict::Tolerated => entry,
        })
    }

    // =========================================================================
    // Data blocks
    // =========================================================================

    /// Verify one data block whose content sits in `segments` at `at`.
    ///
    /// Zero blocks are overwritten with zeros without hashing.
    pub fn verify_block(
        &self,
        block: u64,
        segments: &mut IoSegments<'_>,
        at: SegmentCursor,
    ) -> Result<(), VerityError> {
        let leaf = self.resolve_digest_chain(block)?;
        if leaf.is_zero {
            self.fill_zero(segments, at);
            return Ok(());
        }
        self.verify_data(block, &leaf, segments, at)
    }

    /// Write a zero block at `at`.
    pub fn fill_zero(&self, segments: &mut IoSegments<'_>, at: SegmentCursor) {
        segments.fill(at, self.geometry.data_block_size(), 0);
        self.metrics.record_zero_block();
    }

    /// Check data content against a resolved leaf digest.
    ///
    /// FEC-repaired content is written back at `at`. Content tolerated by
    /// the policy is left as read.
    pub fn verify_data(
        &self,
        block: u64,
        leaf: &ResolvedLeaf,
        segments: &mut IoSegments<'_>,
        at: SegmentCursor,
    ) -> Result<(), VerityError> {
        let len = self.geometry.data_block_size();
        let mut ctx = VerificationContext::new(BlockKind::Data, block, &leaf.digest);

        let verdict = {
            let view: &IoSegments<'_> = segments;
            self.run_attempts(
                &mut ctx,
                |mode| {
                    // Each attempt re-reads from the block's start position.
                    let mut stream = self.hasher.begin(mode);
                    for chunk in view.chunks(at, len) {
                        stream.update(chunk);
                    }
                    stream.finish()
                },
                || view.read(at, len),
            )?
        };

        match verdict {
            Verdict::Matched | Verdict::MatchedOnFallback => self.metrics.record_data_verified(),
            Verdict::Corrected(content) => {
                segments.write(at, &content);
                self.metrics.record_data_verified();
            }
            Verdict::Tolerated => {}
        }
        Ok(())
    }

    // =========================================================================
    // Retry, FEC, policy
    // =========================================================================

    fn run_attempts<D, R>(
        &self,
        ctx: &mut VerificationContext<'_>,
        digest_with: D,
        original: R,
    ) -> Result<Verdict, VerityError>
    where
        D: Fn(HashMode) -> Digest,
        R: FnOnce() -> Vec<u8>,
    {
        if digest_with(HashMode::Primary) == *ctx.want {
            return Ok(Verdict::Matched);
        }
        ctx.advance(AttemptState::PrimaryMismatch);
        debug!(kind = %ctx.kind, block = ctx.block, "primary digest mismatch, retrying with fallback");

        let fallback = digest_with(HashMode::Fallback);
        ctx.advance(AttemptState::FallbackAttempted);
        if fallback == *ctx.want {
            self.metrics.record_soft_mismatch();
            self.policy.report_soft_mismatch(ctx.kind, ctx.block);
            return Ok(Verdict::MatchedOnFallback);
        }

        let corrected = self.try_fec(ctx, original);
        ctx.advance(AttemptState::FecAttempted);
        if let Some(content) = corrected {
            self.metrics.record_fec_correction();
            self.policy.report_fec_corrected(ctx.kind, ctx.block);
            return Ok(Verdict::Corrected(content));
        }

        self.metrics.record_corruption();
        let decision = self.policy.handle(ctx.kind, ctx.block);
        ctx.advance(AttemptState::PolicyInvoked);
        trace!(kind = %ctx.kind, block = ctx.block, state = ?ctx.state, ?decision, "verification attempts exhausted");

        match decision {
            PolicyDecision::Continue => Ok(Verdict::Tolerated),
            PolicyDecision::Fail => Err(VerityError::Corruption {
                kind: ctx.kind,
                block: ctx.block,
            }),
        }
    }

    /// FEC output is accepted only if it hashes to the expected digest.
    fn try_fec<R>(&self, ctx: &VerificationContext<'_>, original: R) -> Option<Vec<u8>>
    where
        R: FnOnce() -> Vec<u8>,
    {
        if !self.fec.is_enabled() {
            return None;
        }
        let original = original();
        match self.fec.correct(ctx.kind, ctx.block, &original) {
            Ok(corrected)
                if corrected.len() == original.len()
                    && self.hasher.digest(HashMode::Primary, &corrected) == *ctx.want =>
            {
                Some(corrected)
            }
            Ok(_) => {
                warn!(kind = %ctx.kind, block = ctx.block, "FEC output does not match expected digest");
                None
            }
            Err(e) => {
                debug!(kind = %ctx.kind, block = ctx.block, error = %e, "FEC failed");
                None
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Tree geometry.
    pub fn geometry(&self) -> &TreeGeometry {
        &self.geometry
    }

    /// Hash block cache.
    pub fn cache(&self) -> &HashBlockCache {
        &self.cache
    }

    /// Hash region.
    pub fn hash_region(&self) -> &dyn BlockRegion {
        self.hash_region.as_ref()
    }

    /// Corruption policy.
    pub fn policy(&self) -> &CorruptionPolicy {
        &self.policy
    }

    /// Hasher.
    pub fn hasher(&self) -> &VerityHasher {
        &self.hasher
    }

    /// Whether FEC is available.
    pub fn fec_enabled(&self) -> bool {
        self.fec.is_enabled()
    }

    /// Counters.
    pub fn metrics(&self) -> &VerityMetrics {
        &self.metrics
    }

    /// Trusted root digest.
    pub fn root_digest(&self) -> &Digest {
        &self.root_digest
    }
}
