//! # Salted Hasher
//!
//! Every node of the tree is `H(salt ∥ data)` for format version 1 and
//! `H(data ∥ salt)` for version 0.
//!
//! Two backends compute the same function: the primary (possibly
//! hardware-offloaded) and the fallback (software). A primary mismatch
//! that the fallback resolves points at the primary path, not at the data.

use crate::domain::errors::ConfigError;
use std::sync::Arc;
use verity_crypto::{Digest, DigestAlgorithm, DigestBackend, DigestContext};

/// Digest implementation selected for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashMode {
    /// First attempt
    Primary,
    /// Retry after a primary mismatch
    Fallback,
}

/// Salted digest computation over two interchangeable backends.
pub struct VerityHasher {
    algorithm: DigestAlgorithm,
    version: u32,
    salt: Vec<u8>,
    primary: Arc<dyn DigestBackend>,
    fallback: Arc<dyn DigestBackend>,
}

impl VerityHasher {
    /// Create a hasher; both backends must support `algorithm`.
    pub fn new(
        algorithm: DigestAlgorithm,
        version: u32,
        salt: Vec<u8>,
        primary: Arc<dyn DigestBackend>,
        fallback: Arc<dyn DigestBackend>,
    ) -> Result<Self, ConfigError> {
        for backend in [&primary, &fallback] {
            if !backend.supports(algorithm) {
                return Err(ConfigError::UnsupportedBackend {
                    backend: backend.name().to_string(),
                    algorithm: algorithm.name(),
                });
            }
        }
        Ok(Self {
            algorithm,
            version,
            salt,
            primary,
            fallback,
        })
    }

    /// Start a streaming digest.
    pub fn begin(&self, mode: HashMode) -> HashStream<'_> {
        let backend = match mode {
            HashMode::Primary => &self.primary,
            HashMode::Fallback => &self.fallback,
        };
        let mut ctx = backend.begin(self.algorithm);
        let trailing_salt = if self.version >= 1 {
            ctx.update(&self.salt);
            None
        } else {
            Some(self.salt.as_slice())
        };
        HashStream { ctx, trailing_salt }
    }

    /// Digest of one contiguous buffer.
    pub fn digest(&self, mode: HashMode, data: &[u8]) -> Digest {
        let mut stream = self.begin(mode);
        stream.update(data);
        stream.finish()
    }

    /// Digest of an all-zero block of `block_size` bytes.
    pub fn zero_digest(&self, block_size: usize) -> Digest {
        self.digest(HashMode::Primary, &vec![0u8; block_size])
    }

    /// Configured algorithm.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Digest size in bytes.
    pub fn digest_size(&self) -> usize {
        self.algorithm.output_size()
    }

    /// Backend names, primary first.
    pub fn backend_names(&self) -> (&str, &str) {
        (self.primary.name(), self.fallback.name())
    }
}

/// A digest in progress, salted per the format version.
pub struct HashStream<'h> {
    ctx: Box<dyn DigestContext>,
    trailing_salt: Option<&'h [u8]>,
}

impl HashStream<'_> {
    /// Absorb more data.
    pub fn update(&mut self, data: &[u8]) {
        self.ctx.update(data);
    }

    /// Finish, appending the salt for version 0.
    pub fn finish(mut self) -> Digest {
        if let Some(salt) = self.trailing_salt {
            self.ctx.update(salt);
        }
        self.ctx.finalize()
    }
}
