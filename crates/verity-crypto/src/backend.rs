//! # Digest Backends
//!
//! A backend produces streaming digest contexts for an algorithm. Two
//! backends configured for the same algorithm must return identical output
//! for identical input.

use crate::algorithm::DigestAlgorithm;
use crate::hashing::Digest;
use digest::Digest as _;

/// Streaming digest in progress.
pub trait DigestContext: Send {
    /// Absorb more input.
    fn update(&mut self, data: &[u8]);

    /// Finish and return the digest.
    fn finalize(self: Box<Self>) -> Digest;
}

/// Source of digest contexts.
pub trait DigestBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether this backend can compute `algorithm`.
    fn supports(&self, algorithm: DigestAlgorithm) -> bool;

    /// Start a new digest.
    fn begin(&self, algorithm: DigestAlgorithm) -> Box<dyn DigestContext>;
}

/// Pure software backend over the RustCrypto hashers and BLAKE3.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBackend;

impl SoftwareBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

enum SoftwareContext {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
    Sha3_256(sha3::Sha3_256),
    Blake3(Box<blake3::Hasher>),
}

impl DigestContext for SoftwareContext {
    fn update(&mut self, data: &[u8]) {
        match self {
            SoftwareContext::Sha1(h) => h.update(data),
            SoftwareContext::Sha256(h) => h.update(data),
            SoftwareContext::Sha512(h) => h.update(data),
            SoftwareContext::Sha3_256(h) => h.update(data),
            SoftwareContext::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self: Box<Self>) -> Digest {
        match *self {
            SoftwareContext::Sha1(h) => Digest::new(h.finalize().to_vec()),
            SoftwareContext::Sha256(h) => Digest::new(h.finalize().to_vec()),
            SoftwareContext::Sha512(h) => Digest::new(h.finalize().to_vec()),
            SoftwareContext::Sha3_256(h) => Digest::new(h.finalize().to_vec()),
            SoftwareContext::Blake3(h) => Digest::new(h.finalize().as_bytes().to_vec()),
        }
    }
}

impl DigestBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn supports(&self, _algorithm: DigestAlgorithm) -> bool {
        true
    }

    fn begin(&self, algorithm: DigestAlgorithm) -> Box<dyn DigestContext> {
        let ctx = match algorithm {
            DigestAlgorithm::Sha1 => SoftwareContext::Sha1(sha1::Sha1::new()),
            DigestAlgorithm::Sha256 => SoftwareContext::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha512 => SoftwareContext::Sha512(sha2::Sha512::new()),
            DigestAlgorithm::Sha3_256 => SoftwareContext::Sha3_256(sha3::Sha3_256::new()),
            DigestAlgorithm::Blake3 => SoftwareContext::Blake3(Box::new(blake3::Hasher::new())),
        };
        Box::new(ctx)
    }
}
