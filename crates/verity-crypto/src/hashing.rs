//! # Digest Values
//!
//! Owned digest bytes compared in constant time.

use crate::algorithm::DigestAlgorithm;
use crate::backend::DigestBackend;
use std::fmt;
use subtle::ConstantTimeEq;

/// Digest output of any supported algorithm.
#[derive(Clone, Default, Eq)]
pub struct Digest {
    bytes: Vec<u8>,
}

impl Digest {
    /// Wrap raw digest bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self::new)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for an empty digest.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Constant-time equality against raw bytes.
    pub fn ct_eq_bytes(&self, other: &[u8]) -> bool {
        self.bytes.len() == other.len() && bool::from(self.bytes.as_slice().ct_eq(other))
    }
}

impl PartialEq for Digest {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq_bytes(&other.bytes)
    }
}

impl From<&[u8]> for Digest {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Digest {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash several inputs in order through one backend.
pub fn digest_parts(backend: &dyn DigestBackend, algorithm: DigestAlgorithm, parts: &[&[u8]]) -> Digest {
    let mut ctx = backend.begin(algorithm);
    for part in parts {
        ctx.update(part);
    }
    ctx.finalize()
}
