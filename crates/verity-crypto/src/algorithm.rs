//! # Digest Algorithms
//!
//! Names accepted in verity tables and their output sizes.

use crate::errors::CryptoError;
use std::fmt;
use std::str::FromStr;

/// Digest algorithm used for every node of a hash tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// SHA-1 (legacy images only)
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
    /// SHA3-256
    Sha3_256,
    /// BLAKE3 with 256-bit output
    Blake3,
}

impl DigestAlgorithm {
    /// All supported algorithms.
    pub const ALL: [DigestAlgorithm; 5] = [
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha512,
        DigestAlgorithm::Sha3_256,
        DigestAlgorithm::Blake3,
    ];

    /// Look up an algorithm by name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self, CryptoError> {
        match name.to_ascii_lowercase().as_str() {
            "sha1" => Ok(DigestAlgorithm::Sha1),
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            "sha3-256" | "sha3_256" => Ok(DigestAlgorithm::Sha3_256),
            "blake3" => Ok(DigestAlgorithm::Blake3),
            _ => Err(CryptoError::UnknownAlgorithm(name.to_string())),
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
            DigestAlgorithm::Sha3_256 => "sha3-256",
            DigestAlgorithm::Blake3 => "blake3",
        }
    }

    /// Output size in bytes.
    pub fn output_size(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sha3_256 | DigestAlgorithm::Blake3 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
