//! Crypto error types.

use thiserror::Error;

/// Digest setup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Algorithm name not recognised
    #[error("Unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Backend cannot compute the requested algorithm
    #[error("Backend {backend} does not support {algorithm}")]
    UnsupportedAlgorithm {
        /// Backend name
        backend: String,
        /// Algorithm name
        algorithm: &'static str,
    },
}
