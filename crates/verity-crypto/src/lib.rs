//! # Verity Crypto - Digest Primitives
//!
//! Salted block hashing for the verity engine is built on the pieces in this
//! crate.
//!
//! ## Components
//!
//! | Module | Contents | Use Case |
//! |--------|----------|----------|
//! | `algorithm` | `DigestAlgorithm` | Name lookup, output sizes |
//! | `backend` | `DigestBackend`, `DigestContext`, `SoftwareBackend` | Interchangeable digest implementations |
//! | `hashing` | `Digest` | Owned digest value, constant-time comparison |
//!
//! ## Backends
//!
//! A verity engine hashes through two backends, a primary and a fallback, that
//! must produce bit-identical output. `SoftwareBackend` wraps the RustCrypto
//! hashers and BLAKE3; both dispatch to CPU extensions (SHA-NI, AVX2, NEON)
//! when the running CPU has them. Offload engines plug in by implementing
//! `DigestBackend`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod backend;
pub mod errors;
pub mod hashing;

// Re-exports
pub use algorithm::DigestAlgorithm;
pub use backend::{DigestBackend, DigestContext, SoftwareBackend};
pub use errors::CryptoError;
pub use hashing::{digest_parts, Digest};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
