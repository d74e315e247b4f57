//! # Domain Entities
//!
//! Small value types shared by the verifier, the policy and the service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which region a failing block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Block of the data region
    Data,
    /// Hash-tree block of the hash region
    Metadata,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Data => f.write_str("data"),
            BlockKind::Metadata => f.write_str("metadata"),
        }
    }
}

/// Device-level integrity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerityStatus {
    /// No corruption seen since construction
    Valid,
    /// At least one block failed verification
    Corrupted,
}

impl VerityStatus {
    /// Single-character status: `V` or `C`.
    pub fn as_char(&self) -> char {
        match self {
            VerityStatus::Valid => 'V',
            VerityStatus::Corrupted => 'C',
        }
    }
}

impl fmt::Display for VerityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Shared abort signal for an in-flight request.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A read of `count` contiguous data blocks starting at `block`.
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// First data block index
    pub block: u64,
    /// Number of blocks
    pub count: u64,
    /// Abort signal
    pub cancel: CancellationFlag,
}

impl ReadRequest {
    /// New request with its own cancellation flag.
    pub fn new(block: u64, count: u64) -> Self {
        Self {
            block,
            count,
            cancel: CancellationFlag::new(),
        }
    }

    /// Attach an existing cancellation flag.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }
}
