//! Inbound Ports (Driving Ports)
//!
//! The API a block layer or file system uses to read through a verity
//! target. Every operation is read-only.

use crate::domain::entities::VerityStatus;
use crate::domain::errors::VerityError;
use crate::domain::segments::IoSegments;

/// Primary block verity API (Driving Port)
pub trait BlockVerityApi: Send + Sync {
    /// Verify content that was already read from the data region
    ///
    /// # Arguments
    /// * `block` - First data block index
    /// * `count` - Number of blocks covered by `segments`
    /// * `segments` - Content of the blocks, possibly split across buffers
    ///
    /// Zero blocks are overwritten with zeros. FEC-repaired blocks are
    /// rewritten in place.
    fn verify_read(&self, block: u64, count: u64, segments: &mut IoSegments<'_>) -> Result<(), VerityError>;

    /// Read and verify `count` blocks starting at `block`
    ///
    /// # Returns
    /// The verified content, `count * data_block_size` bytes
    fn read_blocks(&self, block: u64, count: u64) -> Result<Vec<u8>, VerityError>;

    /// `Corrupted` once any corruption has been seen
    fn status(&self) -> VerityStatus;

    /// Reported corruption events, saturating at 100
    fn corrupted_error_count(&self) -> u32;
}
