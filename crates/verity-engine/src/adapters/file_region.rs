//! File-backed block region.
//!
//! Reads use positioned I/O (`pread`), so one `FileRegion` is shared by all
//! worker threads without a lock. The file is opened read-only.

use crate::domain::errors::RegionError;
use crate::ports::outbound::BlockRegion;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Region over a file or block device, in fixed-size blocks.
#[derive(Debug)]
pub struct FileRegion {
    file: File,
    path: PathBuf,
    block_size: usize,
    block_count: u64,
}

impl FileRegion {
    /// Open `path` read-only. A trailing partial block is not addressable.
    pub fn open<P: AsRef<Path>>(path: P, block_size: usize) -> io::Result<Self> {
        if block_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "block size must be non-zero"));
        }
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let block_count = len / block_size as u64;
        debug!(path = %path.display(), block_size, block_count, "opened block region");
        Ok(Self {
            file,
            path,
            block_size,
            block_count,
        })
    }

    /// Backing path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockRegion for FileRegion {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_blocks(&self, start: u64, buf: &mut [u8]) -> Result<(), RegionError> {
        if buf.len() % self.block_size != 0 {
            return Err(RegionError::BufferLength {
                expected: buf.len() - buf.len() % self.block_size,
                actual: buf.len(),
            });
        }
        let count = (buf.len() / self.block_size) as u64;
        match start.checked_add(count) {
            Some(end) if end <= self.block_count => {}
            _ => {
                return Err(RegionError::OutOfBounds {
                    start,
                    end: start.saturating_add(count),
                    total: self.block_count,
                })
            }
        }

        self.file
            .read_exact_at(buf, start * self.block_size as u64)
            .map_err(|e| RegionError::Io {
                block: start,
                message: e.to_string(),
            })
    }
}
