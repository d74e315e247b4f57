//! # I/O Segments
//!
//! A caller's destination buffer split into several segments, like the
//! vectors of a scatter-gather read. One data block may straddle segment
//! boundaries, so blocks are addressed by a `SegmentCursor` and walked
//! chunk by chunk without copying into contiguous memory.

/// Position inside a segment list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentCursor {
    segment: usize,
    offset: usize,
}

/// Borrowed scatter-gather buffer.
pub struct IoSegments<'a> {
    segments: Vec<&'a mut [u8]>,
    total: usize,
}

impl<'a> IoSegments<'a> {
    /// Wrap a list of segments.
    pub fn new(segments: Vec<&'a mut [u8]>) -> Self {
        let total = segments.iter().map(|s| s.len()).sum();
        Self { segments, total }
    }

    /// Wrap one contiguous buffer.
    pub fn single(buffer: &'a mut [u8]) -> Self {
        Self::new(vec![buffer])
    }

    /// Total bytes across all segments.
    pub fn total_len(&self) -> usize {
        self.total
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Cursor at the first byte.
    pub fn start(&self) -> SegmentCursor {
        SegmentCursor::default()
    }

    /// Cursor `len` bytes after `at`.
    pub fn advance(&self, at: SegmentCursor, len: usize) -> SegmentCursor {
        let mut cursor = at;
        let mut remaining = len;
        while remaining > 0 && cursor.segment < self.segments.len() {
            let available = self.segments[cursor.segment].len() - cursor.offset;
            if remaining < available {
                cursor.offset += remaining;
                return cursor;
            }
            remaining -= available;
            cursor.segment += 1;
            cursor.offset = 0;
        }
        cursor
    }

    /// Chunks covering `len` bytes from `at`, in order.
    pub fn chunks(&self, at: SegmentCursor, len: usize) -> Chunks<'_, 'a> {
        Chunks {
            segments: self,
            cursor: at,
            remaining: len,
        }
    }

    /// Copy `len` bytes starting at `at`.
    pub fn read(&self, at: SegmentCursor, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        for chunk in self.chunks(at, len) {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Overwrite bytes starting at `at` with `data`.
    pub fn write(&mut self, at: SegmentCursor, data: &[u8]) {
        let mut cursor = at;
        let mut written = 0;
        while written < data.len() && cursor.segment < self.segments.len() {
            let segment = &mut self.segments[cursor.segment];
            let n = (segment.len() - cursor.offset).min(data.len() - written);
            segment[cursor.offset..cursor.offset + n].copy_from_slice(&data[written..written + n]);
            written += n;
            cursor.offset += n;
            if cursor.offset == segment.len() {
                cursor.segment += 1;
                cursor.offset = 0;
            }
        }
    }

    /// Set `len` bytes starting at `at` to `byte`.
    pub fn fill(&mut self, at: SegmentCursor, len: usize, byte: u8) {
        let mut cursor = at;
        let mut remaining = len;
        while remaining > 0 && cursor.segment < self.segments.len() {
            let segment = &mut self.segments[cursor.segment];
            let n = (segment.len() - cursor.offset).min(remaining);
            segment[cursor.offset..cursor.offset + n].fill(byte);
            remaining -= n;
            cursor.offset += n;
            if cursor.offset == segment.len() {
                cursor.segment += 1;
                cursor.offset = 0;
            }
        }
    }
}

/// Iterator over the chunks of a byte range.
pub struct Chunks<'s, 'a> {
    segments: &'s IoSegments<'a>,
    cursor: SegmentCursor,
    remaining: usize,
}

impl<'s, 'a> Iterator for Chunks<'s, 'a> {
    type Item = &'s [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 && self.cursor.segment < self.segments.segments.len() {
            let segment: &'s [u8] = &self.segments.segments[self.cursor.segment];
            let start = self.cursor.offset;
            let n = (segment.len() - start).min(self.remaining);
            self.remaining -= n;
            self.cursor.offset += n;
            if self.cursor.offset == segment.len() {
                self.cursor.segment += 1;
                self.cursor.offset = 0;
            }
            if n > 0 {
                return Some(&segment[start..start + n]);
            }
        }
        None
    }
}
