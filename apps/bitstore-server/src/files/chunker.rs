//! Fixed-size chunking
//!
//! Chunk `i` covers bytes `[i * chunk_size, min((i + 1) * chunk_size, len))`.
//! Boundaries depend only on length, not content, so inserting a byte near
//! the start of a file changes the digest of every later chunk.

use bytes::Bytes;

/// One slice of a file, in upload order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub offset: u64,
    pub data: Bytes,
}

/// Splits files into fixed-size chunks
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
}

impl Chunker {
    /// Create a chunker. A zero chunk size is bumped to one byte.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks a file of `len` bytes produces
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Split `data` into chunks. Slices share the original buffer.
    /// Empty input yields no chunks.
    pub fn split(&self, data: &Bytes) -> Vec<Chunk> {
        (0..self.chunk_count(data.len()))
            .map(|index| {
                let start = index * self.chunk_size;
                let end = (start + self.chunk_size).min(data.len());
                Chunk {
                    index,
                    offset: start as u64,
                    data: data.slice(start..end),
                }
            })
            .collect()
    }
}
