// rust/packed-data/src/dataset/window.rs

//! The set of chunks an iterator holds in memory at once.

use bytes::Bytes;

use crate::error::{DataError, Result};
use crate::format::{parse_chunk, Dtype, PackedHeader};
use crate::storage::ByteFetcher;

use super::traits::Sample;

/// Payload of one loaded chunk file.
#[derive(Debug, Clone)]
pub struct ChunkBuffer {
    pub path: String,
    pub payload: Bytes,
}

/// `n_chunks` decoded chunk payloads sharing one dtype and element count.
///
/// A window is built in one piece by [`ChunkWindow::load`] and never mutated
/// afterwards; an iterator moving on drops the whole window before loading
/// the next one.
#[derive(Debug)]
pub struct ChunkWindow {
    chunks: Vec<ChunkBuffer>,
    dtype: Dtype,
    chunk_len: u64,
    block_size: usize,
    n_blocks: usize,
}

impl ChunkWindow {
    /// Fetches and parses every file in `files` into a new window.
    ///
    /// The first chunk fixes the window's dtype and element count; every
    /// later chunk must declare the same values.
    ///
    /// # Errors
    ///
    /// - [`DataError::Storage`] if a fetch fails.
    /// - [`DataError::Format`] if a header is malformed, a payload is
    ///   truncated, or a chunk disagrees with the first one.
    /// - [`DataError::Dataset`] if a chunk holds fewer than `block_size`
    ///   elements, or `files` is empty.
    pub fn load(
        fetcher: &dyn ByteFetcher,
        bucket: &str,
        files: &[String],
        block_size: usize,
    ) -> Result<Self> {
        let mut chunks = Vec::with_capacity(files.len());
        let mut locked: Option<PackedHeader> = None;

        for path in files {
            let bytes = fetcher.fetch(bucket, path)?;
            let (header, payload) = parse_chunk(path, bytes)?;

            match locked {
                None => locked = Some(header),
                Some(first) if first != header => {
                    return Err(DataError::format(
                        path.as_str(),
                        format!(
                            "chunk declares {} {} elements but the window holds {} {} elements",
                            header.chunk_len, header.dtype, first.chunk_len, first.dtype
                        ),
                    ));
                }
                Some(_) => {}
            }

            chunks.push(ChunkBuffer {
                path: path.clone(),
                payload,
            });
        }

        let header = locked.ok_or_else(|| {
            DataError::dataset(bucket, "cannot build a chunk window from zero files")
        })?;

        // Elements past the last whole block of each chunk are never served
        let n_blocks = usize::try_from(header.chunk_len / block_size as u64).unwrap_or(usize::MAX);
        if n_blocks == 0 {
            return Err(DataError::dataset(
                chunks[0].path.as_str(),
                format!(
                    "chunk holds {} elements, fewer than block_size {block_size}",
                    header.chunk_len
                ),
            ));
        }

        Ok(Self {
            chunks,
            dtype: header.dtype,
            chunk_len: header.chunk_len,
            block_size,
            n_blocks,
        })
    }

    /// Decodes block `block_idx` of the window, widened to `i64`.
    ///
    /// Block `b` lives in chunk `b / n_blocks` at element offset
    /// `(b % n_blocks) * block_size`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Dataset`] if `block_idx >= total_blocks()`.
    pub fn block(&self, block_idx: usize) -> Result<Sample> {
        let chunk_id = block_idx / self.n_blocks;
        let chunk = self.chunks.get(chunk_id).ok_or_else(|| {
            DataError::dataset(
                "window",
                format!("block {block_idx} out of range ({} blocks)", self.total_blocks()),
            )
        })?;

        let itemsize = self.dtype.itemsize();
        let elem_offset = (block_idx % self.n_blocks) * self.block_size;
        let start = elem_offset * itemsize;
        let end = start + self.block_size * itemsize;

        let mut sample = Vec::with_capacity(self.block_size);
        self.dtype.widen(&chunk.payload[start..end], &mut sample);
        Ok(sample)
    }

    /// Number of chunks in the window.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Element count shared by every chunk.
    pub fn chunk_len(&self) -> u64 {
        self.chunk_len
    }

    /// Whole blocks per chunk.
    pub fn n_blocks(&self) -> usize {
        self.n_blocks
    }

    /// Whole blocks across the window.
    pub fn total_blocks(&self) -> usize {
        self.n_blocks * self.chunks.len()
    }

    pub fn chunks(&self) -> &[ChunkBuffer] {
        &self.chunks
    }
}
