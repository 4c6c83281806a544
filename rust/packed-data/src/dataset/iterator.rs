// rust/packed-data/src/dataset/iterator.rs

use std::iter::FusedIterator;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{DataError, Result};
use crate::format::Dtype;
use crate::storage::ByteFetcher;

use super::sharding::ShardSpec;
use super::traits::Sample;
use super::window::ChunkWindow;

/// Configuration for a sample iterator
#[derive(Debug, Clone)]
pub struct IteratorConfig {
    /// Number of chunk files held in memory at once
    pub n_chunks: usize,
    /// Elements per sample
    pub block_size: usize,
    /// Seed for the block shuffle
    pub seed: u64,
    /// Whether to shuffle block order within each window
    pub shuffle: bool,
    /// Whether to restart at the shard's first file instead of ending
    pub wrap: bool,
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self {
            n_chunks: 1,
            block_size: 2048,
            seed: 12345,
            shuffle: true,
            wrap: false,
        }
    }
}

/// Outcome of a window (re)load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowLoad {
    /// A fresh window is resident and the block order is reset.
    Loaded,
    /// Fewer than `n_chunks` files remain and wrapping is off.
    EndOfShard,
}

/// An iterator over fixed-length samples of one shard.
///
/// The iterator keeps a window of `n_chunks` chunk files in memory and walks
/// a block-index order over it, sequential or shuffled. When the order is
/// used up it drops the window and loads the next `n_chunks` files. With
/// `wrap` the shard restarts from its first file and the iterator never ends.
///
/// The shuffle generator is seeded once and keeps advancing across reloads,
/// so every window gets a different order while the whole sequence stays
/// reproducible for a given seed.
pub struct SampleIterator {
    fetcher: Arc<dyn ByteFetcher>,
    bucket: String,
    files: Vec<String>,
    shard: ShardSpec,
    config: IteratorConfig,
    rng: Option<StdRng>,
    window: Option<ChunkWindow>,
    block_idxs: Vec<usize>,
    curr_idx: usize,
    file_idx: usize,
    windows_loaded: u64,
    finished: bool,
}

impl SampleIterator {
    /// Create a new sample iterator over `files`, this shard's file subset.
    ///
    /// No I/O happens until the first sample is requested.
    pub fn new(
        fetcher: Arc<dyn ByteFetcher>,
        bucket: impl Into<String>,
        files: Vec<String>,
        shard: ShardSpec,
        config: IteratorConfig,
    ) -> Self {
        let rng = config.shuffle.then(|| StdRng::seed_from_u64(config.seed));
        Self {
            fetcher,
            bucket: bucket.into(),
            files,
            shard,
            config,
            rng,
            window: None,
            block_idxs: Vec::new(),
            curr_idx: 0,
            file_idx: 0,
            windows_loaded: 0,
            finished: false,
        }
    }

    /// Drop the current window and load the next `n_chunks` files.
    ///
    /// Returns [`WindowLoad::EndOfShard`] when fewer than `n_chunks` files
    /// remain and wrapping is disabled, or when the shard holds fewer than
    /// `n_chunks` files at all.
    pub fn load_window(&mut self) -> Result<WindowLoad> {
        // Release the old buffers before fetching new ones
        self.window = None;
        self.block_idxs.clear();
        self.curr_idx = 0;

        let n_chunks = self.config.n_chunks;

        if self.files.len() < n_chunks {
            tracing::warn!(
                bucket = %self.bucket,
                shard_id = self.shard.shard_id,
                num_shards = self.shard.num_shards,
                files = self.files.len(),
                n_chunks,
                "shard holds fewer files than one window, ending"
            );
            return Ok(WindowLoad::EndOfShard);
        }

        if n_chunks > self.files.len() - self.file_idx {
            if !self.config.wrap {
                tracing::debug!(
                    bucket = %self.bucket,
                    shard_id = self.shard.shard_id,
                    windows_loaded = self.windows_loaded,
                    "end of shard"
                );
                return Ok(WindowLoad::EndOfShard);
            }
            tracing::warn!(
                bucket = %self.bucket,
                shard_id = self.shard.shard_id,
                windows_loaded = self.windows_loaded,
                "wrapping to the first file of the shard"
            );
            self.file_idx = 0;
        }

        let files = &self.files[self.file_idx..self.file_idx + n_chunks];
        let window =
            ChunkWindow::load(self.fetcher.as_ref(), &self.bucket, files, self.config.block_size)?;

        self.file_idx += n_chunks;

        let mut block_idxs: Vec<usize> = (0..window.total_blocks()).collect();
        if let Some(rng) = self.rng.as_mut() {
            block_idxs.shuffle(rng);
        }

        tracing::debug!(
            bucket = %self.bucket,
            shard_id = self.shard.shard_id,
            file_idx = self.file_idx,
            n_chunks,
            n_blocks = window.n_blocks(),
            dtype = %window.dtype(),
            "loaded chunk window"
        );

        self.block_idxs = block_idxs;
        self.window = Some(window);
        self.windows_loaded += 1;

        Ok(WindowLoad::Loaded)
    }

    /// Read the next sample.
    ///
    /// Returns `Ok(Some(sample))` on success, `Ok(None)` once the shard is
    /// exhausted, or an error if a window fails to load. After an error the
    /// iterator is finished.
    pub fn next_sample(&mut self) -> Result<Option<Sample>> {
        if self.finished {
            return Ok(None);
        }

        match self.advance() {
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(e) => {
                self.finished = true;
                self.window = None;
                Err(e)
            }
            ok => ok,
        }
    }

    fn advance(&mut self) -> Result<Option<Sample>> {
        if self.curr_idx >= self.block_idxs.len()
            && self.load_window()? == WindowLoad::EndOfShard
        {
            return Ok(None);
        }

        let window = self
            .window
            .as_ref()
            .ok_or_else(|| DataError::dataset(self.bucket.as_str(), "no chunk window loaded"))?;

        let block_idx = self.block_idxs[self.curr_idx];
        let sample = window.block(block_idx)?;
        self.curr_idx += 1;

        Ok(Some(sample))
    }

    /// Files of this shard, in visiting order.
    pub fn shard_files(&self) -> &[String] {
        &self.files
    }

    pub fn shard(&self) -> ShardSpec {
        self.shard
    }

    /// Index of the next file to load.
    pub fn file_cursor(&self) -> usize {
        self.file_idx
    }

    /// Number of windows loaded so far.
    pub fn windows_loaded(&self) -> u64 {
        self.windows_loaded
    }

    /// Block order of the current window.
    pub fn block_order(&self) -> &[usize] {
        &self.block_idxs
    }

    /// Whole blocks per chunk in the current window.
    pub fn n_blocks(&self) -> Option<usize> {
        self.window.as_ref().map(ChunkWindow::n_blocks)
    }

    pub fn dtype(&self) -> Option<Dtype> {
        self.window.as_ref().map(ChunkWindow::dtype)
    }

    pub fn config(&self) -> &IteratorConfig {
        &self.config
    }
}

impl Iterator for SampleIterator {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_sample() {
            Ok(Some(sample)) => Some(Ok(sample)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl FusedIterator for SampleIterator {}

impl std::fmt::Debug for SampleIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleIterator")
            .field("bucket", &self.bucket)
            .field("shard", &self.shard)
            .field("files", &self.files.len())
            .field("file_idx", &self.file_idx)
            .field("curr_idx", &self.curr_idx)
            .field("windows_loaded", &self.windows_loaded)
            .finish()
    }
}
