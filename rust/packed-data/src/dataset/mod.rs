// rust/packed-data/src/dataset/mod.rs

//! Sharded, windowed iteration over packed chunk files.
//!
//! A [`PackedSource`] holds an ordered file list. Each worker calls
//! [`PackedSource::spawn`], which picks the worker's shard of files and
//! returns a [`SampleIterator`]. The iterator keeps `n_chunks` chunks in a
//! [`ChunkWindow`] and serves `block_size`-element samples out of it.
//! A [`CombinedSource`] mixes several sources by seeded weighted choice.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use packed_data::dataset::{PackedSource, PackedSourceConfig, WorkerInfo};
//! use packed_data::storage::LocalFetcher;
//!
//! # fn main() -> packed_data::Result<()> {
//! let fetcher = Arc::new(LocalFetcher::with_base_path("/data"));
//! let files = vec!["train/part-000.bin".to_string(), "train/part-001.bin".to_string()];
//! let source = PackedSource::new(
//!     fetcher,
//!     files,
//!     PackedSourceConfig {
//!         bucket: "corpus".to_string(),
//!         n_chunks: 2,
//!         block_size: 2048,
//!         ..Default::default()
//!     },
//! )?;
//!
//! for sample in source.spawn_for(WorkerInfo::new(0, 2))? {
//!     let sample = sample?;
//!     assert_eq!(sample.len(), 2048);
//! }
//! # Ok(())
//! # }
//! ```

mod combined;
mod iterator;
mod sharding;
mod source;
mod traits;
mod window;
mod worker;

pub use combined::{select, validate_weights, CombinedIterator, CombinedSource, WeightedSelector};
pub use iterator::{IteratorConfig, SampleIterator, WindowLoad};
pub use sharding::{plan_shard, ShardSpec};
pub use source::{PackedSource, PackedSourceConfig};
pub use traits::{Sample, SampleSource, SampleStream};
pub use window::{ChunkBuffer, ChunkWindow};
pub use worker::{clear_worker_info, current_worker, set_worker_info, WorkerInfo};
