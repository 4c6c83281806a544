// rust/packed-data/src/lib.rs

//! Packed Dataset Engine - Core Library
//!
//! This crate reads corpora stored as packed binary chunk files and serves
//! fixed-length integer samples to distributed training workers. It covers
//! the chunk file format, per-worker sharding, windowed shuffled iteration,
//! weighted mixing of several corpora, and the byte-fetch layer underneath.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::DataConfig;
pub use error::{DataError, Result};
pub use storage::{ByteFetcher, LocalFetcher, MemoryFetcher, RetryingFetcher};

pub mod format;
pub use format::{Dtype, PackedHeader};

pub mod dataset;
pub use dataset::{
    plan_shard, select, CombinedSource, PackedSource, PackedSourceConfig, Sample,
    SampleIterator, SampleSource, SampleStream, ShardSpec, WorkerInfo,
};

pub mod runtime;
pub use runtime::Runtime;
