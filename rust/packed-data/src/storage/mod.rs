// rust/packed-data/src/storage/mod.rs

//! Byte-fetch layer.
//!
//! Packed chunks are loaded whole through the [`ByteFetcher`] trait. The
//! crate ships a local filesystem fetcher, an in-memory fetcher, and a
//! retrying wrapper that handles transient failures. Remote object stores
//! plug in by implementing the same trait.
//!
//! # Example
//!
//! ```no_run
//! use packed_data::config::StorageConfig;
//! use packed_data::storage::{ByteFetcher, LocalFetcher, RetryConfig, RetryingFetcher};
//!
//! let config = StorageConfig::default();
//! let fetcher = RetryingFetcher::new(LocalFetcher::new(&config), RetryConfig::default());
//!
//! let bytes = fetcher.fetch("corpus", "train_0.bin").unwrap();
//! println!("{} bytes", bytes.len());
//! ```

mod local;
mod memory;
mod retry;
mod traits;

pub use local::LocalFetcher;
pub use memory::MemoryFetcher;
pub use retry::{RetryConfig, RetryingFetcher};
pub use traits::ByteFetcher;
