// rust/packed-data/src/storage/traits.rs

//! Byte-fetch abstraction used to load packed chunk files.
//!
//! The dataset core never touches a filesystem or network client directly.
//! It asks a [`ByteFetcher`] for the full content of one object at a time,
//! so local disks, object stores and in-memory fixtures are interchangeable.

use bytes::Bytes;

use crate::error::Result;

/// A synchronous source of whole objects addressed by `(bucket, path)`.
///
/// # Object Safety
///
/// This trait is object-safe and is shared as `Arc<dyn ByteFetcher>` between
/// every iterator spawned from a source.
pub trait ByteFetcher: Send + Sync {
    /// Fetches the full content of the object at `path` inside `bucket`.
    ///
    /// Blocks until the whole object is available.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DataError::Storage`] if the object doesn't exist or
    /// cannot be read.
    fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes>;

    /// Lists object names in `bucket` that start with `prefix`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Short name of this fetcher for log output.
    fn name(&self) -> &'static str;
}
