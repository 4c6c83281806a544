// rust/packed-data/src/dataset/traits.rs

use crate::error::Result;

use super::worker::{current_worker, WorkerInfo};

/// One fixed-length training sample, widened to `i64`.
pub type Sample = Vec<i64>;

/// A pull-based stream of samples owned by exactly one consumer.
///
/// `None` means the stream is finished. An `Err` item is fatal; streams in
/// this crate return `None` on every call after yielding one.
pub trait SampleStream: Iterator<Item = Result<Sample>> + Send {}

impl<T> SampleStream for T where T: Iterator<Item = Result<Sample>> + Send {}

/// Immutable description of a dataset that spawns one stream per worker.
pub trait SampleSource: Send + Sync {
    /// Name of this source for logs and errors
    fn name(&self) -> &str;

    /// Spawns a fresh stream for `worker`.
    ///
    /// Streams spawned from the same source share no mutable state.
    fn stream_for(&self, worker: WorkerInfo) -> Result<Box<dyn SampleStream>>;

    /// Spawns a fresh stream for the calling thread's worker identity.
    fn stream(&self) -> Result<Box<dyn SampleStream>> {
        self.stream_for(current_worker())
    }
}
