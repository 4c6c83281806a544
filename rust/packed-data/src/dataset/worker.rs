// rust/packed-data/src/dataset/worker.rs

//! Thread-local worker identity.
//!
//! A data-loading harness that runs several workers per process tags each
//! worker thread with its [`WorkerInfo`] before spawning iterators. Sources
//! read it back through [`current_worker`] to pick their shard. Threads that
//! were never tagged behave as the single worker of their process.

use std::cell::Cell;

/// Identity of one data-loading worker within its process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Worker index, in `0..num_workers`
    pub id: u32,
    /// Number of workers in this process
    pub num_workers: u32,
}

impl WorkerInfo {
    pub fn new(id: u32, num_workers: u32) -> Self {
        Self { id, num_workers }
    }

    /// The identity of a process that runs no separate workers.
    pub fn single() -> Self {
        Self {
            id: 0,
            num_workers: 1,
        }
    }
}

impl Default for WorkerInfo {
    fn default() -> Self {
        Self::single()
    }
}

thread_local! {
    static CURRENT_WORKER: Cell<Option<WorkerInfo>> = const { Cell::new(None) };
}

/// Tags the calling thread as worker `info`.
pub fn set_worker_info(info: WorkerInfo) {
    CURRENT_WORKER.with(|cell| cell.set(Some(info)));
}

/// Removes the calling thread's worker tag.
pub fn clear_worker_info() {
    CURRENT_WORKER.with(|cell| cell.set(None));
}

/// The calling thread's worker identity, or [`WorkerInfo::single`] if unset.
pub fn current_worker() -> WorkerInfo {
    CURRENT_WORKER.with(|cell| cell.get()).unwrap_or_default()
}
