// rust/packed-data/src/dataset/sharding.rs

use crate::error::{DataError, Result};

use super::worker::WorkerInfo;

/// Position of one (process, worker) pair among all readers of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    pub shard_id: u32,
    pub num_shards: u32,
}

impl ShardSpec {
    /// Creates a shard spec, checking that `shard_id < num_shards`.
    pub fn new(shard_id: u32, num_shards: u32) -> Result<Self> {
        if shard_id >= num_shards {
            return Err(DataError::invalid_shard(shard_id, num_shards));
        }
        Ok(Self {
            shard_id,
            num_shards,
        })
    }

    /// Derives the shard of `worker` running inside process `process_rank`.
    ///
    /// `shard_id = process_rank * num_workers + worker.id` and
    /// `num_shards = num_processes * num_workers`, so workers of one process
    /// occupy a contiguous run of shard ids.
    pub fn for_worker(worker: WorkerInfo, num_processes: u32, process_rank: u32) -> Result<Self> {
        if worker.num_workers == 0 || worker.id >= worker.num_workers {
            return Err(DataError::invalid_shard(worker.id, worker.num_workers));
        }
        if process_rank >= num_processes {
            return Err(DataError::invalid_shard(process_rank, num_processes));
        }

        let num_shards = num_processes
            .checked_mul(worker.num_workers)
            .ok_or_else(|| DataError::config("num_processes * num_workers overflows u32"))?;
        let shard_id = process_rank * worker.num_workers + worker.id;

        Self::new(shard_id, num_shards)
    }

    /// Number of leading files any shard may visit out of `total_files`.
    pub fn reachable_files(&self, total_files: usize) -> usize {
        aligned_len(total_files, self.num_shards)
    }

    /// This shard's files out of the full ordered list.
    pub fn select<T: Clone>(&self, filenames: &[T]) -> Vec<T> {
        plan_shard(filenames, self.num_shards, self.shard_id)
    }
}

/// Returns the files that shard `shard_id` of `num_shards` may read.
///
/// The list is first truncated to `floor(len / num_shards) * num_shards`
/// entries so every shard gets the same count, then strided: the shard takes
/// indices `shard_id, shard_id + num_shards, ...`. Files past the truncation
/// point are never visited by any shard. A shard id outside `0..num_shards`
/// or `num_shards == 0` yields an empty list.
pub fn plan_shard<T: Clone>(filenames: &[T], num_shards: u32, shard_id: u32) -> Vec<T> {
    if num_shards == 0 || shard_id >= num_shards {
        return Vec::new();
    }

    let bound = aligned_len(filenames.len(), num_shards);
    filenames[..bound]
        .iter()
        .skip(shard_id as usize)
        .step_by(num_shards as usize)
        .cloned()
        .collect()
}

fn aligned_len(total: usize, num_shards: u32) -> usize {
    if num_shards == 0 {
        return 0;
    }
    let num_shards = num_shards as usize;
    total / num_shards * num_shards
}
