// rust/packed-data/src/dataset/source.rs

use std::sync::Arc;

use crate::config::{DistributedConfig, SourceConfig};
use crate::error::{DataError, Result};
use crate::storage::ByteFetcher;

use super::iterator::{IteratorConfig, SampleIterator};
use super::sharding::ShardSpec;
use super::traits::{SampleSource, SampleStream};
use super::worker::{current_worker, WorkerInfo};

/// Settings shared by every iterator a [`PackedSource`] spawns.
#[derive(Debug, Clone)]
pub struct PackedSourceConfig {
    pub name: String,
    pub bucket: String,
    pub n_chunks: usize,
    pub block_size: usize,
    pub seed: u64,
    pub shuffle: bool,
    pub wrap: bool,
    pub num_processes: u32,
    pub process_rank: u32,
}

impl Default for PackedSourceConfig {
    fn default() -> Self {
        Self {
            name: "packed".to_string(),
            bucket: String::new(),
            n_chunks: 1,
            block_size: 2048,
            seed: 12345,
            shuffle: true,
            wrap: false,
            num_processes: 1,
            process_rank: 0,
        }
    }
}

impl PackedSourceConfig {
    fn iterator_config(&self) -> IteratorConfig {
        IteratorConfig {
            n_chunks: self.n_chunks,
            block_size: self.block_size,
            seed: self.seed,
            shuffle: self.shuffle,
            wrap: self.wrap,
        }
    }
}

/// A packed corpus: an ordered file list plus iteration settings.
///
/// The source itself never changes after construction. Each call to
/// [`PackedSource::spawn`] computes the caller's shard and returns a new
/// iterator with its own window and generator.
pub struct PackedSource {
    fetcher: Arc<dyn ByteFetcher>,
    filenames: Vec<String>,
    config: PackedSourceConfig,
}

impl PackedSource {
    /// Creates a source over `filenames`, in the order given.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] if `n_chunks` or `block_size` is zero or
    /// the process rank is out of range.
    pub fn new(
        fetcher: Arc<dyn ByteFetcher>,
        filenames: Vec<String>,
        config: PackedSourceConfig,
    ) -> Result<Self> {
        if config.n_chunks == 0 {
            return Err(DataError::config(format!(
                "source '{}': n_chunks must be greater than 0",
                config.name
            )));
        }
        if config.block_size == 0 {
            return Err(DataError::config(format!(
                "source '{}': block_size must be greater than 0",
                config.name
            )));
        }
        if config.process_rank >= config.num_processes {
            return Err(DataError::config(format!(
                "source '{}': process_rank ({}) must be less than num_processes ({})",
                config.name, config.process_rank, config.num_processes
            )));
        }

        Ok(Self {
            fetcher,
            filenames,
            config,
        })
    }

    /// Builds a source from its config entry.
    ///
    /// When the entry names a `prefix`, the file list is read from the
    /// fetcher and sorted so every worker of the job sees the same order.
    pub fn from_config(
        fetcher: Arc<dyn ByteFetcher>,
        source: &SourceConfig,
        distributed: &DistributedConfig,
    ) -> Result<Self> {
        source.validate()?;

        let filenames = match &source.prefix {
            Some(prefix) => {
                let mut names = fetcher.list(&source.bucket, prefix)?;
                names.sort();
                tracing::debug!(
                    source = %source.name,
                    bucket = %source.bucket,
                    prefix = %prefix,
                    files = names.len(),
                    "listed chunk files"
                );
                names
            }
            None => source.files.clone(),
        };

        let config = PackedSourceConfig {
            name: source.name.clone(),
            bucket: source.bucket.clone(),
            n_chunks: source.n_chunks,
            block_size: source.block_size,
            seed: source.seed,
            shuffle: source.shuffle,
            wrap: source.wrap,
            num_processes: distributed.num_processes,
            process_rank: distributed.process_rank,
        };

        Self::new(fetcher, filenames, config)
    }

    /// Spawns an iterator for the calling thread's worker.
    pub fn spawn(&self) -> Result<SampleIterator> {
        self.spawn_for(current_worker())
    }

    /// Spawns an iterator over the shard that belongs to `worker`.
    pub fn spawn_for(&self, worker: WorkerInfo) -> Result<SampleIterator> {
        let shard =
            ShardSpec::for_worker(worker, self.config.num_processes, self.config.process_rank)?;
        let files = shard.select(&self.filenames);

        let reachable = shard.reachable_files(self.filenames.len());
        if reachable < self.filenames.len() {
            tracing::warn!(
                source = %self.config.name,
                total = self.filenames.len(),
                unreachable = self.filenames.len() - reachable,
                num_shards = shard.num_shards,
                "trailing files are not a multiple of the shard count and will not be read"
            );
        }

        tracing::info!(
            source = %self.config.name,
            shard_id = shard.shard_id,
            num_shards = shard.num_shards,
            files = files.len(),
            "spawned packed iterator"
        );

        Ok(SampleIterator::new(
            Arc::clone(&self.fetcher),
            self.config.bucket.clone(),
            files,
            shard,
            self.config.iterator_config(),
        ))
    }

    /// Full ordered file list before sharding.
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    pub fn config(&self) -> &PackedSourceConfig {
        &self.config
    }
}

impl SampleSource for PackedSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn stream_for(&self, worker: WorkerInfo) -> Result<Box<dyn SampleStream>> {
        Ok(Box::new(self.spawn_for(worker)?))
    }
}

impl std::fmt::Debug for PackedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedSource")
            .field("fetcher", &self.fetcher.name())
            .field("files", &self.filenames.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::traits::Sample;
    use crate::dataset::worker::{clear_worker_info, set_worker_info};
    use crate::format::{Dtype, FORMAT_VERSION, HEADER_MAGIC};
    use crate::storage::MemoryFetcher;
    use std::collections::HashSet;

    fn packed(values: impl IntoIterator<Item = i32>) -> Vec<u8> {
        let values: Vec<i32> = values.into_iter().collect();
        let mut out = Vec::new();
        out.extend_from_slice(&HEADER_MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.push(Dtype::I32.code());
        out.extend_from_slice(&(values.len() as u64).to_le_bytes());
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// `n_files` files of 4 elements; file `i` starts at `i * 100`.
    fn source(n_files: usize, config: PackedSourceConfig) -> PackedSource {
        let fetcher = Arc::new(MemoryFetcher::new());
        let mut names = Vec::new();
        for i in 0..n_files {
            let name = format!("train/part-{i:03}.bin");
            let base = i as i32 * 100;
            fetcher.insert("corpus", name.as_str(), packed(base..base + 4));
            names.push(name);
        }
        PackedSource::new(fetcher, names, config).unwrap()
    }

    fn sequential() -> PackedSourceConfig {
        PackedSourceConfig {
            bucket: "corpus".to_string(),
            block_size: 4,
            shuffle: false,
            ..Default::default()
        }
    }

    fn firsts(iter: SampleIterator) -> Vec<i64> {
        iter.map(|r| r.unwrap()[0]).collect()
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let fetcher: Arc<dyn ByteFetcher> = Arc::new(MemoryFetcher::new());
        let zero_chunks = PackedSourceConfig {
            n_chunks: 0,
            ..Default::default()
        };
        assert!(PackedSource::new(Arc::clone(&fetcher), vec![], zero_chunks).is_err());

        let zero_block = PackedSourceConfig {
            block_size: 0,
            ..Default::default()
        };
        assert!(PackedSource::new(Arc::clone(&fetcher), vec![], zero_block).is_err());

        let bad_rank = PackedSourceConfig {
            num_processes: 2,
            process_rank: 2,
            ..Default::default()
        };
        assert!(PackedSource::new(fetcher, vec![], bad_rank).is_err());
    }

    #[test]
    fn test_single_worker_reads_every_file() {
        let src = source(3, sequential());
        let iter = src.spawn_for(WorkerInfo::single()).unwrap();
        assert_eq!(iter.shard_files(), src.filenames());
        assert_eq!(firsts(iter), vec![0, 100, 200]);
    }

    #[test]
    fn test_workers_get_disjoint_shards() {
        let src = source(9, sequential());

        let mut seen = HashSet::new();
        for id in 0..4 {
            let iter = src.spawn_for(WorkerInfo::new(id, 4)).unwrap();
            for first in firsts(iter) {
                assert!(seen.insert(first), "sample {first} served twice");
            }
        }
        // 9 files over 4 shards: the last file is unreachable
        assert_eq!(seen.len(), 8);
        assert!(!seen.contains(&800));
    }

    #[test]
    fn test_process_rank_offsets_shard() {
        let config = PackedSourceConfig {
            num_processes: 2,
            process_rank: 1,
            ..sequential()
        };
        let src = source(8, config);

        // shard_id = 1 * 2 + 1 = 3 of 4
        let iter = src.spawn_for(WorkerInfo::new(1, 2)).unwrap();
        assert_eq!(iter.shard().shard_id, 3);
        assert_eq!(iter.shard().num_shards, 4);
        assert_eq!(firsts(iter), vec![300, 700]);
    }

    #[test]
    fn test_spawn_uses_thread_worker_identity() {
        let src = Arc::new(source(4, sequential()));

        let handles: Vec<_> = (0..2)
            .map(|id| {
                let src = Arc::clone(&src);
                std::thread::spawn(move || {
                    set_worker_info(WorkerInfo::new(id, 2));
                    let iter = src.spawn().unwrap();
                    clear_worker_info();
                    firsts(iter)
                })
            })
            .collect();

        let results: Vec<Vec<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results[0], vec![0, 200]);
        assert_eq!(results[1], vec![100, 300]);
    }

    #[test]
    fn test_spawn_is_independent_and_repeatable() {
        let config = PackedSourceConfig {
            shuffle: true,
            block_size: 1,
            seed: 3,
            ..sequential()
        };
        let src = source(2, config);

        let mut a = src.spawn().unwrap();
        let first_a = a.next().unwrap().unwrap();
        let b = src.spawn().unwrap();

        let rest_a: Vec<Sample> = a.map(|r| r.unwrap()).collect();
        let all_b: Vec<Sample> = b.map(|r| r.unwrap()).collect();

        let mut all_a = vec![first_a];
        all_a.extend(rest_a);
        assert_eq!(all_a, all_b);
    }

    #[test]
    fn test_invalid_worker() {
        let src = source(2, sequential());
        let err = src.spawn_for(WorkerInfo::new(2, 2)).unwrap_err();
        assert!(matches!(err, DataError::InvalidShard { .. }));
    }

    #[test]
    fn test_from_config_with_prefix() {
        let fetcher = Arc::new(MemoryFetcher::new());
        for name in ["train/b.bin", "train/a.bin", "val/c.bin"] {
            fetcher.insert("corpus", name, packed(0..4));
        }

        let source_config = SourceConfig {
            name: "train".to_string(),
            bucket: "corpus".to_string(),
            prefix: Some("train/".to_string()),
            ..Default::default()
        };
        let src =
            PackedSource::from_config(fetcher, &source_config, &DistributedConfig::default())
                .unwrap();
        assert_eq!(src.filenames(), &["train/a.bin", "train/b.bin"]);
        assert_eq!(SampleSource::name(&src), "train");
    }

    #[test]
    fn test_stream_is_boxed_iterator() {
        let src = source(2, sequential());
        let stream = src.stream_for(WorkerInfo::single()).unwrap();
        assert_eq!(stream.count(), 2);
    }
}
