// rust/packed-data/src/runtime.rs

//! Top-level entry point.
//!
//! The `Runtime` builds the byte-fetch stack from [`StorageConfig`], resolves
//! every configured source, and hands each worker one sample stream.
//!
//! # Example
//!
//! ```no_run
//! use packed_data::Runtime;
//!
//! let runtime = Runtime::from_config_file("data.toml").unwrap();
//!
//! // One stream per data-loading worker
//! for sample in runtime.spawn().unwrap().take(4) {
//!     let sample = sample.unwrap();
//!     println!("{} tokens", sample.len());
//! }
//! ```
//!
//! [`StorageConfig`]: crate::config::StorageConfig

use std::path::Path;
use std::sync::Arc;

use crate::config::DataConfig;
use crate::dataset::{
    current_worker, CombinedSource, PackedSource, SampleSource, SampleStream, WorkerInfo,
};
use crate::error::Result;
use crate::storage::{ByteFetcher, LocalFetcher, RetryConfig, RetryingFetcher};

/// Owns the fetcher and the resolved sources of one job.
///
/// With a single unweighted source, streams come straight from that source.
/// Otherwise every stream is a weighted mix of all sources.
pub struct Runtime {
    config: DataConfig,
    fetcher: Arc<dyn ByteFetcher>,
    sources: Vec<Arc<PackedSource>>,
    combined: Option<Arc<CombinedSource>>,
    root: Arc<dyn SampleSource>,
}

impl Runtime {
    /// Creates a runtime from a configuration file.
    ///
    /// The configuration file should be in TOML format. Environment variable
    /// overrides are applied after loading the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = DataConfig::from_file(path)?.with_env_overrides();
        Self::from_config(config)
    }

    /// Creates a runtime that reads from local storage.
    ///
    /// Fetches go through a [`RetryingFetcher`] configured from
    /// `storage.retry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a source cannot
    /// be resolved.
    pub fn from_config(config: DataConfig) -> Result<Self> {
        let local = LocalFetcher::new(&config.storage);
        let fetcher: Arc<dyn ByteFetcher> = Arc::new(RetryingFetcher::new(
            local,
            RetryConfig::from(&config.storage.retry),
        ));
        Self::with_fetcher(config, fetcher)
    }

    /// Creates a runtime that reads through `fetcher`.
    pub fn with_fetcher(config: DataConfig, fetcher: Arc<dyn ByteFetcher>) -> Result<Self> {
        config.validate()?;

        let sources = config
            .sources
            .iter()
            .map(|source| {
                PackedSource::from_config(Arc::clone(&fetcher), source, &config.distributed)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        let weights = config.weights();
        let (combined, root): (Option<Arc<CombinedSource>>, Arc<dyn SampleSource>) =
            match sources.as_slice() {
                [single] if weights.is_none() => {
                    (None, Arc::clone(single) as Arc<dyn SampleSource>)
                }
                _ => {
                    let children = sources
                        .iter()
                        .map(|s| Arc::clone(s) as Arc<dyn SampleSource>)
                        .collect();
                    let combined = Arc::new(CombinedSource::new(
                        "combined",
                        children,
                        weights,
                        config.combine.seed,
                    )?);
                    (Some(Arc::clone(&combined)), combined as Arc<dyn SampleSource>)
                }
            };

        tracing::info!(
            fetcher = fetcher.name(),
            sources = sources.len(),
            combined = combined.is_some(),
            num_processes = config.distributed.num_processes,
            process_rank = config.distributed.process_rank,
            "runtime ready"
        );

        Ok(Self {
            config,
            fetcher,
            sources,
            combined,
            root,
        })
    }

    /// Spawns a stream for the calling thread's worker.
    pub fn spawn(&self) -> Result<Box<dyn SampleStream>> {
        self.spawn_for(current_worker())
    }

    /// Spawns a stream for `worker`.
    pub fn spawn_for(&self, worker: WorkerInfo) -> Result<Box<dyn SampleStream>> {
        self.root.stream_for(worker)
    }

    /// Looks up a source by its configured name.
    pub fn source(&self, name: &str) -> Option<&Arc<PackedSource>> {
        self.sources.iter().find(|s| s.config().name == name)
    }

    pub fn sources(&self) -> &[Arc<PackedSource>] {
        &self.sources
    }

    /// The weighted mix, when more than one source or explicit weights are set.
    pub fn combined(&self) -> Option<&CombinedSource> {
        self.combined.as_deref()
    }

    /// Returns the runtime configuration.
    pub fn config(&self) -> &DataConfig {
        &self.config
    }

    /// Returns the byte fetcher.
    pub fn fetcher(&self) -> &Arc<dyn ByteFetcher> {
        &self.fetcher
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("fetcher", &self.fetcher.name())
            .field("sources", &self.sources)
            .field("root", &self.root.name())
            .finish()
    }
}
