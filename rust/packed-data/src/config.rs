// rust/packed-data/src/config.rs

//! Configuration for packed dataset loading.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dataset::validate_weights;
use crate::error::{DataError, Result};

// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub storage: StorageConfig,
    pub distributed: DistributedConfig,
    pub combine: CombineConfig,
    pub sources: Vec<SourceConfig>,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Local root directory; each bucket is a sub-directory.
    pub base_path: PathBuf,
    // Whether to memory-map large files instead of reading them.
    pub use_mmap: bool,
    // File size threshold (bytes) at or above which to use mmap.
    pub mmap_threshold: u64,
    // Retry policy for transient fetch failures.
    pub retry: RetrySettings,
}

/// Retry settings for the byte fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of retries for a failed fetch.
    pub max_retries: u32,
    /// Initial delay (milliseconds) between retries.
    pub initial_delay_ms: u64,
    /// Maximum delay (milliseconds) between retries.
    pub max_delay_ms: u64,
    /// Backoff multiplier applied per attempt.
    pub backoff_multiplier: f64,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

// Distributed job layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributedConfig {
    // Number of training processes in the job.
    pub num_processes: u32,
    // Rank of this process, in `0..num_processes`.
    pub process_rank: u32,
}

// Multi-source mixing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    // Seed for the weighted source selector.
    pub seed: u64,
}

/// One packed corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Name used in logs and errors.
    pub name: String,
    /// Bucket passed to the byte fetcher.
    pub bucket: String,
    /// Explicit, ordered list of chunk files.
    pub files: Vec<String>,
    /// List chunk files by prefix instead of naming them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Number of chunks held in memory at once.
    pub n_chunks: usize,
    /// Elements per sample.
    pub block_size: usize,
    /// Seed for block shuffling.
    pub seed: u64,
    /// Whether to shuffle blocks within each window.
    pub shuffle: bool,
    /// Whether to restart from the first file once the shard is exhausted.
    pub wrap: bool,
    /// Relative sampling weight when mixing sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./data"),
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
            retry: RetrySettings::default(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            num_processes: 1,
            process_rank: 0,
        }
    }
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            bucket: String::new(),
            files: Vec::new(),
            prefix: None,
            n_chunks: 1,
            block_size: 2048,
            seed: 12345,
            shuffle: true,
            wrap: false,
            weight: None,
        }
    }
}

impl FromStr for DataConfig {
    type Err = DataError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| DataError::config_with_source("failed to parse TOML config", e))
    }
}

impl DataConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `PDS_` and use underscores
    // to separate nested fields. For example:
    // - `PDS_STORAGE_BASE_PATH` overrides `storage.base_path`
    // - `PDS_DISTRIBUTED_PROCESS_RANK` overrides `distributed.process_rank`
    // - `PDS_COMBINE_SEED` overrides `combine.seed`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("PDS_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PDS_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }
        if let Ok(val) = std::env::var("PDS_STORAGE_MMAP_THRESHOLD") {
            if let Ok(v) = val.parse() {
                self.storage.mmap_threshold = v;
            }
        }
        if let Ok(val) = std::env::var("PDS_DISTRIBUTED_NUM_PROCESSES") {
            if let Ok(v) = val.parse() {
                self.distributed.num_processes = v;
            }
        }
        if let Ok(val) = std::env::var("PDS_DISTRIBUTED_PROCESS_RANK") {
            if let Ok(v) = val.parse() {
                self.distributed.process_rank = v;
            }
        }
        if let Ok(val) = std::env::var("PDS_COMBINE_SEED") {
            if let Ok(v) = val.parse() {
                self.combine.seed = v;
            }
        }

        self
    }

    /// Per-source weights, or `None` when no source sets one.
    ///
    /// Only meaningful after [`DataConfig::validate`] has passed.
    pub fn weights(&self) -> Option<Vec<f64>> {
        if self.sources.iter().all(|s| s.weight.is_none()) {
            return None;
        }
        Some(self.sources.iter().map(|s| s.weight.unwrap_or(0.0)).collect())
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.distributed.num_processes == 0 {
            return Err(DataError::config(
                "distributed.num_processes must be greater than 0",
            ));
        }
        if self.distributed.process_rank >= self.distributed.num_processes {
            return Err(DataError::config(format!(
                "distributed.process_rank ({}) must be less than num_processes ({})",
                self.distributed.process_rank, self.distributed.num_processes
            )));
        }

        if self.storage.retry.backoff_multiplier < 1.0 {
            return Err(DataError::config(
                "storage.retry.backoff_multiplier must be at least 1.0",
            ));
        }

        if self.sources.is_empty() {
            return Err(DataError::config("at least one [[sources]] entry is required"));
        }

        for source in &self.sources {
            source.validate()?;
        }

        let with_weight = self.sources.iter().filter(|s| s.weight.is_some()).count();
        if with_weight != 0 && with_weight != self.sources.len() {
            return Err(DataError::config(
                "either every source sets a weight or none does",
            ));
        }
        if let Some(weights) = self.weights() {
            validate_weights(&weights)?;
        }

        Ok(())
    }
}

impl SourceConfig {
    /// Validate a single source entry.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DataError::config("sources.name must not be empty"));
        }
        if self.n_chunks == 0 {
            return Err(DataError::config(format!(
                "source '{}': n_chunks must be greater than 0",
                self.name
            )));
        }
        if self.block_size == 0 {
            return Err(DataError::config(format!(
                "source '{}': block_size must be greater than 0",
                self.name
            )));
        }
        match (&self.prefix, self.files.is_empty()) {
            (Some(_), false) => Err(DataError::config(format!(
                "source '{}': set either files or prefix, not both",
                self.name
            ))),
            (None, true) => Err(DataError::config(format!(
                "source '{}': one of files or prefix is required",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}
