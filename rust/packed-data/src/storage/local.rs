// rust/packed-data/src/storage/local.rs

//! Local filesystem fetcher.
//!
//! A bucket maps to a directory under the configured base path. Large files
//! are memory-mapped and handed out without copying; small files are read
//! into memory.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::Mmap;

use super::traits::ByteFetcher;
use crate::config::StorageConfig;
use crate::error::{DataError, Result};

/// Local filesystem byte fetcher.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    /// Directory that contains one sub-directory per bucket.
    base_path: PathBuf,
    /// Whether to use memory-mapped I/O.
    use_mmap: bool,
    /// File size threshold above which to use mmap.
    mmap_threshold: u64,
}

impl LocalFetcher {
    /// Creates a new `LocalFetcher` from configuration.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_path: config.base_path.clone(),
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        }
    }

    /// Creates a fetcher rooted at `base_path` with default I/O settings.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self::new(&StorageConfig {
            base_path: base_path.into(),
            ..StorageConfig::default()
        })
    }

    /// Resolves an object path. An empty bucket addresses `base_path` itself.
    fn resolve_path(&self, bucket: &str, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        if bucket.is_empty() {
            self.base_path.join(path)
        } else {
            self.base_path.join(bucket).join(path)
        }
    }
}

impl ByteFetcher for LocalFetcher {
    fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let full_path = self.resolve_path(bucket, path);
        let mut file = File::open(&full_path)
            .map_err(|e| DataError::storage_with_source(&full_path, "failed to open file", e))?;

        let size = file
            .metadata()
            .map_err(|e| {
                DataError::storage_with_source(&full_path, "failed to read file metadata", e)
            })?
            .len();

        if self.use_mmap && size > 0 && size >= self.mmap_threshold {
            // SAFETY: The file is opened read-only and the mapping is owned by
            // the returned `Bytes`, which keeps it alive for every slice.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                DataError::storage_with_source(&full_path, "failed to memory-map file", e)
            })?;
            return Ok(Bytes::from_owner(mmap));
        }

        let mut buf = Vec::with_capacity(size as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| DataError::storage_with_source(&full_path, "failed to read file", e))?;
        Ok(Bytes::from(buf))
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let (dir, stem) = match prefix.rfind('/') {
            Some(idx) => (&prefix[..idx], &prefix[idx + 1..]),
            None => ("", prefix),
        };
        let full_path = self.resolve_path(bucket, dir);

        if !full_path.exists() {
            return Ok(Vec::new());
        }

        if !full_path.is_dir() {
            return Err(DataError::storage(&full_path, "path is not a directory"));
        }

        let mut entries = Vec::new();

        for entry in fs::read_dir(&full_path).map_err(|e| {
            DataError::storage_with_source(&full_path, "failed to read directory", e)
        })? {
            let entry = entry.map_err(|e| {
                DataError::storage_with_source(&full_path, "failed to read directory entry", e)
            })?;

            if !entry.path().is_file() {
                continue;
            }

            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(stem) {
                    if dir.is_empty() {
                        entries.push(name.to_string());
                    } else {
                        entries.push(format!("{dir}/{name}"));
                    }
                }
            }
        }

        entries.sort();
        Ok(entries)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
