// rust/packed-data/src/storage/memory.rs

//! In-memory fetcher for tests and synthetic corpora.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use bytes::Bytes;

use super::traits::ByteFetcher;
use crate::error::{DataError, Result};

/// Byte fetcher backed by a map of `(bucket, path)` to content.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    objects: RwLock<BTreeMap<(String, String), Bytes>>,
    fetches: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `data` at `path` in `bucket`, replacing any previous content.
    pub fn insert(&self, bucket: impl Into<String>, path: impl Into<String>, data: impl Into<Bytes>) {
        self.objects
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((bucket.into(), path.into()), data.into());
    }

    /// Number of successful and failed `fetch` calls so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl ByteFetcher for MemoryFetcher {
    fn fetch(&self, bucket: &str, path: &str) -> Result<Bytes> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| {
                DataError::storage_with_source(
                    format!("{bucket}/{path}"),
                    "not found",
                    std::io::ErrorKind::NotFound.into(),
                )
            })
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        // BTreeMap keeps names sorted within a bucket
        Ok(self
            .objects
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .filter(|(b, p)| b == bucket && p.starts_with(prefix))
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
