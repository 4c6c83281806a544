// rust/packed-data/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {

    #[error("Format error in '{path}': {message}")]
    Format {
        path: String,
        message: String,
    },

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Dataset '{name}' error: {message}")]
    Dataset {
        name: String,
        message: String,
    },

    #[error("Shard {shard_id} out of range (total shards: {total_shards})")]
    InvalidShard {
        shard_id: u32,
        total_shards: u32,
    },
}

pub type Result<T> = std::result::Result<T, DataError>;

// Convenience constructors
impl DataError {

    pub fn format(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn dataset(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dataset {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_shard(shard_id: u32, total_shards: u32) -> Self {
        Self::InvalidShard { shard_id, total_shards }
    }

    /// Whether this error came from the byte-fetch layer and may succeed on a
    /// later attempt.
    ///
    /// Missing objects and denied access are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage {
                source: Some(e), ..
            } => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            Self::Storage { source: None, .. } => true,
            _ => false,
        }
    }

    /// Whether this error is a malformed packed file.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}
