use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the remote object store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{operation} failed: {message}")]
    Backend {
        operation: &'static str,
        message: String,
    },

    #[error("presign failed for {key}: {message}")]
    Presign { key: String, message: String },

    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    pub fn backend(
        operation: &'static str,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::Backend {
            operation,
            message: err.to_string(),
        }
    }
}

/// Failures reading the declarative playlist catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog object {key} not found in bucket")]
    Missing { key: String },

    #[error("catalog is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid max age {value:?} for {user}/{playlist}: {source}")]
    MaxAge {
        user: String,
        playlist: String,
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures loading or writing the durable snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("snapshot is corrupt: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A progress-tracking call named something the store does not hold.
///
/// Callers on the HTTP path discard this after it has been logged; it exists so
/// tests and strict callers can tell a miss from an applied update.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    #[error("user {0} not present")]
    UserMissing(String),

    #[error("playlist {playlist} not present for user {user}")]
    PlaylistMissing { user: String, playlist: String },

    #[error("video {video} not found in {user}/{playlist}")]
    VideoMissing {
        user: String,
        playlist: String,
        video: String,
    },
}
