use std::path::PathBuf;

use thiserror::Error;

/// Why a single document produced nothing. Never aborts a batch.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not derive year/month from '{0}'")]
    Undated(String),

    #[error("analysis job for {path:?} ended with status {status}")]
    JobNotSucceeded { path: PathBuf, status: String },

    #[error("analysis result {0:?} is truncated (last page still has a continuation token)")]
    Truncated(PathBuf),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid analysis JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
