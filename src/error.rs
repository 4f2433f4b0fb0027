use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The provider asked us to slow down (HTTP 429 or a rate-limit reason).
    #[error("{operation} was rate limited: {detail}")]
    RateLimited { operation: String, detail: String },

    #[error("{operation} failed: {detail}")]
    Failed { operation: String, detail: String },
}

impl RemoteError {
    pub fn rate_limited(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        RemoteError::RateLimited {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn failed(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        RemoteError::Failed {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }
}

/// Everything that can abort a purge run.
#[derive(Debug, Error)]
pub enum PurgeError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("unable to write archive for message {id} to {}: {source}", .path.display())]
    Archive {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to create archive directory {}: {source}", .path.display())]
    ArchiveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to encode message {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("run cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for PurgeError {
    fn from(err: config::ConfigError) -> Self {
        PurgeError::Config(err.to_string())
    }
}
