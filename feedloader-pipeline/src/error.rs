//! Error types for feedloader-pipeline.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use feedloader_core::HandleId;
use feedloader_daemon::{ClientError, DaemonError};

/// Persistence failures of the seen-links store. A duplicate link is
/// never one of these.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("cannot open link store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("link store query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Failures turning a candidate link into daemon-ready content.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported link '{link}': expected http(s) or magnet")]
    UnsupportedScheme { link: String },

    #[error("GET {url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("GET {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("GET {url} exceeded {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("GET {url} returned an empty body")]
    Empty { url: String },

    #[error("I/O error reading {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why one candidate did not reach `Cleaned`.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("torrent {handle} not complete after {waited:?}")]
    Timeout { handle: HandleId, waited: Duration },

    #[error("torrent {handle} abandoned: {reason}")]
    Abandoned { handle: HandleId, reason: String },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("daemon is not available: {0}")]
    Launch(#[source] DaemonError),

    #[error(transparent)]
    Dedup(#[from] DedupError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> OrchestrationError {
    OrchestrationError::Io {
        path: path.into(),
        source,
    }
}
