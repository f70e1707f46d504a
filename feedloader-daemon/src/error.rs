//! Error surface for daemon transport, protocol, and control operations.
//!
//! Four layers, outermost first: [`ClientError`] wraps a connection-level
//! [`TransportError`], a framing/session-level [`ProtocolError`], or a
//! semantic [`DaemonError`] the daemon itself reported.

use std::path::Path;

use thiserror::Error;

/// Connection-level failures talking to the local daemon.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("daemon is not reachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("daemon closed the connection after {received} of {expected} bytes")]
    Truncated { expected: usize, received: usize },

    #[error("I/O error at {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
}

/// Framing and session-negotiation failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("daemon demanded a new session id twice in a row")]
    DoubleNegotiationFailure,

    #[error("daemon rejected request: {result}")]
    Rejected { result: String },
}

/// Semantic rejections, one variant per daemon status code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DaemonError {
    #[error("communication error inside the daemon")]
    Communication,

    #[error("bad content directory")]
    BadContentDir,

    #[error("bad torrent")]
    BadTorrent,

    #[error("bad torrent entry")]
    BadTorrentEntry,

    #[error("bad tracker")]
    BadTracker,

    #[error("could not create content directory")]
    CreateDirFailed,

    #[error("no such key")]
    NoSuchKey,

    #[error("no such torrent entry")]
    NoSuchEntry,

    #[error("daemon is shutting down")]
    ShuttingDown,

    #[error("torrent is active")]
    TorrentActive,

    #[error("torrent entry exists")]
    EntryExists,

    #[error("torrent is inactive")]
    TorrentInactive,

    #[error("daemon error code {code}")]
    Generic { code: i64 },

    #[error("daemon still unreachable after {attempts} probes")]
    Unreachable { attempts: u32 },

    #[error("failed to launch daemon `{program}`: {reason}")]
    LaunchFailed { program: String, reason: String },
}

impl DaemonError {
    /// Map a non-zero socket-daemon status code.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Communication,
            2 => Self::BadContentDir,
            3 => Self::BadTorrent,
            4 => Self::BadTorrentEntry,
            5 => Self::BadTracker,
            6 => Self::CreateDirFailed,
            7 => Self::NoSuchKey,
            8 => Self::NoSuchEntry,
            9 => Self::ShuttingDown,
            10 => Self::TorrentActive,
            11 => Self::EntryExists,
            12 => Self::TorrentInactive,
            other => Self::Generic { code: other },
        }
    }
}

/// Any failure of a [`crate::DaemonClient`] operation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),
}

impl ClientError {
    /// Transport failures are the only ones worth retrying on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::MalformedFrame(err.to_string())
    }
}

pub(crate) fn io_err(endpoint: &Path, source: std::io::Error) -> TransportError {
    TransportError::Io {
        endpoint: endpoint.display().to_string(),
        source,
    }
}
