//! Connect-per-call transport over the daemon's Unix domain socket.

use std::io::ErrorKind;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::frame::{read_frame, write_frame};
use crate::error::{io_err, ClientError, TransportError};

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    path: PathBuf,
    io_timeout: Duration,
}

impl UnixSocketTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send one framed payload and return the framed reply's payload.
    ///
    /// The socket is opened for this exchange only and closed on return.
    pub fn call(&self, payload: &[u8]) -> Result<Vec<u8>, ClientError> {
        if !self.path.exists() {
            return Err(TransportError::Unreachable {
                endpoint: self.path.display().to_string(),
                reason: "socket path does not exist".to_string(),
            }
            .into());
        }

        let mut stream = UnixStream::connect(&self.path).map_err(|err| {
            if matches!(
                err.kind(),
                ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
            ) {
                TransportError::Unreachable {
                    endpoint: self.path.display().to_string(),
                    reason: err.to_string(),
                }
            } else {
                io_err(&self.path, err)
            }
        })?;
        stream
            .set_read_timeout(Some(self.io_timeout))
            .and_then(|()| stream.set_write_timeout(Some(self.io_timeout)))
            .map_err(|e| io_err(&self.path, e))?;

        write_frame(&mut stream, payload).map_err(|e| self.at_socket(e))?;
        tracing::trace!(socket = %self.path.display(), bytes = payload.len(), "request sent");

        let response = read_frame(&mut stream).map_err(|e| self.at_socket(e))?;
        tracing::trace!(socket = %self.path.display(), bytes = response.len(), "response received");
        Ok(response)
    }

    /// Attribute a framing I/O failure to this socket.
    fn at_socket(&self, err: ClientError) -> ClientError {
        match err {
            ClientError::Transport(TransportError::Io { source, .. }) => {
                io_err(&self.path, source).into()
            }
            other => other,
        }
    }
}
