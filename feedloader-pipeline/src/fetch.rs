//! Turn a candidate link into content the daemon can add.
//!
//! `magnet:` URIs pass through untouched; `http(s)` links are fetched with a
//! blocking GET and the body is taken as `.torrent` metainfo.

use std::io::Read;
use std::time::Duration;

use feedloader_core::TorrentSource;
use feedloader_daemon::sanitize_url;

use crate::error::FetchError;

/// Metainfo files are small; anything beyond this is not a torrent.
pub const DEFAULT_MAX_BYTES: u64 = 16 * 1024 * 1024;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Fetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn resolve(&self, link: &str) -> Result<TorrentSource, FetchError> {
        let link = link.trim();
        if link.starts_with("magnet:") {
            return Ok(TorrentSource::Magnet(link.to_string()));
        }
        if !(link.starts_with("http://") || link.starts_with("https://")) {
            return Err(FetchError::UnsupportedScheme {
                link: link.to_string(),
            });
        }
        self.download(&sanitize_url(link))
            .map(TorrentSource::Metainfo)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url, "fetching metainfo");
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status,
                })
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(FetchError::Request {
                    url: url.to_string(),
                    reason: transport.to_string(),
                })
            }
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|source| FetchError::Io {
                url: url.to_string(),
                source,
            })?;
        if body.len() as u64 > self.max_bytes {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_bytes,
            });
        }
        if body.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        tracing::debug!(url, bytes = body.len(), "fetched metainfo");
        Ok(body)
    }
}
