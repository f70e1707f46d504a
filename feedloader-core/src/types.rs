//! Domain types shared by the daemon client and the download pipeline.
//!
//! Torrent records are never cached: every value here is a projection of
//! one daemon round trip.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Daemon-assigned numeric handle of one tracked torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub i64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for HandleId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// 20-byte torrent info hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    /// Build from a raw byte slice; `None` unless exactly 20 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 20]>::try_from(bytes).ok().map(Self)
    }

    /// Parse the 40-character hex form used by the HTTP daemon.
    pub fn from_hex(text: &str) -> Option<Self> {
        let bytes = hex::decode(text).ok()?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// Torrent state
// ---------------------------------------------------------------------------

/// Lifecycle state reported by the daemon.
///
/// The socket daemon reports the first five directly; the HTTP daemon's
/// state is derived from `status` and `leftUntilDone`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TorrentState {
    Inactive,
    Starting,
    Stopped,
    Leeching,
    Seeding,
    Added,
    Downloading,
    Finished,
}

impl TorrentState {
    /// Map the socket daemon's numeric state code.
    pub fn from_btpd_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Inactive),
            1 => Some(Self::Starting),
            2 => Some(Self::Stopped),
            3 => Some(Self::Leeching),
            4 => Some(Self::Seeding),
            _ => None,
        }
    }

    /// Derive the state from the HTTP daemon's `status` and `leftUntilDone`.
    ///
    /// Nothing left to fetch means finished regardless of status.
    pub fn from_transmission(status: i64, left_until_done: i64) -> Self {
        if left_until_done == 0 {
            return Self::Finished;
        }
        match status {
            3 | 4 => Self::Downloading,
            _ => Self::Added,
        }
    }

    /// Completion predicate: the download phase is over.
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Seeding | Self::Finished)
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TorrentState::Inactive => "inactive",
            TorrentState::Starting => "starting",
            TorrentState::Stopped => "stopped",
            TorrentState::Leeching => "leeching",
            TorrentState::Seeding => "seeding",
            TorrentState::Added => "added",
            TorrentState::Downloading => "downloading",
            TorrentState::Finished => "finished",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// Field projection
// ---------------------------------------------------------------------------

/// A field that can be requested from `list_torrents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    Id,
    InfoHash,
    Name,
    State,
    BytesGot,
    BytesTotal,
    UploadRate,
    DownloadRate,
    DownloadDir,
}

/// Value of one projected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Handle(HandleId),
    Hash(InfoHash),
    Text(String),
    State(TorrentState),
    Number(i64),
}

/// Projection of one daemon-resident torrent, fields kept in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentRecord {
    fields: Vec<(FieldId, FieldValue)>,
}

impl TorrentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: FieldId, value: FieldValue) {
        self.fields.push((field, value));
    }

    pub fn with(mut self, field: FieldId, value: FieldValue) -> Self {
        self.push(field, value);
        self
    }

    /// Projected fields in the order they were requested.
    pub fn fields(&self) -> &[(FieldId, FieldValue)] {
        &self.fields
    }

    pub fn get(&self, field: FieldId) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(id, _)| *id == field)
            .map(|(_, value)| value)
    }

    pub fn id(&self) -> Option<HandleId> {
        match self.get(FieldId::Id)? {
            FieldValue::Handle(id) => Some(*id),
            FieldValue::Number(n) => Some(HandleId(*n)),
            _ => None,
        }
    }

    pub fn state(&self) -> Option<TorrentState> {
        match self.get(FieldId::State)? {
            FieldValue::State(state) => Some(*state),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.get(FieldId::Name)? {
            FieldValue::Text(name) => Some(name),
            _ => None,
        }
    }

    pub fn info_hash(&self) -> Option<InfoHash> {
        match self.get(FieldId::InfoHash)? {
            FieldValue::Hash(hash) => Some(*hash),
            _ => None,
        }
    }

    fn number(&self, field: FieldId) -> Option<i64> {
        match self.get(field)? {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn bytes_got(&self) -> Option<i64> {
        self.number(FieldId::BytesGot)
    }

    pub fn bytes_total(&self) -> Option<i64> {
        self.number(FieldId::BytesTotal)
    }

    pub fn upload_rate(&self) -> Option<i64> {
        self.number(FieldId::UploadRate)
    }

    pub fn download_rate(&self) -> Option<i64> {
        self.number(FieldId::DownloadRate)
    }

    /// Percentage of bytes fetched, rounded; `None` when sizes are missing
    /// or the total is still unknown.
    pub fn percent_done(&self) -> Option<u8> {
        let got = self.bytes_got()?;
        let total = self.bytes_total()?;
        if total <= 0 {
            return None;
        }
        let pct = (got as f64 / total as f64 * 100.0).round();
        Some(pct.clamp(0.0, 100.0) as u8)
    }
}

// ---------------------------------------------------------------------------
// Candidates and dedup records
// ---------------------------------------------------------------------------

/// Content handed to the daemon's add operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// Raw bencoded `.torrent` metainfo.
    Metainfo(Vec<u8>),
    /// `magnet:` URI passed through untouched.
    Magnet(String),
}

/// One row of the dedup store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub link: String,
    pub seen_at: DateTime<Utc>,
}
