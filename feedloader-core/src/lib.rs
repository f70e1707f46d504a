//! Feedloader core library: domain types, settings, paths, errors.
//!
//! - [`types`]: torrent records, states, field projection, candidates
//! - [`settings`]: YAML settings load / validate
//! - [`paths`]: on-disk layout under `~/.feedloader/`
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod paths;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use settings::{DaemonSettings, LaunchSettings, RateLimits, Settings};
pub use types::{
    FieldId, FieldValue, HandleId, InfoHash, LinkRecord, TorrentRecord, TorrentSource,
    TorrentState,
};
