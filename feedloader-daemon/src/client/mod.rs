//! Protocol-level daemon operations with one contract for both daemon kinds.

pub mod btpd;
pub mod transmission;

use std::path::Path;

use feedloader_core::{DaemonSettings, FieldId, HandleId, Settings, TorrentRecord, TorrentSource};

use crate::error::ClientError;
use crate::transport::{HttpTransport, UnixSocketTransport};

pub use btpd::BtpdClient;
pub use transmission::TransmissionClient;

/// Control surface of a local download daemon.
///
/// Every call is one fresh round trip; nothing is cached between calls.
pub trait DaemonClient {
    /// Short label for logs (`btpd`, `transmission`).
    fn kind(&self) -> &'static str;

    /// Submit new content, returning the daemon-assigned handle.
    fn add_torrent(
        &mut self,
        source: &TorrentSource,
        destination: &Path,
    ) -> Result<HandleId, ClientError>;

    /// Query every known torrent, projecting `fields` in the given order.
    fn list_torrents(&mut self, fields: &[FieldId]) -> Result<Vec<TorrentRecord>, ClientError>;

    fn start_torrent(&mut self, id: HandleId) -> Result<(), ClientError>;

    fn delete_torrent(&mut self, id: HandleId) -> Result<(), ClientError>;

    /// Activate every torrent the daemon tracks.
    fn start_all(&mut self) -> Result<(), ClientError>;

    /// Deactivate every torrent without removing any.
    fn stop_all(&mut self) -> Result<(), ClientError>;

    fn set_rate_limits(&mut self, upload_kbs: u32, download_kbs: u32) -> Result<(), ClientError>;

    fn shutdown(&mut self) -> Result<(), ClientError>;

    /// Lightweight liveness query. Never fails; errors read as `false`.
    fn is_reachable(&mut self) -> bool;

    /// Delete every torrent whose state satisfies the completion predicate.
    fn remove_finished(&mut self) -> Result<Vec<HandleId>, ClientError> {
        let finished: Vec<HandleId> = self
            .list_torrents(&[FieldId::Id, FieldId::State])?
            .iter()
            .filter(|record| record.state().is_some_and(|state| state.is_complete()))
            .filter_map(TorrentRecord::id)
            .collect();
        for id in &finished {
            self.delete_torrent(*id)?;
        }
        Ok(finished)
    }
}

impl<C: DaemonClient + ?Sized> DaemonClient for Box<C> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn add_torrent(
        &mut self,
        source: &TorrentSource,
        destination: &Path,
    ) -> Result<HandleId, ClientError> {
        (**self).add_torrent(source, destination)
    }

    fn list_torrents(&mut self, fields: &[FieldId]) -> Result<Vec<TorrentRecord>, ClientError> {
        (**self).list_torrents(fields)
    }

    fn start_torrent(&mut self, id: HandleId) -> Result<(), ClientError> {
        (**self).start_torrent(id)
    }

    fn delete_torrent(&mut self, id: HandleId) -> Result<(), ClientError> {
        (**self).delete_torrent(id)
    }

    fn start_all(&mut self) -> Result<(), ClientError> {
        (**self).start_all()
    }

    fn stop_all(&mut self) -> Result<(), ClientError> {
        (**self).stop_all()
    }

    fn set_rate_limits(&mut self, upload_kbs: u32, download_kbs: u32) -> Result<(), ClientError> {
        (**self).set_rate_limits(upload_kbs, download_kbs)
    }

    fn shutdown(&mut self) -> Result<(), ClientError> {
        (**self).shutdown()
    }

    fn is_reachable(&mut self) -> bool {
        (**self).is_reachable()
    }

    fn remove_finished(&mut self) -> Result<Vec<HandleId>, ClientError> {
        (**self).remove_finished()
    }
}

/// Build the client selected by `settings.daemon`.
pub fn connect(settings: &Settings, home: &Path) -> Box<dyn DaemonClient> {
    match &settings.daemon {
        DaemonSettings::Btpd { .. } => {
            let socket = settings
                .btpd_socket_at(home)
                .unwrap_or_else(|| feedloader_core::paths::default_btpd_socket(home));
            Box::new(BtpdClient::new(UnixSocketTransport::new(socket)))
        }
        DaemonSettings::Transmission { url } => {
            Box::new(TransmissionClient::new(HttpTransport::new(url)))
        }
    }
}
