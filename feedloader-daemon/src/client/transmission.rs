//! Client for the Transmission daemon's JSON RPC.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Map, Value};

use feedloader_core::{
    FieldId, FieldValue, HandleId, InfoHash, TorrentRecord, TorrentSource, TorrentState,
};

use crate::error::{ClientError, DaemonError, ProtocolError};
use crate::transport::HttpTransport;

use super::DaemonClient;

/// `torrent-add` result string for unparseable metainfo.
const BAD_TORRENT_RESULT: &str = "invalid or corrupt torrent file";

/// Names of the `torrent-get` fields backing one projected field.
fn rpc_fields(field: FieldId) -> &'static [&'static str] {
    match field {
        FieldId::Id => &["id"],
        FieldId::InfoHash => &["hashString"],
        FieldId::Name => &["name"],
        FieldId::State => &["status", "leftUntilDone"],
        FieldId::BytesGot => &["haveValid"],
        FieldId::BytesTotal => &["sizeWhenDone"],
        FieldId::UploadRate => &["rateUpload"],
        FieldId::DownloadRate => &["rateDownload"],
        FieldId::DownloadDir => &["downloadDir"],
    }
}

#[derive(Debug)]
pub struct TransmissionClient {
    transport: HttpTransport,
}

impl TransmissionClient {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    fn request(&mut self, method: &str, arguments: Value) -> Result<Value, ClientError> {
        tracing::debug!(method, url = %self.transport.url(), "transmission request");
        self.transport.call(method, arguments)
    }
}

impl DaemonClient for TransmissionClient {
    fn kind(&self) -> &'static str {
        "transmission"
    }

    fn add_torrent(
        &mut self,
        source: &TorrentSource,
        destination: &Path,
    ) -> Result<HandleId, ClientError> {
        if let Err(err) = std::fs::create_dir_all(destination) {
            tracing::warn!(dir = %destination.display(), error = %err, "cannot create download dir");
            return Err(DaemonError::CreateDirFailed.into());
        }

        self.request(
            "session-set",
            json!({ "download-dir": destination.display().to_string() }),
        )?;

        let arguments = match source {
            TorrentSource::Metainfo(bytes) => json!({ "metainfo": STANDARD.encode(bytes) }),
            TorrentSource::Magnet(uri) => json!({ "filename": uri }),
        };
        let response = match self.request("torrent-add", arguments) {
            Err(ClientError::Protocol(ProtocolError::Rejected { result }))
                if result.contains(BAD_TORRENT_RESULT) =>
            {
                return Err(DaemonError::BadTorrent.into());
            }
            other => other?,
        };

        if let Some(id) = response
            .get("torrent-added")
            .and_then(|added| added.get("id"))
            .and_then(Value::as_i64)
        {
            return Ok(HandleId(id));
        }
        if response.get("torrent-duplicate").is_some() {
            return Err(DaemonError::EntryExists.into());
        }
        Err(
            ProtocolError::MalformedFrame("torrent-add response without torrent id".to_string())
                .into(),
        )
    }

    fn list_torrents(&mut self, fields: &[FieldId]) -> Result<Vec<TorrentRecord>, ClientError> {
        let mut names: Vec<&str> = Vec::new();
        for name in fields.iter().flat_map(|field| rpc_fields(*field).iter().copied()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        let response = self.request("torrent-get", json!({ "fields": names }))?;
        let Some(torrents) = response.get("torrents") else {
            return Ok(Vec::new());
        };
        let torrents = torrents.as_array().ok_or_else(|| {
            ProtocolError::MalformedFrame("`torrents` is not an array".to_string())
        })?;

        torrents
            .iter()
            .map(|torrent| -> Result<TorrentRecord, ClientError> {
                let object = torrent.as_object().ok_or_else(|| {
                    ProtocolError::MalformedFrame("torrent entry is not an object".to_string())
                })?;
                Ok(project_object(object, fields))
            })
            .collect()
    }

    fn start_torrent(&mut self, id: HandleId) -> Result<(), ClientError> {
        self.request("torrent-start", json!({ "ids": [id.0] }))
            .map(|_| ())
    }

    // Omitting `ids` addresses every torrent.
    fn start_all(&mut self) -> Result<(), ClientError> {
        self.request("torrent-start", json!({})).map(|_| ())
    }

    fn stop_all(&mut self) -> Result<(), ClientError> {
        self.request("torrent-stop", json!({})).map(|_| ())
    }

    fn delete_torrent(&mut self, id: HandleId) -> Result<(), ClientError> {
        self.request(
            "torrent-remove",
            json!({ "ids": [id.0], "delete-local-data": false }),
        )
        .map(|_| ())
    }

    fn set_rate_limits(&mut self, upload_kbs: u32, download_kbs: u32) -> Result<(), ClientError> {
        self.request(
            "session-set",
            json!({
                "speed-limit-up": upload_kbs,
                "speed-limit-up-enabled": true,
                "speed-limit-down": download_kbs,
                "speed-limit-down-enabled": true,
            }),
        )
        .map(|_| ())
    }

    fn shutdown(&mut self) -> Result<(), ClientError> {
        self.request("session-close", Value::Null).map(|_| ())
    }

    fn is_reachable(&mut self) -> bool {
        match self.request("session-get", Value::Null) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "transmission liveness probe failed");
                false
            }
        }
    }
}

/// Project one `torrent-get` object; absent or mistyped fields are skipped.
fn project_object(object: &Map<String, Value>, fields: &[FieldId]) -> TorrentRecord {
    let int = |key: &str| object.get(key).and_then(Value::as_i64);
    let text = |key: &str| object.get(key).and_then(Value::as_str);

    let mut record = TorrentRecord::new();
    for field in fields {
        let value = match field {
            FieldId::Id => int("id").map(|id| FieldValue::Handle(HandleId(id))),
            FieldId::InfoHash => text("hashString")
                .and_then(InfoHash::from_hex)
                .map(FieldValue::Hash),
            FieldId::Name => text("name").map(|name| FieldValue::Text(name.to_string())),
            FieldId::DownloadDir => {
                text("downloadDir").map(|dir| FieldValue::Text(dir.to_string()))
            }
            FieldId::State => int("status")
                .zip(int("leftUntilDone"))
                .map(|(status, left)| {
                    FieldValue::State(TorrentState::from_transmission(status, left))
                }),
            FieldId::BytesGot => int("haveValid").map(FieldValue::Number),
            FieldId::BytesTotal => int("sizeWhenDone").map(FieldValue::Number),
            FieldId::UploadRate => int("rateUpload").map(FieldValue::Number),
            FieldId::DownloadRate => int("rateDownload").map(FieldValue::Number),
        };
        if let Some(value) = value {
            record.push(*field, value);
        }
    }
    record
}
