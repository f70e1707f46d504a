//! Client for the btpd daemon: bencoded command lists over a Unix socket.
//!
//! Requests are lists headed by the command name (`["tget", {...}]`);
//! responses are dictionaries carrying a numeric `code` (0 on success)
//! plus command-specific keys.

use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use feedloader_core::{
    FieldId, FieldValue, HandleId, InfoHash, TorrentRecord, TorrentSource, TorrentState,
};

use crate::codec::bencode::{self, Value};
use crate::codec::frame::decode_payload;
use crate::error::{ClientError, DaemonError, ProtocolError};
use crate::transport::UnixSocketTransport;

use super::DaemonClient;

/// Type tag btpd attaches to a field it could not produce.
const IPC_TYPE_ERR: i64 = 0;

/// btpd `TVAL_*` key for a projected field.
fn tval(field: FieldId) -> i64 {
    match field {
        FieldId::BytesGot => 0,
        FieldId::BytesTotal => 1,
        FieldId::DownloadDir => 2,
        FieldId::Name => 3,
        FieldId::Id => 4,
        FieldId::InfoHash => 5,
        FieldId::DownloadRate => 10,
        FieldId::UploadRate => 11,
        FieldId::State => 14,
    }
}

#[derive(Debug, Clone)]
pub struct BtpdClient {
    transport: UnixSocketTransport,
}

impl BtpdClient {
    pub fn new(transport: UnixSocketTransport) -> Self {
        Self { transport }
    }

    pub fn socket_path(&self) -> &Path {
        self.transport.path()
    }

    fn execute(&self, command: Value) -> Result<Value, ClientError> {
        let name = command
            .as_list()
            .and_then(|items| items.first())
            .and_then(Value::as_bytes)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();
        tracing::debug!(command = %name, socket = %self.transport.path().display(), "btpd request");

        let payload = self.transport.call(&bencode::encode(&command))?;
        let response = decode_payload(&payload)?;
        let code = response
            .get("code")
            .and_then(Value::as_int)
            .ok_or_else(|| malformed("response without numeric `code`"))?;
        if code != 0 {
            tracing::debug!(command = %name, code, "btpd rejected request");
            return Err(DaemonError::from_code(code).into());
        }
        Ok(response)
    }

    fn simple(&self, command: &str, args: Vec<Value>) -> Result<(), ClientError> {
        let mut items = vec![Value::str(command)];
        items.extend(args);
        self.execute(Value::List(items)).map(|_| ())
    }
}

impl DaemonClient for BtpdClient {
    fn kind(&self) -> &'static str {
        "btpd"
    }

    fn add_torrent(
        &mut self,
        source: &TorrentSource,
        destination: &Path,
    ) -> Result<HandleId, ClientError> {
        let TorrentSource::Metainfo(torrent) = source else {
            // btpd only accepts metainfo files.
            return Err(DaemonError::BadTorrent.into());
        };
        if destination.is_relative() {
            return Err(DaemonError::BadContentDir.into());
        }

        let command = Value::List(vec![
            Value::str("add"),
            Value::dict([
                ("content", Value::Bytes(destination.as_os_str().as_bytes().to_vec())),
                ("name", Value::str(&format!("t{}", unix_seconds_now()))),
                ("torrent", Value::Bytes(torrent.clone())),
            ]),
        ]);
        let response = self.execute(command)?;
        response
            .get("num")
            .and_then(Value::as_int)
            .map(HandleId)
            .ok_or_else(|| malformed("add response without `num`"))
    }

    fn list_torrents(&mut self, fields: &[FieldId]) -> Result<Vec<TorrentRecord>, ClientError> {
        let keys = fields.iter().map(|field| Value::Int(tval(*field))).collect();
        let command = Value::List(vec![
            Value::str("tget"),
            Value::dict([("from", Value::Int(0)), ("keys", Value::List(keys))]),
        ]);
        let response = self.execute(command)?;
        let Some(rows) = response.get("result") else {
            return Ok(Vec::new());
        };
        let rows = rows
            .as_list()
            .ok_or_else(|| malformed("tget `result` is not a list"))?;

        rows.iter().map(|row| project_row(row, fields)).collect()
    }

    fn start_torrent(&mut self, id: HandleId) -> Result<(), ClientError> {
        self.simple("start", vec![Value::Int(id.0)])
    }

    fn delete_torrent(&mut self, id: HandleId) -> Result<(), ClientError> {
        self.simple("del", vec![Value::Int(id.0)])
    }

    fn start_all(&mut self) -> Result<(), ClientError> {
        self.simple("start-all", Vec::new())
    }

    fn stop_all(&mut self) -> Result<(), ClientError> {
        self.simple("stop-all", Vec::new())
    }

    fn set_rate_limits(&mut self, upload_kbs: u32, download_kbs: u32) -> Result<(), ClientError> {
        self.simple(
            "rate",
            vec![
                Value::Int(i64::from(upload_kbs) * 1024),
                Value::Int(i64::from(download_kbs) * 1024),
            ],
        )
    }

    fn shutdown(&mut self) -> Result<(), ClientError> {
        self.simple("die", Vec::new())
    }

    fn is_reachable(&mut self) -> bool {
        match self.list_torrents(&[FieldId::State]) {
            Ok(_) => true,
            Err(err) => {
                tracing::debug!(error = %err, "btpd liveness probe failed");
                false
            }
        }
    }
}

/// Strip the `(type, value)` pairing of one tget row, keeping request order.
fn project_row(row: &Value, fields: &[FieldId]) -> Result<TorrentRecord, ClientError> {
    let items = row
        .as_list()
        .ok_or_else(|| malformed("tget row is not a list"))?;
    if items.len() != fields.len() * 2 {
        return Err(malformed(&format!(
            "tget row has {} items for {} fields",
            items.len(),
            fields.len()
        )));
    }

    let mut record = TorrentRecord::new();
    for (field, pair) in fields.iter().zip(items.chunks_exact(2)) {
        if pair[0].as_int() == Some(IPC_TYPE_ERR) {
            tracing::debug!(field = ?field, "btpd could not produce field");
            continue;
        }
        record.push(*field, field_value(*field, &pair[1])?);
    }
    Ok(record)
}

fn field_value(field: FieldId, value: &Value) -> Result<FieldValue, ClientError> {
    let mismatch = || malformed(&format!("unexpected value type for {field:?}"));
    let converted = match field {
        FieldId::Id => FieldValue::Handle(HandleId(value.as_int().ok_or_else(mismatch)?)),
        FieldId::State => {
            let code = value.as_int().ok_or_else(mismatch)?;
            let state = TorrentState::from_btpd_code(code)
                .ok_or_else(|| malformed(&format!("unknown torrent state {code}")))?;
            FieldValue::State(state)
        }
        FieldId::InfoHash => {
            let bytes = value.as_bytes().ok_or_else(mismatch)?;
            FieldValue::Hash(InfoHash::from_slice(bytes).ok_or_else(mismatch)?)
        }
        FieldId::Name | FieldId::DownloadDir => {
            let bytes = value.as_bytes().ok_or_else(mismatch)?;
            FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
        FieldId::BytesGot | FieldId::BytesTotal | FieldId::UploadRate | FieldId::DownloadRate => {
            FieldValue::Number(value.as_int().ok_or_else(mismatch)?)
        }
    };
    Ok(converted)
}

fn malformed(message: &str) -> ClientError {
    ProtocolError::MalformedFrame(message.to_string()).into()
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_row_strips_type_tags_in_request_order() {
        let row = Value::List(vec![
            Value::Int(2),
            Value::Int(7),
            Value::Int(2),
            Value::Int(4),
            Value::Int(3),
            Value::str("show.mkv"),
        ]);
        let fields = [FieldId::Id, FieldId::State, FieldId::Name];
        let record = project_row(&row, &fields).unwrap();

        assert_eq!(
            record.fields(),
            &[
                (FieldId::Id, FieldValue::Handle(HandleId(7))),
                (FieldId::State, FieldValue::State(TorrentState::Seeding)),
                (FieldId::Name, FieldValue::Text("show.mkv".into())),
            ]
        );
    }

    #[test]
    fn project_row_skips_error_tagged_fields() {
        let row = Value::List(vec![Value::Int(2), Value::Int(1), Value::Int(0), Value::Int(8)]);
        let record = project_row(&row, &[FieldId::Id, FieldId::InfoHash]).unwrap();
        assert_eq!(record.id(), Some(HandleId(1)));
        assert_eq!(record.info_hash(), None);
    }

    #[test]
    fn project_row_rejects_length_mismatch() {
        let row = Value::List(vec![Value::Int(2), Value::Int(1)]);
        let err = project_row(&row, &[FieldId::Id, FieldId::State]).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::MalformedFrame(_))
        ));
    }

    #[test]
    fn unknown_state_code_is_malformed() {
        let err = field_value(FieldId::State, &Value::Int(42)).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::MalformedFrame(_))
        ));
    }
}
