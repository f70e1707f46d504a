//! TransmissionClient against a fake HTTP daemon on a loopback port.

mod common;

use common::{Canned, FakeHttp};
use feedloader_core::{FieldId, HandleId, TorrentSource, TorrentState};
use feedloader_daemon::{
    ClientError, DaemonClient, DaemonError, HttpTransport, ProtocolError, TransmissionClient,
};
use serde_json::json;
use tempfile::TempDir;

fn client_for(fake: &FakeHttp) -> TransmissionClient {
    TransmissionClient::new(HttpTransport::new(&fake.url))
}

#[test]
fn negotiates_session_id_on_first_conflict() {
    let fake = FakeHttp::spawn(vec![
        Canned::conflict("abc123"),
        Canned::success(json!({ "version": "4.0" })),
    ]);
    let mut client = client_for(&fake);

    assert!(client.is_reachable());

    let requests = fake.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].session_id, None);
    assert_eq!(requests[1].session_id.as_deref(), Some("abc123"));
    assert_eq!(requests[0].body, requests[1].body);
    assert_eq!(requests[1].body["method"], "session-get");
}

#[test]
fn call_returns_arguments_of_the_retried_request() {
    let fake = FakeHttp::spawn(vec![
        Canned::conflict("fresh"),
        Canned::success(json!({ "download-dir": "/srv/dl", "version": "4.0" })),
    ]);
    let mut transport = HttpTransport::new(&fake.url);

    let arguments = transport.call("session-get", json!({})).expect("call");

    assert_eq!(arguments, json!({ "download-dir": "/srv/dl", "version": "4.0" }));
    assert_eq!(transport.session_id(), Some("fresh"));
    assert_eq!(fake.requests().len(), 2);
}

#[test]
fn list_after_conflict_projects_the_retried_payload() {
    let fake = FakeHttp::spawn(vec![
        Canned::conflict("fresh"),
        Canned::success(json!({
            "torrents": [{ "id": 4, "status": 6, "leftUntilDone": 0, "name": "show" }]
        })),
    ]);
    let mut client = client_for(&fake);

    let records = client
        .list_torrents(&[FieldId::Id, FieldId::State, FieldId::Name])
        .expect("list");

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), Some(HandleId(4)));
    assert_eq!(records[0].state(), Some(TorrentState::Finished));
    assert_eq!(records[0].name(), Some("show"));

    let requests = fake.requests();
    assert_eq!(requests[0].session_id, None);
    assert_eq!(requests[1].session_id.as_deref(), Some("fresh"));
}

#[test]
fn second_conflict_in_a_row_is_fatal() {
    let fake = FakeHttp::spawn(vec![Canned::conflict("one"), Canned::conflict("two")]);
    let mut client = client_for(&fake);

    let err = client.list_torrents(&[FieldId::Id]).unwrap_err();
    assert!(
        matches!(err, ClientError::Protocol(ProtocolError::DoubleNegotiationFailure)),
        "got: {err}"
    );
    fake.requests();
}

#[test]
fn session_id_is_reused_and_tags_increase() {
    let fake = FakeHttp::spawn(vec![
        Canned::conflict("sess"),
        Canned::success(json!({})),
        Canned::success(json!({})),
        Canned::success(json!({})),
    ]);
    let mut client = client_for(&fake);

    client.start_torrent(HandleId(1)).expect("start");
    client.delete_torrent(HandleId(1)).expect("remove");
    client.shutdown().expect("close");

    let requests = fake.requests();
    assert!(requests[1..]
        .iter()
        .all(|r| r.session_id.as_deref() == Some("sess")));

    let methods: Vec<&str> = requests[1..]
        .iter()
        .map(|r| r.body["method"].as_str().unwrap())
        .collect();
    assert_eq!(methods, vec!["torrent-start", "torrent-remove", "session-close"]);
    assert_eq!(requests[1].body["arguments"]["ids"], json!([1]));
    assert_eq!(requests[2].body["arguments"]["delete-local-data"], json!(false));

    let tags: Vec<u64> = requests[1..]
        .iter()
        .map(|r| r.body["tag"].as_u64().unwrap())
        .collect();
    assert!(tags.windows(2).all(|pair| pair[0] < pair[1]), "tags: {tags:?}");
}

#[test]
fn server_error_status_is_reported() {
    let fake = FakeHttp::spawn(vec![Canned::status(500)]);
    let mut client = client_for(&fake);

    let err = client.shutdown().unwrap_err();
    assert!(
        matches!(
            err,
            ClientError::Protocol(ProtocolError::UnexpectedStatus { status: 500 })
        ),
        "got: {err}"
    );
    fake.requests();
}

#[test]
fn non_success_result_is_rejected() {
    let fake = FakeHttp::spawn(vec![Canned::json(
        json!({ "result": "no such method", "arguments": {} }),
    )]);
    let mut client = client_for(&fake);

    let err = client.start_torrent(HandleId(4)).unwrap_err();
    match err {
        ClientError::Protocol(ProtocolError::Rejected { result }) => {
            assert_eq!(result, "no such method")
        }
        other => panic!("expected rejection, got {other}"),
    }
    fake.requests();
}

#[test]
fn add_sets_download_dir_then_submits_base64_metainfo() {
    let downloads = TempDir::new().unwrap();
    let target = downloads.path().join("shows");
    let fake = FakeHttp::spawn(vec![
        Canned::success(json!({})),
        Canned::success(json!({
            "torrent-added": { "id": 12, "name": "show", "hashString": "ab" }
        })),
    ]);
    let mut client = client_for(&fake);

    let handle = client
        .add_torrent(&TorrentSource::Metainfo(b"d4:infode".to_vec()), &target)
        .expect("add");
    assert_eq!(handle, HandleId(12));
    assert!(target.is_dir(), "download dir is created locally");

    let requests = fake.requests();
    assert_eq!(requests[0].body["method"], "session-set");
    assert_eq!(
        requests[0].body["arguments"]["download-dir"],
        json!(target.display().to_string())
    );
    assert_eq!(requests[1].body["method"], "torrent-add");
    assert_eq!(requests[1].body["arguments"]["metainfo"], "ZDQ6aW5mb2Rl");
}

#[test]
fn magnet_is_passed_as_filename() {
    let downloads = TempDir::new().unwrap();
    let fake = FakeHttp::spawn(vec![
        Canned::success(json!({})),
        Canned::success(json!({ "torrent-added": { "id": 2 } })),
    ]);
    let mut client = client_for(&fake);

    let magnet = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567";
    client
        .add_torrent(&TorrentSource::Magnet(magnet.into()), downloads.path())
        .expect("add");

    let requests = fake.requests();
    assert_eq!(requests[1].body["arguments"]["filename"], magnet);
    assert!(requests[1].body["arguments"].get("metainfo").is_none());
}

#[test]
fn corrupt_torrent_maps_to_bad_torrent() {
    let downloads = TempDir::new().unwrap();
    let fake = FakeHttp::spawn(vec![
        Canned::success(json!({})),
        Canned::json(json!({ "result": "invalid or corrupt torrent file", "arguments": {} })),
    ]);
    let mut client = client_for(&fake);

    let err = client
        .add_torrent(&TorrentSource::Metainfo(b"junk".to_vec()), downloads.path())
        .unwrap_err();
    assert!(matches!(err, ClientError::Daemon(DaemonError::BadTorrent)), "got: {err}");
    fake.requests();
}

#[test]
fn duplicate_torrent_maps_to_entry_exists() {
    let downloads = TempDir::new().unwrap();
    let fake = FakeHttp::spawn(vec![
        Canned::success(json!({})),
        Canned::success(json!({ "torrent-duplicate": { "id": 3 } })),
    ]);
    let mut client = client_for(&fake);

    let err = client
        .add_torrent(&TorrentSource::Metainfo(b"de".to_vec()), downloads.path())
        .unwrap_err();
    assert!(matches!(err, ClientError::Daemon(DaemonError::EntryExists)), "got: {err}");
    fake.requests();
}

#[test]
fn bulk_start_and_stop_omit_ids() {
    let fake = FakeHttp::spawn(vec![Canned::success(json!({})), Canned::success(json!({}))]);
    let mut client = client_for(&fake);

    client.start_all().expect("start all");
    client.stop_all().expect("stop all");

    let requests = fake.requests();
    assert_eq!(requests[0].body["method"], "torrent-start");
    assert_eq!(requests[1].body["method"], "torrent-stop");
    assert!(requests.iter().all(|r| r.body["arguments"].get("ids").is_none()));
}

#[test]
fn list_requests_backing_fields_and_derives_state() {
    let fake = FakeHttp::spawn(vec![Canned::success(json!({
        "torrents": [
            { "id": 1, "status": 4, "leftUntilDone": 2048, "name": "a" },
            { "id": 2, "status": 6, "leftUntilDone": 0, "name": "b" },
        ]
    }))]);
    let mut client = client_for(&fake);

    let records = client
        .list_torrents(&[FieldId::Id, FieldId::State, FieldId::Name])
        .expect("list");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].state(), Some(TorrentState::Downloading));
    assert_eq!(records[1].id(), Some(HandleId(2)));
    assert_eq!(records[1].state(), Some(TorrentState::Finished));
    assert_eq!(records[1].name(), Some("b"));

    let requests = fake.requests();
    assert_eq!(requests[0].body["method"], "torrent-get");
    assert_eq!(
        requests[0].body["arguments"]["fields"],
        json!(["id", "status", "leftUntilDone", "name"])
    );
}

#[test]
fn rate_limits_enable_both_directions() {
    let fake = FakeHttp::spawn(vec![Canned::success(json!({}))]);
    let mut client = client_for(&fake);

    client.set_rate_limits(20, 500).expect("rate");

    let args = &fake.requests()[0].body["arguments"];
    assert_eq!(args["speed-limit-up"], 20);
    assert_eq!(args["speed-limit-down"], 500);
    assert_eq!(args["speed-limit-up-enabled"], true);
    assert_eq!(args["speed-limit-down-enabled"], true);
}
