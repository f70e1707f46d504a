//! A full candidate run against a fake btpd socket and a fake feed server.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use feedloader_daemon::codec::bencode::{self, Value};
use feedloader_daemon::codec::frame::{encode_message, read_frame};
use feedloader_daemon::{BtpdClient, LaunchGuard, UnixSocketTransport};
use feedloader_pipeline::{
    CandidateOutcome, Completion, DedupStore, OrchestrationError, OrchestratorConfig, Pipeline,
};
use tempfile::TempDir;

const METAINFO: &[u8] = b"d8:announce3:url4:infod4:name4:showee";

/// Serve `.torrent` bodies over HTTP, one connection per request.
fn feed_server(requests: usize) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let handle = thread::spawn(move || {
        for _ in 0..requests {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line.trim_end().is_empty() {
                    break;
                }
            }
            let mut stream = reader.into_inner();
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                METAINFO.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(METAINFO).unwrap();
        }
    });
    (base, handle)
}

fn state_row(id: i64, state: i64) -> Value {
    Value::List(vec![Value::Int(2), Value::Int(id), Value::Int(2), Value::Int(state)])
}

fn tget(rows: Vec<Value>) -> Value {
    Value::dict([("code", Value::Int(0)), ("result", Value::List(rows))])
}

/// btpd stand-in: answers a fixed script and drops a file into the
/// download directory once the torrent reports seeding.
fn fake_btpd(socket: PathBuf, download_dir: PathBuf) -> JoinHandle<Vec<String>> {
    let listener = UnixListener::bind(&socket).unwrap();
    thread::spawn(move || {
        let script = vec![
            Value::dict([("code", Value::Int(0)), ("num", Value::Int(7))]),
            Value::dict([("code", Value::Int(0))]),
            tget(vec![state_row(7, 3)]),
            tget(vec![state_row(7, 4)]),
            Value::dict([("code", Value::Int(0))]),
            tget(Vec::new()),
            Value::dict([("code", Value::Int(0))]),
        ];
        let mut commands = Vec::new();
        for response in script {
            let (mut stream, _) = listener.accept().unwrap();
            let request = bencode::decode(&read_frame(&mut stream).unwrap()).unwrap();
            let name = request.as_list().unwrap()[0].as_bytes().unwrap().to_vec();
            let name = String::from_utf8(name).unwrap();
            if name == "tget" && commands.iter().filter(|c| *c == "tget").count() == 1 {
                std::fs::write(download_dir.join("show.mkv"), b"payload").unwrap();
            }
            commands.push(name);
            stream.write_all(&encode_message(&response).unwrap()).unwrap();
        }
        commands
    })
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig {
        poll_interval: Duration::from_millis(10),
        max_wait: Duration::from_secs(30),
        shutdown_when_idle: true,
    }
}

fn open_store(dir: &Path) -> DedupStore {
    DedupStore::open(&dir.join("links.sqlite3")).unwrap()
}

#[test]
fn candidate_runs_to_cleaned_and_reports_new_files() {
    let root = TempDir::new().unwrap();
    let download_dir = root.path().join("downloads");
    std::fs::create_dir_all(&download_dir).unwrap();
    std::fs::write(download_dir.join("old.mkv"), b"").unwrap();

    let socket = root.path().join("sock");
    let daemon = fake_btpd(socket.clone(), download_dir.clone());
    let (base, feed) = feed_server(1);
    let store = open_store(root.path());
    let mut client = BtpdClient::new(UnixSocketTransport::new(&socket));

    let link = format!("{base}/show.torrent");
    let outcome = Pipeline::new(&mut client, &store, config(), &download_dir)
        .process_candidate(&link)
        .unwrap();

    let CandidateOutcome::Completed(done) = outcome else {
        panic!("expected a completed download, got {outcome:?}");
    };
    assert_eq!(done.handle.0, 7);
    assert_eq!(done.completion, Completion::Finished);
    assert_eq!(done.new_items, vec!["show.mkv"]);

    feed.join().unwrap();
    assert_eq!(
        daemon.join().unwrap(),
        vec!["add", "start", "tget", "tget", "del", "tget", "die"]
    );
}

#[test]
fn seen_link_is_skipped_without_touching_the_daemon() {
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    assert!(!store.has_seen("http://127.0.0.1:1/show.torrent").unwrap());

    let mut client = BtpdClient::new(UnixSocketTransport::new(root.path().join("no-sock")));
    let mut pipeline = Pipeline::new(&mut client, &store, config(), root.path().join("dl"));

    let outcome = pipeline
        .process_candidate("http://127.0.0.1:1/show.torrent")
        .unwrap();
    assert_eq!(outcome, CandidateOutcome::AlreadySeen);
}

#[test]
fn batch_collects_failures_and_keeps_going() {
    let root = TempDir::new().unwrap();
    let store = open_store(root.path());
    let mut client = BtpdClient::new(UnixSocketTransport::new(root.path().join("no-sock")));
    let mut pipeline = Pipeline::new(&mut client, &store, config(), root.path().join("dl"));

    let report = pipeline.process_batch([
        "magnet:?xt=urn:btih:abc",
        "",
        "gopher://old/x.torrent",
        "magnet:?xt=urn:btih:abc",
    ]);

    assert_eq!(report.skipped, vec!["magnet:?xt=urn:btih:abc"]);
    assert_eq!(report.failures.len(), 2);
    assert!(report.completed.is_empty());
    assert!(!report.is_success());
    assert!(matches!(report.failures[0].1, OrchestrationError::Client(_)));
    assert!(matches!(report.failures[1].1, OrchestrationError::Fetch(_)));
    assert_eq!(store.count().unwrap(), 2);
}

/// btpd stand-in that really exits on `die`: the socket disappears until
/// the launch command drops `marker`, then it serves the next session.
fn restartable_btpd(socket: PathBuf, marker: PathBuf, handles: Vec<i64>) -> JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let mut commands = Vec::new();
        for (session, handle) in handles.into_iter().enumerate() {
            if session > 0 {
                let deadline = Instant::now() + Duration::from_secs(10);
                while !marker.exists() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(5));
                }
                std::fs::remove_file(&marker).unwrap();
            }
            let listener = UnixListener::bind(&socket).unwrap();
            let script = vec![
                tget(Vec::new()),
                Value::dict([("code", Value::Int(0)), ("num", Value::Int(handle))]),
                Value::dict([("code", Value::Int(0))]),
                tget(vec![state_row(handle, 4)]),
                Value::dict([("code", Value::Int(0))]),
                tget(Vec::new()),
                Value::dict([("code", Value::Int(0))]),
            ];
            for response in script {
                let (mut stream, _) = listener.accept().unwrap();
                let request = bencode::decode(&read_frame(&mut stream).unwrap()).unwrap();
                let name = request.as_list().unwrap()[0].as_bytes().unwrap().to_vec();
                commands.push(String::from_utf8(name).unwrap());
                stream.write_all(&encode_message(&response).unwrap()).unwrap();
            }
            drop(listener);
            std::fs::remove_file(&socket).unwrap();
        }
        commands
    })
}

#[test]
fn daemon_shut_down_by_one_candidate_is_relaunched_for_the_next() {
    let root = TempDir::new().unwrap();
    let download_dir = root.path().join("downloads");
    let socket = root.path().join("sock");
    let marker = root.path().join("launched");

    let daemon = restartable_btpd(socket.clone(), marker.clone(), vec![7, 8]);
    while !socket.exists() {
        thread::sleep(Duration::from_millis(5));
    }
    let (base, feed) = feed_server(2);
    let store = open_store(root.path());
    let mut client = BtpdClient::new(UnixSocketTransport::new(&socket));
    let launcher = LaunchGuard::new(
        "sh",
        vec!["-c".to_string(), format!("touch '{}'", marker.display())],
    )
    .with_attempts(200)
    .with_backoff(Duration::from_millis(20));

    let report = Pipeline::new(&mut client, &store, config(), &download_dir)
        .with_launcher(launcher)
        .process_batch([format!("{base}/a.torrent"), format!("{base}/b.torrent")]);

    assert!(report.is_success(), "failures: {:?}", report.failures);
    let handles: Vec<i64> = report.completed.iter().map(|done| done.handle.0).collect();
    assert_eq!(handles, vec![7, 8]);

    feed.join().unwrap();
    let session = ["tget", "add", "start", "tget", "del", "tget", "die"];
    assert_eq!(daemon.join().unwrap(), [session, session].concat());
}
