//! In-process fake daemons speaking the real wire formats.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use feedloader_daemon::codec::bencode::{self, Value};
use feedloader_daemon::codec::frame::{encode_message, read_frame};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// btpd over a Unix socket
// ---------------------------------------------------------------------------

pub struct FakeBtpd {
    pub socket: PathBuf,
    handle: JoinHandle<Vec<Value>>,
    _dir: TempDir,
}

impl FakeBtpd {
    /// Serve one connection per scripted response, recording each request.
    pub fn spawn(responses: Vec<Value>) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let socket = dir.path().join("sock");
        let listener = UnixListener::bind(&socket).expect("bind fake btpd");
        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let payload = read_frame(&mut stream).expect("request frame");
                requests.push(bencode::decode(&payload).expect("bencoded request"));
                stream
                    .write_all(&encode_message(&response).expect("encode response"))
                    .expect("write response");
            }
            requests
        });
        Self {
            socket,
            handle,
            _dir: dir,
        }
    }

    /// Wait for the script to finish and return the recorded requests.
    pub fn requests(self) -> Vec<Value> {
        self.handle.join().expect("fake btpd thread")
    }
}

pub fn ok() -> Value {
    Value::dict([("code", Value::Int(0))])
}

pub fn code(code: i64) -> Value {
    Value::dict([("code", Value::Int(code))])
}

/// `tget` reply; each row is a list of `(type, value)` pairs already flattened.
pub fn tget_reply(rows: Vec<Vec<Value>>) -> Value {
    Value::dict([
        ("code", Value::Int(0)),
        ("result", Value::List(rows.into_iter().map(Value::List).collect())),
    ])
}

pub fn num(n: i64) -> [Value; 2] {
    [Value::Int(2), Value::Int(n)]
}

pub fn command_name(request: &Value) -> String {
    let name = request.as_list().expect("command list")[0]
        .as_bytes()
        .expect("command name");
    String::from_utf8(name.to_vec()).expect("utf8 command")
}

// ---------------------------------------------------------------------------
// Transmission over HTTP
// ---------------------------------------------------------------------------

pub struct Canned {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Canned {
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn success(arguments: serde_json::Value) -> Self {
        Self::json(serde_json::json!({ "result": "success", "arguments": arguments }))
    }

    pub fn conflict(session_id: &str) -> Self {
        Self {
            status: 409,
            headers: vec![(
                "X-Transmission-Session-Id".to_string(),
                session_id.to_string(),
            )],
            body: "<h1>409: Conflict</h1>".to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub session_id: Option<String>,
    pub body: serde_json::Value,
}

pub struct FakeHttp {
    pub url: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl FakeHttp {
    pub fn spawn(responses: Vec<Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake http");
        let url = format!(
            "http://127.0.0.1:{}/transmission/rpc",
            listener.local_addr().expect("addr").port()
        );
        let handle = thread::spawn(move || {
            let mut recorded = Vec::new();
            for canned in responses {
                let (stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream);
                let mut session_id = None;
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("header line");
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        let value = value.trim().to_string();
                        match name.to_ascii_lowercase().as_str() {
                            "content-length" => content_length = value.parse().expect("length"),
                            "x-transmission-session-id" => session_id = Some(value),
                            _ => {}
                        }
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).expect("body");
                recorded.push(Recorded {
                    session_id,
                    body: serde_json::from_slice(&body).expect("json body"),
                });

                let mut response = format!(
                    "HTTP/1.1 {} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                    canned.status,
                    canned.body.len()
                );
                for (name, value) in &canned.headers {
                    response.push_str(&format!("{name}: {value}\r\n"));
                }
                response.push_str("\r\n");
                response.push_str(&canned.body);
                let mut stream = reader.into_inner();
                stream.write_all(response.as_bytes()).expect("write response");
                stream.flush().expect("flush");
            }
            recorded
        });
        Self { url, handle }
    }

    pub fn requests(self) -> Vec<Recorded> {
        self.handle.join().expect("fake http thread")
    }
}
