//! Connect-per-call JSON RPC transport with session-id negotiation.
//!
//! The daemon answers the first request of every session with HTTP 409 and
//! a fresh id in [`SESSION_HEADER`]. The id is kept on the transport and
//! replayed on every later request; a 409 on the replay is fatal.

use std::time::Duration;

use serde_json::Value;

use crate::codec::json::{RpcRequest, RpcResponse};
use crate::error::{ClientError, ProtocolError, TransportError};

pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Percent-escape characters the URL parser refuses but feeds emit
/// unescaped (square brackets in file names).
pub fn sanitize_url(raw: &str) -> String {
    raw.trim().replace('[', "%5B").replace(']', "%5D")
}

enum Exchange {
    Done(Value),
    Renegotiate,
}

#[derive(Debug)]
pub struct HttpTransport {
    url: String,
    agent: ureq::Agent,
    session_id: Option<String>,
    next_tag: u64,
}

impl HttpTransport {
    pub fn new(url: &str) -> Self {
        Self {
            url: sanitize_url(url),
            agent: ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build(),
            session_id: None,
            next_tag: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Invoke `method` and return the response's `arguments` object.
    ///
    /// Retries exactly once when the daemon hands out a new session id.
    pub fn call(&mut self, method: &str, arguments: Value) -> Result<Value, ClientError> {
        let request = RpcRequest::new(method, self.next_tag, arguments);
        self.next_tag += 1;
        let body = request.to_body()?;
        tracing::trace!(method, tag = request.tag, "rpc request");

        match self.exchange(&body)? {
            Exchange::Done(arguments) => Ok(arguments),
            Exchange::Renegotiate => match self.exchange(&body)? {
                Exchange::Done(arguments) => Ok(arguments),
                Exchange::Renegotiate => Err(ProtocolError::DoubleNegotiationFailure.into()),
            },
        }
    }

    fn exchange(&mut self, body: &str) -> Result<Exchange, ClientError> {
        let mut request = self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json");
        if let Some(id) = &self.session_id {
            request = request.set(SESSION_HEADER, id);
        }

        match request.send_string(body) {
            Ok(response) => {
                if response.status() != 200 {
                    return Err(ProtocolError::UnexpectedStatus {
                        status: response.status(),
                    }
                    .into());
                }
                let text = response.into_string().map_err(|source| TransportError::Io {
                    endpoint: self.url.clone(),
                    source,
                })?;
                let arguments = RpcResponse::parse(&text)?.into_arguments()?;
                Ok(Exchange::Done(arguments))
            }
            Err(ureq::Error::Status(409, response)) => {
                let Some(id) = response.header(SESSION_HEADER) else {
                    return Err(ProtocolError::MalformedFrame(format!(
                        "409 response without {SESSION_HEADER}"
                    ))
                    .into());
                };
                tracing::debug!(url = %self.url, "daemon issued a new session id");
                self.session_id = Some(id.to_string());
                Ok(Exchange::Renegotiate)
            }
            Err(ureq::Error::Status(status, _)) => {
                Err(ProtocolError::UnexpectedStatus { status }.into())
            }
            Err(ureq::Error::Transport(transport)) => Err(match transport.kind() {
                ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => {
                    TransportError::Unreachable {
                        endpoint: self.url.clone(),
                        reason: transport.to_string(),
                    }
                }
                _ => TransportError::Io {
                    endpoint: self.url.clone(),
                    source: std::io::Error::other(transport.to_string()),
                },
            }
            .into()),
        }
    }
}
