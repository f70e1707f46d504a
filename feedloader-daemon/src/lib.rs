//! Daemon control: wire codecs, transports, protocol clients, launch guard.
//!
//! Two daemon kinds share one [`DaemonClient`] contract:
//! - [`BtpdClient`]: length-prefixed bencode over a Unix socket
//! - [`TransmissionClient`]: session-negotiated JSON over HTTP

pub mod client;
pub mod codec;
mod error;
pub mod launch;
pub mod transport;

pub use client::{connect, BtpdClient, DaemonClient, TransmissionClient};
pub use error::{ClientError, DaemonError, ProtocolError, TransportError};
pub use launch::{LaunchGuard, LaunchOutcome};
pub use transport::{sanitize_url, HttpTransport, UnixSocketTransport};
