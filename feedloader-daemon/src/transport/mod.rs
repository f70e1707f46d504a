//! Single request / single response exchanges with the local daemon.

pub mod http;
pub mod unix;

pub use http::{sanitize_url, HttpTransport, SESSION_HEADER};
pub use unix::UnixSocketTransport;
