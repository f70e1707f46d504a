//! Wire codecs for the two daemon protocols.

pub mod bencode;
pub mod frame;
pub mod json;

pub use bencode::{BencodeError, Value};
pub use json::{RpcRequest, RpcResponse};
