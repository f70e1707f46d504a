//! Socket framing: a 4-byte little-endian length followed by exactly that many
//! bytes of bencoded payload.

use std::io::{ErrorKind, Read, Write};

use crate::error::{ClientError, ProtocolError, TransportError};

use super::bencode::{self, Value};

/// Upper bound on one frame; anything larger is treated as garbage.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

pub const LENGTH_PREFIX_LEN: usize = 4;

/// Prefix `payload` with its little-endian `u32` length.
pub fn frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            ProtocolError::MalformedFrame(format!("payload of {} bytes too large", payload.len()))
        })?;
    let mut out = Vec::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), ClientError> {
    let framed = frame(payload)?;
    writer.write_all(&framed).map_err(frame_io)?;
    writer.flush().map_err(frame_io)?;
    Ok(())
}

/// Read one frame.
///
/// A missing or zero length prefix is a protocol error; a payload cut short
/// by EOF is a truncated transport.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, ClientError> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let got = read_until_eof(reader, &mut prefix)?;
    if got < LENGTH_PREFIX_LEN {
        return Err(ProtocolError::MalformedFrame(format!(
            "length prefix missing ({got} of {LENGTH_PREFIX_LEN} bytes)"
        ))
        .into());
    }
    let len = u32::from_le_bytes(prefix) as usize;
    if len == 0 {
        return Err(ProtocolError::MalformedFrame("zero-length frame".to_string()).into());
    }
    if len > MAX_FRAME_LEN {
        return Err(
            ProtocolError::MalformedFrame(format!("declared length {len} exceeds limit")).into(),
        );
    }

    let mut payload = vec![0u8; len];
    let received = read_until_eof(reader, &mut payload)?;
    if received < len {
        return Err(TransportError::Truncated {
            expected: len,
            received,
        }
        .into());
    }
    Ok(payload)
}

/// Bencode `value` and frame it.
pub fn encode_message(value: &Value) -> Result<Vec<u8>, ProtocolError> {
    frame(&bencode::encode(value))
}

/// Parse a complete framed buffer back into its value.
pub fn decode_message(bytes: &[u8]) -> Result<Value, ClientError> {
    let mut cursor = bytes;
    let payload = read_frame(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(ProtocolError::MalformedFrame(format!(
            "{} bytes after frame",
            cursor.len()
        ))
        .into());
    }
    decode_payload(&payload)
}

pub fn decode_payload(payload: &[u8]) -> Result<Value, ClientError> {
    bencode::decode(payload)
        .map_err(|err| ProtocolError::MalformedFrame(err.to_string()).into())
}

fn read_until_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ClientError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(frame_io(err)),
        }
    }
    Ok(filled)
}

fn frame_io(source: std::io::Error) -> ClientError {
    TransportError::Io {
        endpoint: "frame".to_string(),
        source,
    }
    .into()
}
