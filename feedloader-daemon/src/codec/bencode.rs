//! Canonical bencode: the self-describing payload encoding of the socket
//! protocol. Dictionaries are kept in a `BTreeMap` so keys always encode
//! in sorted order.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Dict(BTreeMap<Vec<u8>, Value>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BencodeError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEof(usize),
    #[error("invalid prefix byte 0x{byte:02x} at {pos}")]
    InvalidPrefix { byte: u8, pos: usize },
    #[error("invalid integer at byte {0}")]
    InvalidInt(usize),
    #[error("invalid string length at byte {0}")]
    InvalidLen(usize),
    #[error("dictionary key at byte {0} is not a string")]
    InvalidDictKey(usize),
    #[error("{0} trailing bytes after value")]
    TrailingData(usize),
    #[error("nesting deeper than {max} levels at byte {0}", max = MAX_DEPTH)]
    TooDeep(usize),
}

/// Deepest list/dictionary nesting `decode` accepts.
pub const MAX_DEPTH: usize = 64;

impl Value {
    pub fn str(text: &str) -> Self {
        Value::Bytes(text.as_bytes().to_vec())
    }

    /// Build a dictionary from string keys.
    pub fn dict<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Value::Dict(
            entries
                .into_iter()
                .map(|(key, value)| (key.as_bytes().to_vec(), value))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(map) => map.get(key.as_bytes()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::str(text)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(value, &mut out);
    out
}

pub fn encode_into(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Int(num) => {
            out.push(b'i');
            out.extend_from_slice(num.to_string().as_bytes());
            out.push(b'e');
        }
        Value::Bytes(bytes) => encode_bytes(bytes, out),
        Value::List(items) => {
            out.push(b'l');
            for item in items {
                encode_into(item, out);
            }
            out.push(b'e');
        }
        Value::Dict(map) => {
            out.push(b'd');
            for (key, value) in map {
                encode_bytes(key, out);
                encode_into(value, out);
            }
            out.push(b'e');
        }
    }
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(bytes);
}

/// Decode exactly one value spanning the whole input.
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let (value, pos) = decode_value(data, 0, 0)?;
    if pos != data.len() {
        return Err(BencodeError::TrailingData(data.len() - pos));
    }
    Ok(value)
}

fn decode_value(data: &[u8], pos: usize, depth: usize) -> Result<(Value, usize), BencodeError> {
    let Some(&prefix) = data.get(pos) else {
        return Err(BencodeError::UnexpectedEof(pos));
    };
    if matches!(prefix, b'l' | b'd') && depth >= MAX_DEPTH {
        return Err(BencodeError::TooDeep(pos));
    }
    match prefix {
        b'i' => {
            let (value, next) = decode_int(data, pos)?;
            Ok((Value::Int(value), next))
        }
        b'l' => {
            let mut items = Vec::new();
            let mut i = pos + 1;
            while i < data.len() && data[i] != b'e' {
                let (value, next) = decode_value(data, i, depth + 1)?;
                items.push(value);
                i = next;
            }
            if i >= data.len() {
                return Err(BencodeError::UnexpectedEof(i));
            }
            Ok((Value::List(items), i + 1))
        }
        b'd' => {
            let mut map = BTreeMap::new();
            let mut i = pos + 1;
            while i < data.len() && data[i] != b'e' {
                if !data[i].is_ascii_digit() {
                    return Err(BencodeError::InvalidDictKey(i));
                }
                let (key, next) = decode_bytes(data, i)?;
                let (value, next) = decode_value(data, next, depth + 1)?;
                map.insert(key, value);
                i = next;
            }
            if i >= data.len() {
                return Err(BencodeError::UnexpectedEof(i));
            }
            Ok((Value::Dict(map), i + 1))
        }
        b'0'..=b'9' => {
            let (bytes, next) = decode_bytes(data, pos)?;
            Ok((Value::Bytes(bytes), next))
        }
        byte => Err(BencodeError::InvalidPrefix { byte, pos }),
    }
}

fn decode_int(data: &[u8], pos: usize) -> Result<(i64, usize), BencodeError> {
    let start = pos + 1;
    let Some(len) = data[start..].iter().position(|&b| b == b'e') else {
        return Err(BencodeError::UnexpectedEof(data.len()));
    };
    let slice = &data[start..start + len];
    let leading_zero = slice.len() > 1 && slice[0] == b'0';
    let negative_zero = slice.len() > 1 && slice[0] == b'-' && slice[1] == b'0';
    if slice.is_empty() || leading_zero || negative_zero {
        return Err(BencodeError::InvalidInt(start));
    }
    let value = std::str::from_utf8(slice)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(BencodeError::InvalidInt(start))?;
    Ok((value, start + len + 1))
}

fn decode_bytes(data: &[u8], pos: usize) -> Result<(Vec<u8>, usize), BencodeError> {
    let digits = data[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
    let colon = pos + digits;
    if digits == 0 || data.get(colon) != Some(&b':') {
        return Err(BencodeError::InvalidLen(pos));
    }
    if digits > 1 && data[pos] == b'0' {
        return Err(BencodeError::InvalidLen(pos));
    }
    let len = std::str::from_utf8(&data[pos..colon])
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or(BencodeError::InvalidLen(pos))?;
    let start = colon + 1;
    let end = start
        .checked_add(len)
        .ok_or(BencodeError::InvalidLen(pos))?;
    if end > data.len() {
        return Err(BencodeError::UnexpectedEof(data.len()));
    }
    Ok((data[start..end].to_vec(), end))
}
