//! SPOP typed data and key/value lists.
//!
//! ```text
//! TYPED-DATA : <TYPE:4 bits><FLAGS:4 bits><DATA>
//! KV         : <NAME-LEN:varint><NAME><TYPED-DATA>
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::spop::varint::{decode_varint, encode_varint};
use crate::spop::FrameError;

const TYPE_NULL: u8 = 0;
const TYPE_BOOL: u8 = 1;
const TYPE_INT32: u8 = 2;
const TYPE_UINT32: u8 = 3;
const TYPE_INT64: u8 = 4;
const TYPE_UINT64: u8 = 5;
const TYPE_IPV4: u8 = 6;
const TYPE_IPV6: u8 = 7;
const TYPE_STRING: u8 = 8;
const TYPE_BINARY: u8 = 9;

const FLAG_TRUE: u8 = 0x10;

/// A value carried in a SPOP KV list.
///
/// `Binary` slices the frame buffer it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedData {
    Null,
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    String(String),
    Binary(Bytes),
}

impl TypedData {
    /// Short name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            TypedData::Null => "null",
            TypedData::Bool(_) => "bool",
            TypedData::Int32(_) => "int32",
            TypedData::Uint32(_) => "uint32",
            TypedData::Int64(_) => "int64",
            TypedData::Uint64(_) => "uint64",
            TypedData::Ipv4(_) => "ipv4",
            TypedData::Ipv6(_) => "ipv6",
            TypedData::String(_) => "string",
            TypedData::Binary(_) => "binary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any unsigned or non-negative integer that fits in a `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            TypedData::Uint32(v) => Some(u64::from(v)),
            TypedData::Uint64(v) => Some(v),
            TypedData::Int32(v) => u64::try_from(v).ok(),
            TypedData::Int64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            TypedData::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, FrameError> {
        if !buf.has_remaining() {
            return Err(FrameError::Truncated);
        }
        let type_byte = buf.get_u8();

        let value = match type_byte & 0x0F {
            TYPE_NULL => TypedData::Null,
            TYPE_BOOL => TypedData::Bool(type_byte & FLAG_TRUE != 0),
            TYPE_INT32 => TypedData::Int32(decode_varint(buf)? as i32),
            TYPE_UINT32 => TypedData::Uint32(decode_varint(buf)? as u32),
            TYPE_INT64 => TypedData::Int64(decode_varint(buf)? as i64),
            TYPE_UINT64 => TypedData::Uint64(decode_varint(buf)?),
            TYPE_IPV4 => TypedData::Ipv4(Ipv4Addr::from(take_array::<4>(buf)?)),
            TYPE_IPV6 => TypedData::Ipv6(Ipv6Addr::from(take_array::<16>(buf)?)),
            TYPE_STRING => {
                let raw = decode_bytes(buf)?;
                TypedData::String(String::from_utf8_lossy(&raw).into_owned())
            }
            TYPE_BINARY => TypedData::Binary(decode_bytes(buf)?),
            other => return Err(FrameError::UnknownDataType(other)),
        };

        Ok(value)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            TypedData::Null => buf.put_u8(TYPE_NULL),
            TypedData::Bool(b) => buf.put_u8(TYPE_BOOL | if *b { FLAG_TRUE } else { 0 }),
            TypedData::Int32(v) => {
                buf.put_u8(TYPE_INT32);
                encode_varint(*v as i64 as u64, buf);
            }
            TypedData::Uint32(v) => {
                buf.put_u8(TYPE_UINT32);
                encode_varint(u64::from(*v), buf);
            }
            TypedData::Int64(v) => {
                buf.put_u8(TYPE_INT64);
                encode_varint(*v as u64, buf);
            }
            TypedData::Uint64(v) => {
                buf.put_u8(TYPE_UINT64);
                encode_varint(*v, buf);
            }
            TypedData::Ipv4(addr) => {
                buf.put_u8(TYPE_IPV4);
                buf.put_slice(&addr.octets());
            }
            TypedData::Ipv6(addr) => {
                buf.put_u8(TYPE_IPV6);
                buf.put_slice(&addr.octets());
            }
            TypedData::String(s) => {
                buf.put_u8(TYPE_STRING);
                encode_bytes(s.as_bytes(), buf);
            }
            TypedData::Binary(b) => {
                buf.put_u8(TYPE_BINARY);
                encode_bytes(b, buf);
            }
        }
    }
}

/// A named message from a NOTIFY frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub name: String,
    pub args: Vec<(String, TypedData)>,
}

impl Message {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Builder-style helper, mostly for tests and clients.
    pub fn with_arg(mut self, name: impl Into<String>, value: TypedData) -> Self {
        self.args.push((name.into(), value));
        self
    }

    /// First argument called `name`.
    pub fn arg(&self, name: &str) -> Option<&TypedData> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Decode KV entries until the buffer is exhausted.
pub fn decode_kv_list(buf: &mut Bytes) -> Result<Vec<(String, TypedData)>, FrameError> {
    let mut list = Vec::new();
    while buf.has_remaining() {
        list.push(decode_kv(buf)?);
    }
    Ok(list)
}

pub fn decode_kv(buf: &mut Bytes) -> Result<(String, TypedData), FrameError> {
    let name = decode_string(buf)?;
    let value = TypedData::decode(buf)?;
    Ok((name, value))
}

pub fn encode_kv(name: &str, value: &TypedData, buf: &mut BytesMut) {
    encode_bytes(name.as_bytes(), buf);
    value.encode(buf);
}

/// Length-prefixed string without a type byte (KV names, message names).
pub fn decode_string(buf: &mut Bytes) -> Result<String, FrameError> {
    let raw = decode_bytes(buf)?;
    String::from_utf8(raw.to_vec()).map_err(|_| FrameError::InvalidUtf8)
}

pub fn encode_bytes(bytes: &[u8], buf: &mut BytesMut) {
    encode_varint(bytes.len() as u64, buf);
    buf.put_slice(bytes);
}

fn decode_bytes(buf: &mut Bytes) -> Result<Bytes, FrameError> {
    let len = decode_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| FrameError::Truncated)?;
    take(buf, len)
}

fn take(buf: &mut Bytes, len: usize) -> Result<Bytes, FrameError> {
    if buf.remaining() < len {
        return Err(FrameError::Truncated);
    }
    Ok(buf.split_to(len))
}

fn take_array<const N: usize>(buf: &mut Bytes) -> Result<[u8; N], FrameError> {
    if buf.remaining() < N {
        return Err(FrameError::Truncated);
    }
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}
