//! SPOP frame layout and (de)serialisation.
//!
//! ```text
//! FRAME    : <LENGTH:4 bytes BE><FRAME-TYPE:1 byte><METADATA><PAYLOAD>
//! METADATA : <FLAGS:4 bytes BE><STREAM-ID:varint><FRAME-ID:varint>
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::spop::data::{decode_kv, decode_kv_list, decode_string, encode_bytes, encode_kv, Message, TypedData};
use crate::spop::varint::{decode_varint, encode_varint};
use crate::spop::{DisconnectStatus, FrameError};

pub const FLAG_FIN: u32 = 0x0000_0001;
pub const FLAG_ABORT: u32 = 0x0000_0002;

/// Frame types this agent understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    HaproxyHello = 1,
    HaproxyDisconnect = 2,
    Notify = 3,
    AgentHello = 101,
    AgentDisconnect = 102,
    Ack = 103,
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FrameType::HaproxyHello),
            2 => Ok(FrameType::HaproxyDisconnect),
            3 => Ok(FrameType::Notify),
            101 => Ok(FrameType::AgentHello),
            102 => Ok(FrameType::AgentDisconnect),
            103 => Ok(FrameType::Ack),
            other => Err(FrameError::UnknownFrameType(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub flags: u32,
    pub stream_id: u64,
    pub frame_id: u64,
    pub payload: Bytes,
}

impl Frame {
    /// Decode a frame body (everything after the length prefix).
    pub fn decode(mut buf: Bytes) -> Result<Self, FrameError> {
        if buf.remaining() < 5 {
            return Err(FrameError::Truncated);
        }
        let frame_type = FrameType::try_from(buf.get_u8())?;
        let flags = buf.get_u32();
        let stream_id = decode_varint(&mut buf)?;
        let frame_id = decode_varint(&mut buf)?;

        Ok(Self {
            frame_type,
            flags,
            stream_id,
            frame_id,
            payload: buf,
        })
    }

    /// Encode the frame including its length prefix.
    pub fn encode(&self, out: &mut BytesMut) {
        let start = out.len();
        out.put_u32(0);
        out.put_u8(self.frame_type as u8);
        out.put_u32(self.flags);
        encode_varint(self.stream_id, out);
        encode_varint(self.frame_id, out);
        out.put_slice(&self.payload);

        let len = (out.len() - start - 4) as u32;
        out[start..start + 4].copy_from_slice(&len.to_be_bytes());
    }

    pub fn is_fin(&self) -> bool {
        self.flags & FLAG_FIN != 0
    }

    /// Payload of HELLO and DISCONNECT frames.
    pub fn kv_list(&self) -> Result<Vec<(String, TypedData)>, FrameError> {
        decode_kv_list(&mut self.payload.clone())
    }

    /// Messages carried by a NOTIFY frame.
    pub fn messages(&self) -> Result<Vec<Message>, FrameError> {
        let mut buf = self.payload.clone();
        let mut messages = Vec::new();

        while buf.has_remaining() {
            let name = decode_string(&mut buf)?;
            if !buf.has_remaining() {
                return Err(FrameError::Truncated);
            }
            let nb_args = buf.get_u8();
            let args = (0..nb_args)
                .map(|_| decode_kv(&mut buf))
                .collect::<Result<Vec<_>, _>>()?;
            messages.push(Message { name, args });
        }

        Ok(messages)
    }

    fn with_kv(frame_type: FrameType, stream_id: u64, frame_id: u64, kv: &[(&str, TypedData)]) -> Self {
        let mut payload = BytesMut::new();
        for (name, value) in kv {
            encode_kv(name, value, &mut payload);
        }
        Self {
            frame_type,
            flags: FLAG_FIN,
            stream_id,
            frame_id,
            payload: payload.freeze(),
        }
    }

    pub fn agent_hello(max_frame_size: u32, capabilities: &str) -> Self {
        Self::with_kv(
            FrameType::AgentHello,
            0,
            0,
            &[
                ("version", TypedData::String(crate::spop::SPOP_VERSION.to_string())),
                ("max-frame-size", TypedData::Uint32(max_frame_size)),
                ("capabilities", TypedData::String(capabilities.to_string())),
            ],
        )
    }

    pub fn agent_disconnect(status: DisconnectStatus, message: &str) -> Self {
        Self::with_kv(
            FrameType::AgentDisconnect,
            0,
            0,
            &[
                ("status-code", TypedData::Uint32(status.code())),
                ("message", TypedData::String(message.to_string())),
            ],
        )
    }

    /// Acknowledge a NOTIFY without setting any variables.
    pub fn ack(stream_id: u64, frame_id: u64) -> Self {
        Self {
            frame_type: FrameType::Ack,
            flags: FLAG_FIN,
            stream_id,
            frame_id,
            payload: Bytes::new(),
        }
    }

    /// HAPROXY-HELLO as sent by the proxy side.
    pub fn haproxy_hello(max_frame_size: u32, capabilities: &str, healthcheck: bool) -> Self {
        Self::with_kv(
            FrameType::HaproxyHello,
            0,
            0,
            &[
                ("supported-versions", TypedData::String(crate::spop::SPOP_VERSION.to_string())),
                ("max-frame-size", TypedData::Uint32(max_frame_size)),
                ("capabilities", TypedData::String(capabilities.to_string())),
                ("healthcheck", TypedData::Bool(healthcheck)),
            ],
        )
    }

    pub fn haproxy_disconnect(status: DisconnectStatus, message: &str) -> Self {
        let mut frame = Self::agent_disconnect(status, message);
        frame.frame_type = FrameType::HaproxyDisconnect;
        frame
    }

    /// NOTIFY as sent by the proxy side.
    pub fn notify(stream_id: u64, frame_id: u64, messages: &[Message]) -> Self {
        let mut payload = BytesMut::new();
        for message in messages {
            encode_bytes(message.name.as_bytes(), &mut payload);
            payload.put_u8(message.args.len() as u8);
            for (name, value) in &message.args {
                encode_kv(name, value, &mut payload);
            }
        }
        Self {
            frame_type: FrameType::Notify,
            flags: FLAG_FIN,
            stream_id,
            frame_id,
            payload: payload.freeze(),
        }
    }
}

/// Read one frame. Returns `Ok(None)` on a clean EOF between frames.
///
/// The body goes into `buf`, which is reused across calls; decoded
/// `Binary` values slice into it.
pub async fn read_frame<R>(reader: &mut R, buf: &mut BytesMut, max_frame_size: u32) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(FrameError::Io(e)),
    };

    if len > max_frame_size {
        return Err(FrameError::TooBig {
            size: len,
            max: max_frame_size,
        });
    }

    buf.clear();
    buf.resize(len as usize, 0);
    reader.read_exact(&mut buf[..]).await?;

    Frame::decode(buf.split().freeze()).map(Some)
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let mut out = BytesMut::with_capacity(frame.payload.len() + 16);
    frame.encode(&mut out);
    writer.write_all(&out).await?;
    writer.flush().await?;
    Ok(())
}
