use crate::error::ProtocolError;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const PROTOCOL_VERSION: u8 = 0x04;
pub const RESPONSE_FLAG: u8 = 0x80;
pub const HEADER_LEN: usize = 9;
pub const MAX_BODY_LEN: usize = 256 * 1024 * 1024;

/// Stream id the node uses for pushed events; never allocated to a request.
pub const EVENT_STREAM: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Error = 0x00,
    Startup = 0x01,
    Ready = 0x02,
    Authenticate = 0x03,
    Options = 0x05,
    Supported = 0x06,
    Query = 0x07,
    Result = 0x08,
    Event = 0x0C,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        let opcode = match value {
            0x00 => Opcode::Error,
            0x01 => Opcode::Startup,
            0x02 => Opcode::Ready,
            0x03 => Opcode::Authenticate,
            0x05 => Opcode::Options,
            0x06 => Opcode::Supported,
            0x07 => Opcode::Query,
            0x08 => Opcode::Result,
            0x0C => Opcode::Event,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        Ok(opcode)
    }
}

/// One frame: a 9-byte header (version, flags, stream id, opcode, body
/// length) followed by the body. The stream id correlates a response with
/// the request that carried the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub version: u8,
    pub flags: u8,
    pub stream: i16,
    pub opcode: Opcode,
    pub body: Bytes,
}

impl Frame {
    pub fn request(stream: i16, opcode: Opcode, body: Bytes) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags: 0,
            stream,
            opcode,
            body,
        }
    }

    pub fn response(stream: i16, opcode: Opcode, body: Bytes) -> Self {
        Self {
            version: PROTOCOL_VERSION | RESPONSE_FLAG,
            flags: 0,
            stream,
            opcode,
            body,
        }
    }

    pub fn is_response(&self) -> bool {
        self.version & RESPONSE_FLAG != 0
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.body.len());
        buf.put_u8(self.version);
        buf.put_u8(self.flags);
        buf.put_i16(self.stream);
        buf.put_u8(self.opcode as u8);
        buf.put_u32(self.body.len() as u32);
        buf.extend_from_slice(&self.body);
        buf
    }
}

pub async fn read_frame<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Frame, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let version = header[0];
    if version & !RESPONSE_FLAG != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }
    let flags = header[1];
    let stream_id = i16::from_be_bytes([header[2], header[3]]);
    let opcode = Opcode::from_u8(header[4])?;
    let len = u32::from_be_bytes([header[5], header[6], header[7], header[8]]) as usize;
    if len > MAX_BODY_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(Frame {
        version,
        flags,
        stream: stream_id,
        opcode,
        body: Bytes::from(body),
    })
}

pub async fn write_frame<S: AsyncWrite + Unpin>(
    stream: &mut S,
    frame: &Frame,
) -> Result<(), ProtocolError> {
    if frame.body.len() > MAX_BODY_LEN {
        return Err(ProtocolError::FrameTooLarge(frame.body.len()));
    }
    stream.write_all(&frame.encode()).await?;
    stream.flush().await?;
    Ok(())
}
