//! Client-to-node messages.

use crate::error::ProtocolError;
use crate::frame::{Frame, Opcode};
use crate::messages::{QueryRequest, Request};
use crate::wire::{put_long_string, put_string, put_string_map, put_value, Reader};
use bytes::{BufMut, Bytes, BytesMut};
use quill_core::consistency::ConsistencyLevel;

const FLAG_VALUES: u8 = 0x01;
const FLAG_NAMES_FOR_VALUES: u8 = 0x40;

impl Request {
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Startup { .. } => Opcode::Startup,
            Request::Options => Opcode::Options,
            Request::Query(_) => Opcode::Query,
        }
    }

    pub fn encode_body(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Request::Startup { options } => put_string_map(&mut buf, options),
            Request::Options => {}
            Request::Query(query) => put_query(&mut buf, query),
        }
        buf.freeze()
    }

    pub fn into_frame(self, stream: i16) -> Frame {
        let body = self.encode_body();
        Frame::request(stream, self.opcode(), body)
    }

    pub fn decode(opcode: Opcode, body: Bytes) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(body);
        let request = match opcode {
            Opcode::Startup => Request::Startup {
                options: reader.read_string_map("startup options")?,
            },
            Opcode::Options => Request::Options,
            Opcode::Query => Request::Query(read_query(&mut reader)?),
            other => return Err(ProtocolError::UnexpectedOpcode(other)),
        };
        reader.finish()?;
        Ok(request)
    }
}

fn put_query(buf: &mut BytesMut, query: &QueryRequest) {
    put_long_string(buf, &query.query);
    buf.put_u16(query.consistency.code());
    if query.values.is_empty() {
        buf.put_u8(0);
        return;
    }
    buf.put_u8(FLAG_VALUES | FLAG_NAMES_FOR_VALUES);
    buf.put_u16(query.values.len() as u16);
    for (name, value) in &query.values {
        put_string(buf, name);
        put_value(buf, value.as_deref());
    }
}

fn read_query(reader: &mut Reader) -> Result<QueryRequest, ProtocolError> {
    let query = reader.read_long_string("query text")?;
    let code = reader.read_u16("consistency")?;
    let consistency =
        ConsistencyLevel::from_code(code).ok_or(ProtocolError::UnknownConsistency(code))?;
    let flags = reader.read_u8("query flags")?;
    let mut values = Vec::new();
    if flags & FLAG_VALUES != 0 {
        let count = reader.read_u16("value count")?;
        for idx in 0..count {
            let name = if flags & FLAG_NAMES_FOR_VALUES != 0 {
                reader.read_string("value name")?
            } else {
                idx.to_string()
            };
            values.push((name, reader.read_value("bound value")?));
        }
    }
    Ok(QueryRequest {
        query,
        consistency,
        values,
    })
}
