//! Node-to-client messages.

use crate::error::ProtocolError;
use crate::frame::{Frame, Opcode};
use crate::messages::{Response, ResultBody, Rows};
use crate::wire::{put_string, put_value, Reader};
use bytes::{BufMut, Bytes, BytesMut};
use quill_core::types::{ColumnSpec, WireType};
use std::collections::HashMap;

const RESULT_VOID: i32 = 0x0001;
const RESULT_ROWS: i32 = 0x0002;
const RESULT_SET_KEYSPACE: i32 = 0x0003;
const RESULT_SCHEMA_CHANGE: i32 = 0x0005;

const META_GLOBAL_TABLES_SPEC: i32 = 0x0001;
const META_HAS_MORE_PAGES: i32 = 0x0002;
const META_NO_METADATA: i32 = 0x0004;

/// Deepest collection nesting accepted in column metadata.
pub const MAX_TYPE_DEPTH: usize = 16;

impl Response {
    pub fn opcode(&self) -> Opcode {
        match self {
            Response::Error { .. } => Opcode::Error,
            Response::Ready => Opcode::Ready,
            Response::Authenticate { .. } => Opcode::Authenticate,
            Response::Supported { .. } => Opcode::Supported,
            Response::Result(_) => Opcode::Result,
            Response::Event => Opcode::Event,
        }
    }

    pub fn decode(opcode: Opcode, body: Bytes) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(body);
        let response = match opcode {
            Opcode::Error => {
                let code = reader.read_i32("error code")?;
                let message = reader.read_string("error message")?;
                // Some codes carry extra detail fields; they are not needed here.
                return Ok(Response::Error { code, message });
            }
            Opcode::Ready => Response::Ready,
            Opcode::Authenticate => Response::Authenticate {
                authenticator: reader.read_string("authenticator")?,
            },
            Opcode::Supported => {
                let count = reader.read_u16("supported options")?;
                let mut options = HashMap::with_capacity(count as usize);
                for _ in 0..count {
                    let key = reader.read_string("supported key")?;
                    let n = reader.read_u16("supported values")?;
                    let mut values = Vec::with_capacity(n as usize);
                    for _ in 0..n {
                        values.push(reader.read_string("supported value")?);
                    }
                    options.insert(key, values);
                }
                Response::Supported { options }
            }
            Opcode::Result => {
                let result = read_result(&mut reader)?;
                // Function and aggregate changes append argument types, which are left unread.
                if !matches!(result, ResultBody::SchemaChange { .. }) {
                    reader.finish()?;
                }
                return Ok(Response::Result(result));
            }
            Opcode::Event => return Ok(Response::Event),
            other => return Err(ProtocolError::UnexpectedOpcode(other)),
        };
        reader.finish()?;
        Ok(response)
    }

    pub fn encode_body(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Response::Error { code, message } => {
                buf.put_i32(*code);
                put_string(&mut buf, message);
            }
            Response::Ready | Response::Event => {}
            Response::Authenticate { authenticator } => put_string(&mut buf, authenticator),
            Response::Supported { options } => {
                buf.put_u16(options.len() as u16);
                for (key, values) in options {
                    put_string(&mut buf, key);
                    buf.put_u16(values.len() as u16);
                    for value in values {
                        put_string(&mut buf, value);
                    }
                }
            }
            Response::Result(result) => put_result(&mut buf, result),
        }
        buf.freeze()
    }

    pub fn into_frame(self, stream: i16) -> Frame {
        let body = self.encode_body();
        Frame::response(stream, self.opcode(), body)
    }
}

fn read_result(reader: &mut Reader) -> Result<ResultBody, ProtocolError> {
    let kind = reader.read_i32("result kind")?;
    match kind {
        RESULT_VOID => Ok(ResultBody::Void),
        RESULT_ROWS => Ok(ResultBody::Rows(read_rows(reader)?)),
        RESULT_SET_KEYSPACE => Ok(ResultBody::SetKeyspace(reader.read_string("keyspace")?)),
        RESULT_SCHEMA_CHANGE => {
            let change = reader.read_string("schema change type")?;
            let target = reader.read_string("schema change target")?;
            let mut options = vec![reader.read_string("schema change keyspace")?];
            if target != "KEYSPACE" {
                options.push(reader.read_string("schema change name")?);
            }
            Ok(ResultBody::SchemaChange {
                change,
                target,
                options,
            })
        }
        other => Err(ProtocolError::UnknownResultKind(other)),
    }
}

fn read_rows(reader: &mut Reader) -> Result<Rows, ProtocolError> {
    let flags = reader.read_i32("metadata flags")?;
    let column_count = reader.read_i32("column count")?;
    let column_count =
        usize::try_from(column_count).map_err(|_| ProtocolError::Truncated("column count"))?;
    if flags & META_HAS_MORE_PAGES != 0 {
        let _paging_state = reader.read_value("paging state")?;
    }
    if flags & META_NO_METADATA != 0 {
        return Err(ProtocolError::MissingMetadata);
    }
    let global = if flags & META_GLOBAL_TABLES_SPEC != 0 {
        Some((
            reader.read_string("keyspace name")?,
            reader.read_string("table name")?,
        ))
    } else {
        None
    };
    let mut columns = Vec::with_capacity(column_count.min(1024));
    for _ in 0..column_count {
        let (keyspace, table) = match &global {
            Some((ks, table)) => (ks.clone(), table.clone()),
            None => (
                reader.read_string("keyspace name")?,
                reader.read_string("table name")?,
            ),
        };
        let name = reader.read_string("column name")?;
        let wire_type = read_type(reader, 0)?;
        columns.push(ColumnSpec {
            keyspace,
            table,
            name,
            wire_type,
        });
    }
    let row_count = reader.read_i32("row count")?;
    let row_count = usize::try_from(row_count).map_err(|_| ProtocolError::Truncated("row count"))?;
    if columns.is_empty() && row_count != 0 {
        return Err(ProtocolError::RowsWithoutColumns(row_count));
    }
    // Every cell carries at least its 4-byte length.
    if row_count.saturating_mul(columns.len()).saturating_mul(4) > reader.remaining() {
        return Err(ProtocolError::Truncated("rows"));
    }
    let mut rows = Vec::with_capacity(row_count.min(4096));
    for _ in 0..row_count {
        let mut row = Vec::with_capacity(columns.len());
        for _ in 0..columns.len() {
            row.push(reader.read_value("cell value")?);
        }
        rows.push(row);
    }
    Ok(Rows { columns, rows })
}

fn read_type(reader: &mut Reader, depth: usize) -> Result<WireType, ProtocolError> {
    let id = reader.read_u16("column type")?;
    if matches!(id, 0x0020..=0x0022) && depth >= MAX_TYPE_DEPTH {
        return Err(ProtocolError::TypeTooDeep(MAX_TYPE_DEPTH));
    }
    let wire_type = match id {
        0x0001 => WireType::Ascii,
        0x0002 => WireType::Bigint,
        0x0003 => WireType::Blob,
        0x0004 => WireType::Boolean,
        0x0005 => WireType::Counter,
        0x0006 => WireType::Decimal,
        0x0007 => WireType::Double,
        0x0008 => WireType::Float,
        0x0009 => WireType::Int,
        0x000A => WireType::Text,
        0x000B => WireType::Timestamp,
        0x000C => WireType::Uuid,
        0x000D => WireType::Varchar,
        0x000E => WireType::Varint,
        0x000F => WireType::Timeuuid,
        0x0010 => WireType::Inet,
        0x0020 => WireType::list(read_type(reader, depth + 1)?),
        0x0021 => {
            let key = read_type(reader, depth + 1)?;
            WireType::map(key, read_type(reader, depth + 1)?)
        }
        0x0022 => WireType::set(read_type(reader, depth + 1)?),
        other => return Err(ProtocolError::UnknownTypeId(other)),
    };
    Ok(wire_type)
}

fn put_type(buf: &mut BytesMut, wire_type: &WireType) {
    let id: u16 = match wire_type {
        WireType::Ascii => 0x0001,
        WireType::Bigint => 0x0002,
        WireType::Blob => 0x0003,
        WireType::Boolean => 0x0004,
        WireType::Counter => 0x0005,
        WireType::Decimal => 0x0006,
        WireType::Double => 0x0007,
        WireType::Float => 0x0008,
        WireType::Int => 0x0009,
        WireType::Text => 0x000A,
        WireType::Timestamp => 0x000B,
        WireType::Uuid => 0x000C,
        WireType::Varchar => 0x000D,
        WireType::Varint => 0x000E,
        WireType::Timeuuid => 0x000F,
        WireType::Inet => 0x0010,
        WireType::List(_) => 0x0020,
        WireType::Map(_, _) => 0x0021,
        WireType::Set(_) => 0x0022,
    };
    buf.put_u16(id);
    match wire_type {
        WireType::List(element) | WireType::Set(element) => put_type(buf, element),
        WireType::Map(key, value) => {
            put_type(buf, key);
            put_type(buf, value);
        }
        _ => {}
    }
}

fn put_result(buf: &mut BytesMut, result: &ResultBody) {
    match result {
        ResultBody::Void => buf.put_i32(RESULT_VOID),
        ResultBody::SetKeyspace(keyspace) => {
            buf.put_i32(RESULT_SET_KEYSPACE);
            put_string(buf, keyspace);
        }
        ResultBody::SchemaChange {
            change,
            target,
            options,
        } => {
            buf.put_i32(RESULT_SCHEMA_CHANGE);
            put_string(buf, change);
            put_string(buf, target);
            for option in options {
                put_string(buf, option);
            }
        }
        ResultBody::Rows(rows) => {
            buf.put_i32(RESULT_ROWS);
            buf.put_i32(0);
            buf.put_i32(rows.columns.len() as i32);
            for column in &rows.columns {
                put_string(buf, &column.keyspace);
                put_string(buf, &column.table);
                put_string(buf, &column.name);
                put_type(buf, &column.wire_type);
            }
            buf.put_i32(rows.rows.len() as i32);
            for row in &rows.rows {
                for cell in row {
                    put_value(buf, cell.as_deref());
                }
            }
        }
    }
}
