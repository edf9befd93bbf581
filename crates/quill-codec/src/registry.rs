use crate::{collection, scalar};
use bytes::{Bytes, BytesMut};
use quill_core::error::{DecodeError, EncodeError};
use quill_core::types::{ColumnValue, WireType};

pub type EncodeFn = fn(&WireType, &ColumnValue, &mut BytesMut) -> Result<(), EncodeError>;
pub type DecodeFn = fn(&WireType, &[u8]) -> Result<ColumnValue, DecodeError>;

/// The encode/decode pair registered for one wire type.
#[derive(Clone, Copy)]
pub struct Codec {
    pub encode: EncodeFn,
    pub decode: DecodeFn,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Codec")
    }
}

const fn codec(encode: EncodeFn, decode: DecodeFn) -> Codec {
    Codec { encode, decode }
}

/// Finds the codec for `wire_type`. `decimal` and `inet` have no codec and
/// are refused here rather than encoded lossily.
pub fn lookup(wire_type: &WireType) -> Result<Codec, EncodeError> {
    let found = match wire_type {
        WireType::Int => codec(scalar::encode_int, scalar::decode_int),
        WireType::Bigint => codec(scalar::encode_bigint, scalar::decode_bigint),
        WireType::Varint => codec(scalar::encode_varint, scalar::decode_varint),
        WireType::Float => codec(scalar::encode_float, scalar::decode_float),
        WireType::Double => codec(scalar::encode_double, scalar::decode_double),
        WireType::Boolean => codec(scalar::encode_boolean, scalar::decode_boolean),
        WireType::Blob => codec(scalar::encode_blob, scalar::decode_blob),
        WireType::Ascii => codec(scalar::encode_ascii, scalar::decode_ascii),
        WireType::Text | WireType::Varchar => codec(scalar::encode_text, scalar::decode_text),
        WireType::Timestamp => codec(scalar::encode_timestamp, scalar::decode_timestamp),
        WireType::Uuid | WireType::Timeuuid => codec(scalar::encode_uuid, scalar::decode_uuid),
        WireType::Counter => codec(scalar::encode_counter, scalar::decode_counter),
        WireType::List(_) | WireType::Set(_) => {
            codec(collection::encode_sequence, collection::decode_sequence)
        }
        WireType::Map(_, _) => codec(collection::encode_map, collection::decode_map),
        WireType::Decimal | WireType::Inet => {
            return Err(EncodeError::Unsupported(wire_type.clone()))
        }
    };
    Ok(found)
}

/// Encodes one column value. `Null` becomes `None` for every wire type.
pub fn encode(wire_type: &WireType, value: &ColumnValue) -> Result<Option<Bytes>, EncodeError> {
    if value.is_null() {
        return Ok(None);
    }
    let codec = lookup(wire_type)?;
    let mut buf = BytesMut::new();
    (codec.encode)(wire_type, value, &mut buf)?;
    if buf.len() > i32::MAX as usize {
        return Err(EncodeError::TooLarge(buf.len()));
    }
    Ok(Some(buf.freeze()))
}

/// Decodes one column value. An absent value is `Null` for every wire type.
pub fn decode(wire_type: &WireType, bytes: Option<&[u8]>) -> Result<ColumnValue, DecodeError> {
    let Some(bytes) = bytes else {
        return Ok(ColumnValue::Null);
    };
    let codec = lookup(wire_type).map_err(|_| DecodeError::Unsupported(wire_type.clone()))?;
    (codec.decode)(wire_type, bytes)
}
