use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use quill_core::error::{DecodeError, EncodeError};
use quill_core::types::{ColumnValue, WireType};
use uuid::Uuid;

pub(crate) fn mismatch(wire_type: &WireType, value: &ColumnValue) -> EncodeError {
    EncodeError::TypeMismatch {
        expected: wire_type.clone(),
        found: value.kind(),
    }
}

fn fixed<const N: usize>(wire_type: &WireType, bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::InvalidLength {
        wire_type: wire_type.clone(),
        expected: N,
        found: bytes.len(),
    })
}

pub(crate) fn encode_int(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Int(v) => {
            buf.put_i32(*v);
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_int(wire_type: &WireType, bytes: &[u8]) -> Result<ColumnValue, DecodeError> {
    Ok(ColumnValue::Int(i32::from_be_bytes(fixed(wire_type, bytes)?)))
}

pub(crate) fn encode_bigint(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Bigint(v) => {
            buf.put_i64(*v);
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_bigint(
    wire_type: &WireType,
    bytes: &[u8],
) -> Result<ColumnValue, DecodeError> {
    Ok(ColumnValue::Bigint(i64::from_be_bytes(fixed(wire_type, bytes)?)))
}

// Minimal big-endian two's complement, no width limit.
pub(crate) fn encode_varint(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Varint(v) => {
            buf.extend_from_slice(&v.to_signed_bytes_be());
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_varint(
    wire_type: &WireType,
    bytes: &[u8],
) -> Result<ColumnValue, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::InvalidLength {
            wire_type: wire_type.clone(),
            expected: 1,
            found: 0,
        });
    }
    Ok(ColumnValue::Varint(BigInt::from_signed_bytes_be(bytes)))
}

pub(crate) fn encode_float(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Float(v) => {
            buf.put_f32(*v);
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_float(wire_type: &WireType, bytes: &[u8]) -> Result<ColumnValue, DecodeError> {
    Ok(ColumnValue::Float(f32::from_be_bytes(fixed(wire_type, bytes)?)))
}

pub(crate) fn encode_double(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Double(v) => {
            buf.put_f64(*v);
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_double(
    wire_type: &WireType,
    bytes: &[u8],
) -> Result<ColumnValue, DecodeError> {
    Ok(ColumnValue::Double(f64::from_be_bytes(fixed(wire_type, bytes)?)))
}

pub(crate) fn encode_boolean(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Boolean(v) => {
            buf.put_u8(u8::from(*v));
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_boolean(
    wire_type: &WireType,
    bytes: &[u8],
) -> Result<ColumnValue, DecodeError> {
    match fixed::<1>(wire_type, bytes)?[0] {
        0 => Ok(ColumnValue::Boolean(false)),
        1 => Ok(ColumnValue::Boolean(true)),
        other => Err(DecodeError::InvalidBoolean(other)),
    }
}

pub(crate) fn encode_blob(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Blob(v) => {
            buf.extend_from_slice(v);
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_blob(_: &WireType, bytes: &[u8]) -> Result<ColumnValue, DecodeError> {
    Ok(ColumnValue::Blob(bytes.to_vec()))
}

pub(crate) fn encode_ascii(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Ascii(v) => {
            if let Some(position) = v.bytes().position(|b| !b.is_ascii()) {
                return Err(EncodeError::NonAscii { position });
            }
            buf.extend_from_slice(v.as_bytes());
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_ascii(_: &WireType, bytes: &[u8]) -> Result<ColumnValue, DecodeError> {
    if let Some(position) = bytes.iter().position(|b| !b.is_ascii()) {
        return Err(DecodeError::NonAscii { position });
    }
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok(ColumnValue::Ascii(text.to_string()))
}

pub(crate) fn encode_text(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Text(v) => {
            buf.extend_from_slice(v.as_bytes());
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_text(_: &WireType, bytes: &[u8]) -> Result<ColumnValue, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    Ok(ColumnValue::Text(text.to_string()))
}

/// Drops everything below the millisecond. Pre-epoch instants move toward
/// the earlier millisecond, the same as cutting the fraction digits.
pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or(value)
}

pub(crate) fn encode_timestamp(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::Timestamp(v) => {
            buf.put_i64(v.timestamp_millis());
            Ok(())
        }
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_timestamp(
    wire_type: &WireType,
    bytes: &[u8],
) -> Result<ColumnValue, DecodeError> {
    let millis = i64::from_be_bytes(fixed(wire_type, bytes)?);
    DateTime::from_timestamp_millis(millis)
        .map(ColumnValue::Timestamp)
        .ok_or(DecodeError::TimestampOutOfRange(millis))
}

// The time-ordered variant shares the layout; its version nibble is not checked.
pub(crate) fn encode_uuid(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match (wire_type, value) {
        (WireType::Uuid, ColumnValue::Uuid(v)) | (WireType::Timeuuid, ColumnValue::Timeuuid(v)) => {
            buf.extend_from_slice(v.as_bytes());
            Ok(())
        }
        (_, other) => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_uuid(wire_type: &WireType, bytes: &[u8]) -> Result<ColumnValue, DecodeError> {
    let uuid = Uuid::from_bytes(fixed(wire_type, bytes)?);
    match wire_type {
        WireType::Timeuuid => Ok(ColumnValue::Timeuuid(uuid)),
        _ => Ok(ColumnValue::Uuid(uuid)),
    }
}

pub(crate) fn encode_counter(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    match value {
        ColumnValue::CounterDelta(delta) => {
            buf.put_i64(*delta);
            Ok(())
        }
        ColumnValue::Counter(_) => Err(EncodeError::CounterAssignment),
        other => Err(mismatch(wire_type, other)),
    }
}

pub(crate) fn decode_counter(
    wire_type: &WireType,
    bytes: &[u8],
) -> Result<ColumnValue, DecodeError> {
    Ok(ColumnValue::Counter(i64::from_be_bytes(fixed(wire_type, bytes)?)))
}
