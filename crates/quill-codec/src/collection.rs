use crate::registry::lookup;
use crate::scalar::mismatch;
use bytes::{BufMut, BytesMut};
use quill_core::error::{DecodeError, EncodeError};
use quill_core::types::{ColumnValue, WireType};

// Collections are `[int count]` followed by `[int length][bytes]` per element.

fn put_element(
    collection: &WireType,
    element_type: &WireType,
    element: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    if element.is_null() {
        return Err(EncodeError::NullElement(collection.clone()));
    }
    let codec = lookup(element_type)?;
    let mut scratch = BytesMut::new();
    (codec.encode)(element_type, element, &mut scratch)?;
    let len = i32::try_from(scratch.len()).map_err(|_| EncodeError::TooLarge(scratch.len()))?;
    buf.put_i32(len);
    buf.extend_from_slice(&scratch);
    Ok(())
}

fn put_count(len: usize, buf: &mut BytesMut) -> Result<(), EncodeError> {
    let count = i32::try_from(len).map_err(|_| EncodeError::TooLarge(len))?;
    buf.put_i32(count);
    Ok(())
}

fn has_duplicates<'a>(items: impl Iterator<Item = &'a ColumnValue> + Clone) -> bool {
    items
        .clone()
        .enumerate()
        .any(|(idx, item)| items.clone().skip(idx + 1).any(|other| other == item))
}

pub(crate) fn encode_sequence(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    let (element_type, items) = match (wire_type, value) {
        (WireType::List(element), ColumnValue::List(items)) => (element, items),
        (WireType::Set(element), ColumnValue::Set(items)) => {
            if has_duplicates(items.iter()) {
                return Err(EncodeError::DuplicateElement(wire_type.clone()));
            }
            (element, items)
        }
        (_, other) => return Err(mismatch(wire_type, other)),
    };
    put_count(items.len(), buf)?;
    for item in items {
        put_element(wire_type, element_type, item, buf)?;
    }
    Ok(())
}

pub(crate) fn encode_map(
    wire_type: &WireType,
    value: &ColumnValue,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    let (WireType::Map(key_type, value_type), ColumnValue::Map(entries)) = (wire_type, value)
    else {
        return Err(mismatch(wire_type, value));
    };
    if has_duplicates(entries.iter().map(|(k, _)| k)) {
        return Err(EncodeError::DuplicateElement(wire_type.clone()));
    }
    put_count(entries.len(), buf)?;
    for (key, value) in entries {
        put_element(wire_type, key_type, key, buf)?;
        put_element(wire_type, value_type, value, buf)?;
    }
    Ok(())
}

struct Reader<'a> {
    collection: &'a WireType,
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(collection: &'a WireType, bytes: &'a [u8]) -> Self {
        Self { collection, bytes }
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        if self.bytes.len() < 4 {
            return Err(DecodeError::Truncated(self.collection.clone()));
        }
        let (head, rest) = self.bytes.split_at(4);
        self.bytes = rest;
        Ok(i32::from_be_bytes([head[0], head[1], head[2], head[3]]))
    }

    fn read_count(&mut self) -> Result<usize, DecodeError> {
        let count = self.read_i32()?;
        usize::try_from(count).map_err(|_| DecodeError::NegativeCount(count))
    }

    fn read_element(&mut self, element_type: &WireType) -> Result<ColumnValue, DecodeError> {
        let len = self.read_i32()?;
        let Ok(len) = usize::try_from(len) else {
            return Err(DecodeError::NullElement(self.collection.clone()));
        };
        if self.bytes.len() < len {
            return Err(DecodeError::Truncated(self.collection.clone()));
        }
        let (element, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        let codec =
            lookup(element_type).map_err(|_| DecodeError::Unsupported(element_type.clone()))?;
        (codec.decode)(element_type, element)
    }

    fn finish(self) -> Result<(), DecodeError> {
        if self.bytes.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(self.collection.clone()))
        }
    }
}

pub(crate) fn decode_sequence(
    wire_type: &WireType,
    bytes: &[u8],
) -> Result<ColumnValue, DecodeError> {
    let element_type = match wire_type {
        WireType::List(element) | WireType::Set(element) => element,
        other => return Err(DecodeError::Unsupported(other.clone())),
    };
    let mut reader = Reader::new(wire_type, bytes);
    let count = reader.read_count()?;
    // Each element needs at least its length prefix.
    let mut items = Vec::with_capacity(count.min(bytes.len() / 4));
    for _ in 0..count {
        items.push(reader.read_element(element_type)?);
    }
    reader.finish()?;
    match wire_type {
        WireType::Set(_) => Ok(ColumnValue::Set(items)),
        _ => Ok(ColumnValue::List(items)),
    }
}

pub(crate) fn decode_map(wire_type: &WireType, bytes: &[u8]) -> Result<ColumnValue, DecodeError> {
    let WireType::Map(key_type, value_type) = wire_type else {
        return Err(DecodeError::Unsupported(wire_type.clone()));
    };
    let mut reader = Reader::new(wire_type, bytes);
    let count = reader.read_count()?;
    let mut entries = Vec::with_capacity(count.min(bytes.len() / 8));
    for _ in 0..count {
        let key = reader.read_element(key_type)?;
        let value = reader.read_element(value_type)?;
        entries.push((key, value));
    }
    reader.finish()?;
    Ok(ColumnValue::Map(entries))
}
