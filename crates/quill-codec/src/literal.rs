//! Rendering of values as CQL literals, for values spliced into query text
//! instead of being bound.

use crate::registry::lookup;
use crate::scalar::mismatch;
use quill_core::error::EncodeError;
use quill_core::types::{ColumnValue, WireType};

/// Renders `value` as a literal of `wire_type`.
///
/// Numeric and boolean values are written bare, strings are single-quoted,
/// blobs become `0x...`. Collections nest the same rules, so a `set<int>`
/// is `{1, 2, 3}` and a `set<text>` is `{'a', 'b'}`.
pub fn to_literal(wire_type: &WireType, value: &ColumnValue) -> Result<String, EncodeError> {
    if value.is_null() {
        return Ok("null".to_string());
    }
    lookup(wire_type)?;
    let mut out = String::new();
    write_literal(wire_type, value, &mut out)?;
    Ok(out)
}

fn write_literal(
    wire_type: &WireType,
    value: &ColumnValue,
    out: &mut String,
) -> Result<(), EncodeError> {
    match (wire_type, value) {
        (WireType::Int, ColumnValue::Int(v)) => out.push_str(&v.to_string()),
        (WireType::Bigint, ColumnValue::Bigint(v)) => out.push_str(&v.to_string()),
        (WireType::Varint, ColumnValue::Varint(v)) => out.push_str(&v.to_string()),
        (WireType::Counter, ColumnValue::CounterDelta(v)) => out.push_str(&v.to_string()),
        (WireType::Counter, ColumnValue::Counter(_)) => return Err(EncodeError::CounterAssignment),
        (WireType::Float, ColumnValue::Float(v)) => out.push_str(&v.to_string()),
        (WireType::Double, ColumnValue::Double(v)) => out.push_str(&v.to_string()),
        (WireType::Boolean, ColumnValue::Boolean(v)) => out.push_str(if *v { "true" } else { "false" }),
        (WireType::Blob, ColumnValue::Blob(v)) => {
            out.push_str("0x");
            out.push_str(&hex::encode(v));
        }
        (WireType::Ascii, ColumnValue::Ascii(v)) => {
            if let Some(position) = v.bytes().position(|b| !b.is_ascii()) {
                return Err(EncodeError::NonAscii { position });
            }
            push_quoted(v, out);
        }
        (WireType::Text | WireType::Varchar, ColumnValue::Text(v)) => push_quoted(v, out),
        (WireType::Timestamp, ColumnValue::Timestamp(v)) => {
            out.push_str(&v.timestamp_millis().to_string())
        }
        (WireType::Uuid, ColumnValue::Uuid(v)) | (WireType::Timeuuid, ColumnValue::Timeuuid(v)) => {
            out.push_str(&v.hyphenated().to_string())
        }
        (WireType::List(element), ColumnValue::List(items)) => {
            write_items(wire_type, element, items, ('[', ']'), out)?
        }
        (WireType::Set(element), ColumnValue::Set(items)) => {
            write_items(wire_type, element, items, ('{', '}'), out)?
        }
        (WireType::Map(key_type, value_type), ColumnValue::Map(entries)) => {
            out.push('{');
            for (idx, (key, value)) in entries.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_element(wire_type, key_type, key, out)?;
                out.push_str(": ");
                write_element(wire_type, value_type, value, out)?;
            }
            out.push('}');
        }
        (_, other) => return Err(mismatch(wire_type, other)),
    }
    Ok(())
}

fn write_items(
    collection: &WireType,
    element_type: &WireType,
    items: &[ColumnValue],
    (open, close): (char, char),
    out: &mut String,
) -> Result<(), EncodeError> {
    out.push(open);
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        write_element(collection, element_type, item, out)?;
    }
    out.push(close);
    Ok(())
}

fn write_element(
    collection: &WireType,
    element_type: &WireType,
    element: &ColumnValue,
    out: &mut String,
) -> Result<(), EncodeError> {
    if element.is_null() {
        return Err(EncodeError::NullElement(collection.clone()));
    }
    lookup(element_type)?;
    write_literal(element_type, element, out)
}

fn push_quoted(value: &str, out: &mut String) {
    out.push('\'');
    out.push_str(&value.replace('\'', "''"));
    out.push('\'');
}
