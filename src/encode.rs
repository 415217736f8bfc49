//! Low-level wire encoding.
//!
//! Everything here appends to a plain `Vec<u8>`; framing a complete envelope
//! around the result is the [`Writer`](crate::Writer)'s job. Field encoding
//! applies taxonomy compression when a taxonomy is supplied: a field with a
//! name, no ordinal, and a taxonomy entry for that name travels as the bare
//! ordinal.

use crate::error::{Error, Result};
use crate::field::Field;
use crate::prefix::FieldPrefix;
use crate::taxonomy::Taxonomy;
use crate::utf8;
use crate::value::Value;
use crate::wire::WireType;
use crate::{ENVELOPE_HEADER_LEN, MAX_DEPTH};

/// Append the 8-byte envelope header. `total_size` must already include the
/// header itself.
pub fn write_envelope_header(
    buf: &mut Vec<u8>,
    directives: u8,
    schema_version: u8,
    taxonomy_id: i16,
    total_size: u32,
) {
    buf.push(directives);
    buf.push(schema_version);
    buf.extend_from_slice(&taxonomy_id.to_be_bytes());
    buf.extend_from_slice(&total_size.to_be_bytes());
}

/// Append one field, recursing through sub-messages.
pub fn write_field(buf: &mut Vec<u8>, field: &Field, taxonomy: Option<&dyn Taxonomy>) -> Result<()> {
    write_field_at(buf, field, taxonomy, 0)
}

/// Append every field of an iterator in order.
pub fn write_fields<'a, I>(buf: &mut Vec<u8>, fields: I, taxonomy: Option<&dyn Taxonomy>) -> Result<()>
where
    I: IntoIterator<Item = &'a Field>,
{
    for field in fields {
        write_field(buf, field, taxonomy)?;
    }
    Ok(())
}

fn write_field_at(
    buf: &mut Vec<u8>,
    field: &Field,
    taxonomy: Option<&dyn Taxonomy>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::malformed("sub-message nesting too deep"));
    }

    // Taxonomy compression: a named, ordinal-less field whose name the
    // taxonomy knows travels as the ordinal alone.
    let mut name = field.name();
    let mut ordinal = field.ordinal();
    if let (Some(n), None, Some(tax)) = (name, ordinal, taxonomy) {
        if let Some(ord) = tax.ordinal_for(n) {
            name = None;
            ordinal = Some(ord);
        }
    }

    let wire_type = field.wire_type();
    match wire_type.fixed_size() {
        Some(width) => {
            let prefix = FieldPrefix::fixed(ordinal.is_some(), name.is_some());
            write_header(buf, prefix, wire_type, ordinal, name)?;
            let start = buf.len();
            write_value_at(buf, field.value(), taxonomy, depth)?;
            debug_assert_eq!(buf.len() - start, width);
        }
        None => {
            // Variable width: the payload length has to land in front of the
            // payload, so encode the value into a scratch buffer first.
            let mut payload = Vec::new();
            write_value_at(&mut payload, field.value(), taxonomy, depth)?;
            let prefix = FieldPrefix::variable(payload.len(), ordinal.is_some(), name.is_some());
            write_header(buf, prefix, wire_type, ordinal, name)?;
            match prefix.var_width() {
                1 => buf.push(payload.len() as u8),
                2 => buf.extend_from_slice(&(payload.len() as u16).to_be_bytes()),
                _ => buf.extend_from_slice(&(payload.len() as u32).to_be_bytes()),
            }
            buf.extend_from_slice(&payload);
        }
    }
    Ok(())
}

fn write_header(
    buf: &mut Vec<u8>,
    prefix: FieldPrefix,
    wire_type: WireType,
    ordinal: Option<i16>,
    name: Option<&str>,
) -> Result<()> {
    buf.push(prefix.into_u8());
    buf.push(wire_type.id());
    if let Some(ord) = ordinal {
        buf.extend_from_slice(&ord.to_be_bytes());
    }
    if let Some(name) = name {
        let len = utf8::encoded_len(name);
        if len > crate::MAX_NAME_LEN {
            return Err(Error::malformed("field name longer than 255 bytes"));
        }
        buf.push(len as u8);
        utf8::encode(buf, name);
    }
    Ok(())
}

/// Append a value's payload bytes, without any framing.
pub fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    write_value_at(buf, value, None, 0)
}

/// Frame an already-encoded payload as one field. Fixed-width types must be
/// handed a payload of exactly their width.
pub fn write_raw_field(
    buf: &mut Vec<u8>,
    wire_type: WireType,
    name: Option<&str>,
    ordinal: Option<i16>,
    payload: &[u8],
) -> Result<()> {
    match wire_type.fixed_size() {
        Some(width) => {
            if width != payload.len() {
                return Err(Error::malformed("payload length disagrees with type width"));
            }
            let prefix = FieldPrefix::fixed(ordinal.is_some(), name.is_some());
            write_header(buf, prefix, wire_type, ordinal, name)?;
        }
        None => {
            let prefix = FieldPrefix::variable(payload.len(), ordinal.is_some(), name.is_some());
            write_header(buf, prefix, wire_type, ordinal, name)?;
            match prefix.var_width() {
                1 => buf.push(payload.len() as u8),
                2 => buf.extend_from_slice(&(payload.len() as u16).to_be_bytes()),
                _ => buf.extend_from_slice(&(payload.len() as u32).to_be_bytes()),
            }
        }
    }
    buf.extend_from_slice(payload);
    Ok(())
}

fn write_value_at(
    buf: &mut Vec<u8>,
    value: &Value,
    taxonomy: Option<&dyn Taxonomy>,
    depth: usize,
) -> Result<()> {
    match *value {
        Value::Indicator => {}
        Value::Boolean(v) => buf.push(v as u8),
        Value::Byte(v) => buf.push(v as u8),
        Value::Short(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Long(v) => buf.extend_from_slice(&v.to_be_bytes()),
        Value::Float(v) => buf.extend_from_slice(&v.to_bits().to_be_bytes()),
        Value::Double(v) => buf.extend_from_slice(&v.to_bits().to_be_bytes()),
        Value::ByteArray(ref v) => buf.extend_from_slice(v),
        Value::ShortArray(ref v) => {
            for x in v {
                buf.extend_from_slice(&x.to_be_bytes());
            }
        }
        Value::IntArray(ref v) => {
            for x in v {
                buf.extend_from_slice(&x.to_be_bytes());
            }
        }
        Value::LongArray(ref v) => {
            for x in v {
                buf.extend_from_slice(&x.to_be_bytes());
            }
        }
        Value::FloatArray(ref v) => {
            for x in v {
                buf.extend_from_slice(&x.to_bits().to_be_bytes());
            }
        }
        Value::DoubleArray(ref v) => {
            for x in v {
                buf.extend_from_slice(&x.to_bits().to_be_bytes());
            }
        }
        Value::String(ref v) => utf8::encode(buf, v),
        Value::Message(ref v) => {
            for field in v {
                write_field_at(buf, field, taxonomy, depth + 1)?;
            }
        }
        Value::Date(v) => buf.extend_from_slice(&v.to_word().to_be_bytes()),
        Value::Time(v) => buf.extend_from_slice(&v.to_word().to_be_bytes()),
        Value::DateTime(v) => {
            let (date, time) = v.to_words();
            buf.extend_from_slice(&date.to_be_bytes());
            buf.extend_from_slice(&time.to_be_bytes());
        }
        Value::Unknown { ref bytes, .. } => buf.extend_from_slice(bytes),
    }
    Ok(())
}

/// Encode a full envelope around a field sequence. The header's total size
/// is filled in from the encoded body.
pub fn write_envelope(
    buf: &mut Vec<u8>,
    directives: u8,
    schema_version: u8,
    taxonomy_id: i16,
    fields: &[Field],
    taxonomy: Option<&dyn Taxonomy>,
) -> Result<()> {
    let mut body = Vec::new();
    write_fields(&mut body, fields, taxonomy)?;
    let total = ENVELOPE_HEADER_LEN + body.len();
    let total = u32::try_from(total)
        .map_err(|_| Error::malformed("envelope larger than 4GiB"))?;
    write_envelope_header(buf, directives, schema_version, taxonomy_id, total);
    buf.extend_from_slice(&body);
    Ok(())
}
