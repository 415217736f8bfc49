//! Low-level wire decoding.
//!
//! Granular readers over any [`io::Read`] source. The event-driven
//! [`Reader`](crate::Reader) composes these; [`read_fields`] reparses a
//! length-delimited field stream (such as the blob handed back by
//! `skip_sub_message`) into a [`Message`] in one call.

use std::io::{self, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::datetime::{Date, DateTime, Time};
use crate::error::{Error, Result};
use crate::field::Field;
use crate::message::Message;
use crate::prefix::FieldPrefix;
use crate::utf8;
use crate::value::Value;
use crate::wire::WireType;
use crate::{ENVELOPE_HEADER_LEN, MAX_DEPTH};

/// The decoded 8-byte envelope header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub directives: u8,
    pub schema_version: u8,
    pub taxonomy_id: i16,
    /// Total envelope size in bytes, header included.
    pub total_size: u32,
}

/// The header of one field: everything in front of the payload.
#[derive(Clone, Debug)]
pub struct FieldHeader {
    pub name: Option<String>,
    pub ordinal: Option<i16>,
    pub wire_type: WireType,
    /// Payload length in bytes.
    pub length: usize,
    /// Header bytes consumed from the source.
    pub consumed: usize,
}

fn io_step(e: io::Error, step: &'static str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::truncated(step)
    } else {
        Error::IoFailure(e)
    }
}

/// Read an envelope header. A source that is already at EOF yields
/// `Ok(None)`; EOF anywhere inside the header is a truncation.
pub fn read_envelope_header(src: &mut impl Read) -> Result<Option<EnvelopeHeader>> {
    let mut first = [0u8; 1];
    loop {
        match src.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::IoFailure(e)),
        }
    }
    let directives = first[0];
    let schema_version = src.read_u8().map_err(|e| io_step(e, "envelope header"))?;
    let taxonomy_id = src
        .read_i16::<BigEndian>()
        .map_err(|e| io_step(e, "envelope header"))?;
    let total_size = src
        .read_u32::<BigEndian>()
        .map_err(|e| io_step(e, "envelope header"))?;
    if (total_size as usize) < ENVELOPE_HEADER_LEN {
        return Err(Error::malformed("envelope size smaller than its header"));
    }
    Ok(Some(EnvelopeHeader {
        directives,
        schema_version,
        taxonomy_id,
        total_size,
    }))
}

/// Read a field's prefix, type id, ordinal, name, and payload length.
pub fn read_field_header(src: &mut impl Read) -> Result<FieldHeader> {
    let prefix_byte = src.read_u8().map_err(|e| io_step(e, "field prefix"))?;
    let prefix = FieldPrefix::from_u8(prefix_byte)?;
    let type_id = src.read_u8().map_err(|e| io_step(e, "field type id"))?;
    let wire_type = WireType::from_id(type_id);
    let mut consumed = 2;

    let ordinal = if prefix.has_ordinal() {
        let ord = src
            .read_i16::<BigEndian>()
            .map_err(|e| io_step(e, "field ordinal"))?;
        consumed += 2;
        Some(ord)
    } else {
        None
    };

    let name = if prefix.has_name() {
        let len = src.read_u8().map_err(|e| io_step(e, "field name length"))? as usize;
        let mut raw = vec![0u8; len];
        src.read_exact(&mut raw)
            .map_err(|e| io_step(e, "field name"))?;
        consumed += 1 + len;
        Some(utf8::decode(&raw)?)
    } else {
        None
    };

    let length = if prefix.is_fixed_width() {
        match wire_type.fixed_size() {
            Some(width) => width,
            // Width cannot be derived, so the payload cannot be skipped
            // over; unknown types are only tolerated as variable-width.
            None => {
                return Err(Error::malformed(format!(
                    "fixed-width flag on type id {} with no known width",
                    type_id
                )))
            }
        }
    } else {
        if wire_type.is_fixed_width() {
            return Err(Error::malformed(format!(
                "length prefix on fixed-width type {}",
                wire_type.name()
            )));
        }
        let len = match prefix.var_width() {
            1 => src.read_u8().map_err(|e| io_step(e, "field length"))? as usize,
            2 => src
                .read_u16::<BigEndian>()
                .map_err(|e| io_step(e, "field length"))? as usize,
            _ => src
                .read_u32::<BigEndian>()
                .map_err(|e| io_step(e, "field length"))? as usize,
        };
        consumed += prefix.var_width() as usize;
        len
    };

    Ok(FieldHeader {
        name,
        ordinal,
        wire_type,
        length,
        consumed,
    })
}

/// Read a payload of `length` bytes as a value of the given wire type.
pub fn read_value(src: &mut impl Read, wire_type: WireType, length: usize) -> Result<Value> {
    read_value_at(src, wire_type, length, 0)
}

fn read_value_at(
    src: &mut impl Read,
    wire_type: WireType,
    length: usize,
    depth: usize,
) -> Result<Value> {
    if let Some(width) = wire_type.fixed_size() {
        if width != length {
            return Err(Error::malformed("payload length disagrees with type width"));
        }
    }
    Ok(match wire_type {
        WireType::Indicator => Value::Indicator,
        WireType::Boolean => {
            Value::Boolean(src.read_u8().map_err(|e| io_step(e, "boolean payload"))? != 0)
        }
        WireType::Byte => Value::Byte(src.read_i8().map_err(|e| io_step(e, "byte payload"))?),
        WireType::Short => Value::Short(
            src.read_i16::<BigEndian>()
                .map_err(|e| io_step(e, "short payload"))?,
        ),
        WireType::Int => Value::Int(
            src.read_i32::<BigEndian>()
                .map_err(|e| io_step(e, "int payload"))?,
        ),
        WireType::Long => Value::Long(
            src.read_i64::<BigEndian>()
                .map_err(|e| io_step(e, "long payload"))?,
        ),
        WireType::Float => Value::Float(
            src.read_f32::<BigEndian>()
                .map_err(|e| io_step(e, "float payload"))?,
        ),
        WireType::Double => Value::Double(
            src.read_f64::<BigEndian>()
                .map_err(|e| io_step(e, "double payload"))?,
        ),
        WireType::ShortArray => Value::ShortArray(read_array(src, length, 2, |s| {
            s.read_i16::<BigEndian>()
        })?),
        WireType::IntArray => Value::IntArray(read_array(src, length, 4, |s| {
            s.read_i32::<BigEndian>()
        })?),
        WireType::LongArray => Value::LongArray(read_array(src, length, 8, |s| {
            s.read_i64::<BigEndian>()
        })?),
        WireType::FloatArray => Value::FloatArray(read_array(src, length, 4, |s| {
            s.read_f32::<BigEndian>()
        })?),
        WireType::DoubleArray => Value::DoubleArray(read_array(src, length, 8, |s| {
            s.read_f64::<BigEndian>()
        })?),
        WireType::String => {
            let raw = read_exact(src, length, "string payload")?;
            Value::String(utf8::decode(&raw)?)
        }
        WireType::Message => {
            if depth >= MAX_DEPTH {
                return Err(Error::malformed("sub-message nesting too deep"));
            }
            let raw = read_exact(src, length, "sub-message payload")?;
            Value::Message(read_fields_at(&raw, depth + 1)?)
        }
        WireType::Date => {
            let word = src
                .read_u32::<BigEndian>()
                .map_err(|e| io_step(e, "date payload"))?;
            Value::Date(Date::from_word(word)?)
        }
        WireType::Time => {
            let word = src
                .read_u64::<BigEndian>()
                .map_err(|e| io_step(e, "time payload"))?;
            Value::Time(Time::from_word(word)?)
        }
        WireType::DateTime => {
            let date = src
                .read_u32::<BigEndian>()
                .map_err(|e| io_step(e, "datetime payload"))?;
            let time = src
                .read_u64::<BigEndian>()
                .map_err(|e| io_step(e, "datetime payload"))?;
            Value::DateTime(DateTime::from_words(date, time)?)
        }
        WireType::Unknown(type_id) => Value::Unknown {
            type_id,
            bytes: read_exact(src, length, "unknown payload")?,
        },
        // Every fixed byte-array width, plus the variable byte[].
        _ => Value::ByteArray(read_exact(src, length, "byte array payload")?),
    })
}

fn read_exact(src: &mut impl Read, length: usize, step: &'static str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; length];
    src.read_exact(&mut buf).map_err(|e| io_step(e, step))?;
    Ok(buf)
}

fn read_array<T, F>(src: &mut impl Read, length: usize, elem: usize, mut f: F) -> Result<Vec<T>>
where
    F: FnMut(&mut dyn Read) -> io::Result<T>,
{
    if length % elem != 0 {
        return Err(Error::malformed("array payload not a whole number of elements"));
    }
    let mut out = Vec::with_capacity(length / elem);
    let mut src = src.take(length as u64);
    for _ in 0..length / elem {
        out.push(f(&mut src).map_err(|e| io_step(e, "array payload"))?);
    }
    Ok(out)
}

/// Parse a bare field stream (no envelope header) into a message.
pub fn read_fields(buf: &[u8]) -> Result<Message> {
    read_fields_at(buf, 0)
}

fn read_fields_at(mut buf: &[u8], depth: usize) -> Result<Message> {
    let mut msg = Message::new();
    while !buf.is_empty() {
        let header = read_field_header(&mut buf)?;
        if header.length > buf.len() {
            return Err(Error::truncated("field payload"));
        }
        let value = read_value_at(&mut buf, header.wire_type, header.length, depth)?;
        msg.add_field(Field::new(
            header.name,
            header.ordinal,
            header.wire_type,
            value,
        )?);
    }
    Ok(msg)
}
