//! Field values.

use std::fmt;

use crate::datetime::{Date, DateTime, Time};
use crate::message::Message;
use crate::wire::WireType;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The host-side value of a single field.
///
/// Each variant corresponds to the host representation of one or more wire
/// types: every fixed-width byte array and the variable `byte[]` all carry a
/// [`Value::ByteArray`]; which wire type a byte array travels as is decided
/// by the field, not the value. [`Value::Unknown`] preserves the payload of
/// any unassigned type id byte-for-byte.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// Present but carrying no data.
    Indicator,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(#[cfg_attr(feature = "serde", serde(with = "serde_bytes"))] Vec<u8>),
    ShortArray(Vec<i16>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    String(String),
    Message(Message),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    /// Raw payload of a wire type this implementation doesn't know.
    Unknown {
        type_id: u8,
        #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
        bytes: Vec<u8>,
    },
}

impl Value {
    /// The wire type this value naturally travels as. Byte arrays report the
    /// variable-width `byte[]`; the fixed-width variants are chosen at the
    /// field level.
    pub fn natural_wire_type(&self) -> WireType {
        match *self {
            Value::Indicator => WireType::Indicator,
            Value::Boolean(_) => WireType::Boolean,
            Value::Byte(_) => WireType::Byte,
            Value::Short(_) => WireType::Short,
            Value::Int(_) => WireType::Int,
            Value::Long(_) => WireType::Long,
            Value::Float(_) => WireType::Float,
            Value::Double(_) => WireType::Double,
            Value::ByteArray(_) => WireType::ByteArray,
            Value::ShortArray(_) => WireType::ShortArray,
            Value::IntArray(_) => WireType::IntArray,
            Value::LongArray(_) => WireType::LongArray,
            Value::FloatArray(_) => WireType::FloatArray,
            Value::DoubleArray(_) => WireType::DoubleArray,
            Value::String(_) => WireType::String,
            Value::Message(_) => WireType::Message,
            Value::Date(_) => WireType::Date,
            Value::Time(_) => WireType::Time,
            Value::DateTime(_) => WireType::DateTime,
            Value::Unknown { type_id, .. } => WireType::Unknown(type_id),
        }
    }

    pub fn is_indicator(&self) -> bool {
        matches!(*self, Value::Indicator)
    }

    pub fn is_message(&self) -> bool {
        self.as_message().is_some()
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(v) = *self {
            Some(v)
        } else {
            None
        }
    }

    /// The value as an `i64`, if it is any signed-integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(v as i64),
            Value::Short(v) => Some(v as i64),
            Value::Int(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    /// The value as an `f64`, widening any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(ref v) = *self {
            Some(v.as_str())
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> Option<&[u8]> {
        match *self {
            Value::ByteArray(ref v) => Some(v),
            Value::Unknown { ref bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        if let Value::Message(ref v) = *self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match *self {
            Value::Date(v) => Some(v),
            Value::DateTime(v) => Some(v.date()),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match *self {
            Value::Time(v) => Some(v),
            Value::DateTime(v) => Some(v.time()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        if let Value::DateTime(v) = *self {
            Some(v)
        } else {
            None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Indicator => write!(f, "indicator"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::ByteArray(ref v) => write!(f, "byte[{}]", v.len()),
            Value::ShortArray(ref v) => write!(f, "short[{}]", v.len()),
            Value::IntArray(ref v) => write!(f, "int[{}]", v.len()),
            Value::LongArray(ref v) => write!(f, "long[{}]", v.len()),
            Value::FloatArray(ref v) => write!(f, "float[{}]", v.len()),
            Value::DoubleArray(ref v) => write!(f, "double[{}]", v.len()),
            Value::String(ref v) => write!(f, "\"{}\"", v),
            Value::Message(ref v) => fmt::Display::fmt(v, f),
            Value::Date(v) => fmt::Display::fmt(&v, f),
            Value::Time(v) => fmt::Display::fmt(&v, f),
            Value::DateTime(v) => fmt::Display::fmt(&v, f),
            Value::Unknown { type_id, ref bytes } => {
                write!(f, "unknown({})[{}]", type_id, bytes.len())
            }
        }
    }
}

macro_rules! impl_from {
    ($t:ty, $variant:ident) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from!(bool, Boolean);
impl_from!(i8, Byte);
impl_from!(i16, Short);
impl_from!(i32, Int);
impl_from!(i64, Long);
impl_from!(f32, Float);
impl_from!(f64, Double);
impl_from!(Vec<u8>, ByteArray);
impl_from!(Vec<i16>, ShortArray);
impl_from!(Vec<i32>, IntArray);
impl_from!(Vec<i64>, LongArray);
impl_from!(Vec<f32>, FloatArray);
impl_from!(Vec<f64>, DoubleArray);
impl_from!(String, String);
impl_from!(Message, Message);
impl_from!(Date, Date);
impl_from!(Time, Time);
impl_from!(DateTime, DateTime);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::ByteArray(v.to_vec())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Indicator
    }
}
