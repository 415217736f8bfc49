//! A single message field.

use std::fmt;

use crate::error::{Error, Result};
use crate::utf8;
use crate::value::Value;
use crate::wire::WireType;
use crate::MAX_NAME_LEN;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One field of a message: an optional name, an optional ordinal, a wire
/// type, and a value.
///
/// A field is immutable once constructed. The wire type always agrees with
/// the value: the only latitude is that a byte-array value may travel as the
/// variable `byte[]` type or as the fixed-width variant matching its length.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Field {
    name: Option<String>,
    ordinal: Option<i16>,
    wire_type: WireType,
    value: Value,
}

impl Field {
    /// Construct a field with an explicit wire type.
    ///
    /// Fails if the name exceeds 255 bytes of modified UTF-8, or if the wire
    /// type cannot carry the value.
    pub fn new(
        name: Option<String>,
        ordinal: Option<i16>,
        wire_type: WireType,
        value: Value,
    ) -> Result<Self> {
        if let Some(ref name) = name {
            if utf8::encoded_len(name) > MAX_NAME_LEN {
                return Err(Error::malformed("field name longer than 255 bytes"));
            }
        }
        check_consistent(wire_type, &value)?;
        Ok(Field {
            name,
            ordinal,
            wire_type,
            value,
        })
    }

    /// Construct a field, picking the wire type from the value itself. Byte
    /// arrays whose length exactly matches a fixed-width variant use it.
    pub fn of(name: Option<String>, ordinal: Option<i16>, value: Value) -> Result<Self> {
        let wire_type = match value {
            Value::ByteArray(ref v) => {
                WireType::fixed_byte_array(v.len()).unwrap_or(WireType::ByteArray)
            }
            ref v => v.natural_wire_type(),
        };
        Field::new(name, ordinal, wire_type, value)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ordinal(&self) -> Option<i16> {
        self.ordinal
    }

    pub fn wire_type(&self) -> WireType {
        self.wire_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    /// The same field with its name replaced.
    pub(crate) fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// The same field with its ordinal replaced.
    pub(crate) fn with_ordinal(mut self, ordinal: Option<i16>) -> Self {
        self.ordinal = ordinal;
        self
    }
}

fn check_consistent(wire_type: WireType, value: &Value) -> Result<()> {
    if wire_type == value.natural_wire_type() {
        return Ok(());
    }
    if wire_type.is_fixed_byte_array() {
        if let Value::ByteArray(ref v) = *value {
            if wire_type.fixed_size() == Some(v.len()) {
                return Ok(());
            }
        }
    }
    Err(Error::malformed(format!(
        "wire type {} cannot carry a {} value",
        wire_type.name(),
        value.natural_wire_type().name()
    )))
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.name.as_deref(), self.ordinal) {
            (Some(name), Some(ord)) => write!(f, "{}:{}={}", name, ord, self.value),
            (Some(name), None) => write!(f, "{}={}", name, self.value),
            (None, Some(ord)) => write!(f, "{}={}", ord, self.value),
            (None, None) => fmt::Display::fmt(&self.value, f),
        }
    }
}
