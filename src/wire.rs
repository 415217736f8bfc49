//! Wire type identifiers.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The type id carried by every encoded field.
///
/// The standard ids are fixed by the format and never change. Any id that is
/// not assigned decodes as [`WireType::Unknown`], whose payload is preserved
/// verbatim as raw bytes, so a stream containing types from a newer peer
/// still round-trips.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WireType {
    /// Zero-length marker for "present but null".
    Indicator,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    ByteArray,
    ShortArray,
    IntArray,
    LongArray,
    Float,
    Double,
    FloatArray,
    DoubleArray,
    String,
    /// A nested field stream.
    Message,
    ByteArray4,
    ByteArray8,
    ByteArray16,
    ByteArray20,
    ByteArray32,
    ByteArray64,
    ByteArray128,
    ByteArray256,
    ByteArray512,
    Date,
    Time,
    DateTime,
    /// Any id without a standard assignment.
    Unknown(u8),
}

impl WireType {
    /// Map a type id byte to its wire type. Never fails; unassigned ids map
    /// to [`WireType::Unknown`].
    pub fn from_id(id: u8) -> WireType {
        match id {
            0 => WireType::Indicator,
            1 => WireType::Boolean,
            2 => WireType::Byte,
            3 => WireType::Short,
            4 => WireType::Int,
            5 => WireType::Long,
            6 => WireType::ByteArray,
            7 => WireType::ShortArray,
            8 => WireType::IntArray,
            9 => WireType::LongArray,
            10 => WireType::Float,
            11 => WireType::Double,
            12 => WireType::FloatArray,
            13 => WireType::DoubleArray,
            14 => WireType::String,
            15 => WireType::Message,
            17 => WireType::ByteArray4,
            18 => WireType::ByteArray8,
            19 => WireType::ByteArray16,
            20 => WireType::ByteArray20,
            21 => WireType::ByteArray32,
            22 => WireType::ByteArray64,
            23 => WireType::ByteArray128,
            24 => WireType::ByteArray256,
            25 => WireType::ByteArray512,
            26 => WireType::Date,
            27 => WireType::Time,
            28 => WireType::DateTime,
            other => WireType::Unknown(other),
        }
    }

    /// The id byte written to the wire for this type.
    pub fn id(self) -> u8 {
        match self {
            WireType::Indicator => 0,
            WireType::Boolean => 1,
            WireType::Byte => 2,
            WireType::Short => 3,
            WireType::Int => 4,
            WireType::Long => 5,
            WireType::ByteArray => 6,
            WireType::ShortArray => 7,
            WireType::IntArray => 8,
            WireType::LongArray => 9,
            WireType::Float => 10,
            WireType::Double => 11,
            WireType::FloatArray => 12,
            WireType::DoubleArray => 13,
            WireType::String => 14,
            WireType::Message => 15,
            WireType::ByteArray4 => 17,
            WireType::ByteArray8 => 18,
            WireType::ByteArray16 => 19,
            WireType::ByteArray20 => 20,
            WireType::ByteArray32 => 21,
            WireType::ByteArray64 => 22,
            WireType::ByteArray128 => 23,
            WireType::ByteArray256 => 24,
            WireType::ByteArray512 => 25,
            WireType::Date => 26,
            WireType::Time => 27,
            WireType::DateTime => 28,
            WireType::Unknown(id) => id,
        }
    }

    /// Payload width in bytes for fixed-width types, `None` for
    /// variable-width types. Unknown types are always variable-width.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            WireType::Indicator => Some(0),
            WireType::Boolean | WireType::Byte => Some(1),
            WireType::Short => Some(2),
            WireType::Int | WireType::Float => Some(4),
            WireType::Long | WireType::Double => Some(8),
            WireType::ByteArray4 => Some(4),
            WireType::ByteArray8 => Some(8),
            WireType::ByteArray16 => Some(16),
            WireType::ByteArray20 => Some(20),
            WireType::ByteArray32 => Some(32),
            WireType::ByteArray64 => Some(64),
            WireType::ByteArray128 => Some(128),
            WireType::ByteArray256 => Some(256),
            WireType::ByteArray512 => Some(512),
            WireType::Date => Some(4),
            WireType::Time => Some(8),
            WireType::DateTime => Some(12),
            _ => None,
        }
    }

    pub fn is_fixed_width(self) -> bool {
        self.fixed_size().is_some()
    }

    /// The fixed byte-array type matching `len` exactly, if there is one.
    pub fn fixed_byte_array(len: usize) -> Option<WireType> {
        match len {
            4 => Some(WireType::ByteArray4),
            8 => Some(WireType::ByteArray8),
            16 => Some(WireType::ByteArray16),
            20 => Some(WireType::ByteArray20),
            32 => Some(WireType::ByteArray32),
            64 => Some(WireType::ByteArray64),
            128 => Some(WireType::ByteArray128),
            256 => Some(WireType::ByteArray256),
            512 => Some(WireType::ByteArray512),
            _ => None,
        }
    }

    /// True for every fixed-width byte-array variant.
    pub fn is_fixed_byte_array(self) -> bool {
        matches!(
            self,
            WireType::ByteArray4
                | WireType::ByteArray8
                | WireType::ByteArray16
                | WireType::ByteArray20
                | WireType::ByteArray32
                | WireType::ByteArray64
                | WireType::ByteArray128
                | WireType::ByteArray256
                | WireType::ByteArray512
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            WireType::Indicator => "indicator",
            WireType::Boolean => "boolean",
            WireType::Byte => "byte",
            WireType::Short => "short",
            WireType::Int => "int",
            WireType::Long => "long",
            WireType::ByteArray => "byte[]",
            WireType::ShortArray => "short[]",
            WireType::IntArray => "int[]",
            WireType::LongArray => "long[]",
            WireType::Float => "float",
            WireType::Double => "double",
            WireType::FloatArray => "float[]",
            WireType::DoubleArray => "double[]",
            WireType::String => "string",
            WireType::Message => "message",
            WireType::ByteArray4 => "byte[4]",
            WireType::ByteArray8 => "byte[8]",
            WireType::ByteArray16 => "byte[16]",
            WireType::ByteArray20 => "byte[20]",
            WireType::ByteArray32 => "byte[32]",
            WireType::ByteArray64 => "byte[64]",
            WireType::ByteArray128 => "byte[128]",
            WireType::ByteArray256 => "byte[256]",
            WireType::ByteArray512 => "byte[512]",
            WireType::Date => "date",
            WireType::Time => "time",
            WireType::DateTime => "datetime",
            WireType::Unknown(_) => "unknown",
        }
    }
}

impl From<WireType> for u8 {
    fn from(val: WireType) -> u8 {
        val.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for id in 0u8..=255 {
            let ty = WireType::from_id(id);
            assert_eq!(ty.id(), id);
        }
    }

    #[test]
    fn unassigned_ids_are_unknown() {
        assert_eq!(WireType::from_id(16), WireType::Unknown(16));
        assert_eq!(WireType::from_id(29), WireType::Unknown(29));
        assert_eq!(WireType::from_id(255), WireType::Unknown(255));
    }

    #[test]
    fn fixed_widths() {
        assert_eq!(WireType::Indicator.fixed_size(), Some(0));
        assert_eq!(WireType::Long.fixed_size(), Some(8));
        assert_eq!(WireType::ByteArray20.fixed_size(), Some(20));
        assert_eq!(WireType::DateTime.fixed_size(), Some(12));
        assert_eq!(WireType::String.fixed_size(), None);
        assert_eq!(WireType::Unknown(200).fixed_size(), None);
    }

    #[test]
    fn byte_array_best_match() {
        assert_eq!(WireType::fixed_byte_array(16), Some(WireType::ByteArray16));
        assert_eq!(WireType::fixed_byte_array(5), None);
        assert_eq!(WireType::fixed_byte_array(15), None);
        assert_eq!(WireType::fixed_byte_array(17), None);
    }
}
