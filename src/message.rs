//! Message containers.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::taxonomy::Taxonomy;
use crate::utf8;
use crate::value::Value;
use crate::MAX_NAME_LEN;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A mutable, insertion-ordered sequence of fields.
///
/// Lookup by name or ordinal walks the sequence in insertion order; the same
/// name or ordinal may appear any number of times. Integer values added
/// through the `add` family are narrowed to the smallest signed-integer wire
/// type that holds them losslessly, and byte arrays whose length matches one
/// of the fixed widths travel as that fixed-width type.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    fields: Vec<Field>,
}

impl Message {
    pub fn new() -> Self {
        Message { fields: Vec::new() }
    }

    /// Append an already-constructed field.
    pub fn add_field(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Append a value with neither name nor ordinal.
    pub fn add(&mut self, value: impl Into<Value>) -> &mut Self {
        let field = Field::of(None, None, narrow(value.into()))
            .expect("nameless field construction cannot fail");
        self.fields.push(field);
        self
    }

    /// Append a named value.
    pub fn add_by_name(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.add_full(Some(name), None, value)
    }

    /// Append a value under an ordinal.
    pub fn add_by_ordinal(&mut self, ordinal: i32, value: impl Into<Value>) -> Result<&mut Self> {
        self.add_full(None, Some(ordinal), value)
    }

    /// Append a value with any combination of name and ordinal.
    ///
    /// The ordinal is range-checked into 16 signed bits; values outside fail
    /// with [`Error::InvalidOrdinal`].
    pub fn add_full(
        &mut self,
        name: Option<&str>,
        ordinal: Option<i32>,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        let ordinal = match ordinal {
            Some(ord) => Some(
                i16::try_from(ord).map_err(|_| Error::InvalidOrdinal(ord as i64))?,
            ),
            None => None,
        };
        let field = Field::of(name.map(str::to_string), ordinal, narrow(value.into()))?;
        self.fields.push(field);
        Ok(self)
    }

    /// Remove every field matching the given name and/or ordinal, returning
    /// how many were removed. With both `None` this removes nothing; use
    /// [`Message::clear`] for that.
    pub fn remove(&mut self, name: Option<&str>, ordinal: Option<i16>) -> usize {
        if name.is_none() && ordinal.is_none() {
            return 0;
        }
        let before = self.fields.len();
        self.fields.retain(|f| {
            let name_hit = name.map_or(true, |n| f.name() == Some(n));
            let ord_hit = ordinal.map_or(true, |o| f.ordinal() == Some(o));
            !(name_hit && ord_hit)
        });
        before - self.fields.len()
    }

    /// Remove every field with the given name.
    pub fn remove_by_name(&mut self, name: &str) -> usize {
        self.remove(Some(name), None)
    }

    /// Remove every field with the given ordinal.
    pub fn remove_by_ordinal(&mut self, ordinal: i16) -> usize {
        self.remove(None, Some(ordinal))
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    /// The first field with the given name, in insertion order.
    pub fn get_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == Some(name))
    }

    /// Every field with the given name, in insertion order.
    pub fn all_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> {
        self.fields.iter().filter(move |f| f.name() == Some(name))
    }

    /// The first field with the given ordinal, in insertion order.
    pub fn get_by_ordinal(&self, ordinal: i16) -> Option<&Field> {
        self.fields.iter().find(|f| f.ordinal() == Some(ordinal))
    }

    /// Every field with the given ordinal, in insertion order.
    pub fn all_by_ordinal(&self, ordinal: i16) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(move |f| f.ordinal() == Some(ordinal))
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_by_name(name).and_then(|f| f.value().as_bool())
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_by_name(name)
            .and_then(|f| f.value().as_i64())
            .and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get_by_name(name).and_then(|f| f.value().as_i64())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get_by_name(name).and_then(|f| f.value().as_f64())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_by_name(name).and_then(|f| f.value().as_str())
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.get_by_name(name).and_then(|f| f.value().as_slice())
    }

    pub fn get_message(&self, name: &str) -> Option<&Message> {
        self.get_by_name(name).and_then(|f| f.value().as_message())
    }

    pub fn get_bool_by_ordinal(&self, ordinal: i16) -> Option<bool> {
        self.get_by_ordinal(ordinal).and_then(|f| f.value().as_bool())
    }

    pub fn get_i32_by_ordinal(&self, ordinal: i16) -> Option<i32> {
        self.get_by_ordinal(ordinal)
            .and_then(|f| f.value().as_i64())
            .and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_i64_by_ordinal(&self, ordinal: i16) -> Option<i64> {
        self.get_by_ordinal(ordinal).and_then(|f| f.value().as_i64())
    }

    pub fn get_f64_by_ordinal(&self, ordinal: i16) -> Option<f64> {
        self.get_by_ordinal(ordinal).and_then(|f| f.value().as_f64())
    }

    pub fn get_str_by_ordinal(&self, ordinal: i16) -> Option<&str> {
        self.get_by_ordinal(ordinal).and_then(|f| f.value().as_str())
    }

    pub fn get_bytes_by_ordinal(&self, ordinal: i16) -> Option<&[u8]> {
        self.get_by_ordinal(ordinal).and_then(|f| f.value().as_slice())
    }

    pub fn get_message_by_ordinal(&self, ordinal: i16) -> Option<&Message> {
        self.get_by_ordinal(ordinal)
            .and_then(|f| f.value().as_message())
    }

    /// Fill in names from a taxonomy: every field that has an ordinal but no
    /// name gets the taxonomy's name for that ordinal, recursing into
    /// sub-messages. Fields the taxonomy doesn't cover are left alone.
    pub fn apply_taxonomy(&mut self, taxonomy: &dyn Taxonomy) {
        for field in &mut self.fields {
            if field.name().is_none() {
                if let Some(ordinal) = field.ordinal() {
                    if let Some(name) = taxonomy.name_for(ordinal) {
                        if utf8::encoded_len(name) <= MAX_NAME_LEN {
                            *field = field.clone().with_name(Some(name.to_string()));
                        } else {
                            debug!(ordinal, "taxonomy name too long; leaving ordinal bare");
                        }
                    }
                }
            }
            if let Value::Message(ref mut sub) = *field.value_mut() {
                sub.apply_taxonomy(taxonomy);
            }
        }
    }

    /// Snapshot this message into an immutable view.
    pub fn freeze(&self) -> ImmutableMessage {
        ImmutableMessage {
            fields: Arc::from(self.fields.clone().into_boxed_slice()),
        }
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<Field> for Message {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Message {
            fields: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FudgeMsg[")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            fmt::Display::fmt(field, f)?;
        }
        write!(f, "]")
    }
}

/// An immutable snapshot of a message, cheap to clone and share.
///
/// Presents the read half of the [`Message`] contract; the captured field
/// sequence never changes even if the source message is mutated afterwards.
#[derive(Clone, Debug)]
pub struct ImmutableMessage {
    fields: Arc<[Field]>,
}

impl ImmutableMessage {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == Some(name))
    }

    pub fn get_by_ordinal(&self, ordinal: i16) -> Option<&Field> {
        self.fields.iter().find(|f| f.ordinal() == Some(ordinal))
    }

    /// Copy the snapshot back into a mutable message.
    pub fn thaw(&self) -> Message {
        Message {
            fields: self.fields.to_vec(),
        }
    }
}

impl From<&Message> for ImmutableMessage {
    fn from(msg: &Message) -> Self {
        msg.freeze()
    }
}

impl PartialEq for ImmutableMessage {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

/// Narrow an integer value to the smallest signed-integer wire type that
/// holds it losslessly. Non-integer values pass through unchanged.
fn narrow(value: Value) -> Value {
    match value {
        Value::Short(v) => narrow_i64(v as i64),
        Value::Int(v) => narrow_i64(v as i64),
        Value::Long(v) => narrow_i64(v),
        other => other,
    }
}

fn narrow_i64(v: i64) -> Value {
    if let Ok(v) = i8::try_from(v) {
        Value::Byte(v)
    } else if let Ok(v) = i16::try_from(v) {
        Value::Short(v)
    } else if let Ok(v) = i32::try_from(v) {
        Value::Int(v)
    } else {
        Value::Long(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::MapTaxonomy;
    use crate::wire::WireType;
    use assert_matches::assert_matches;

    #[test]
    fn insertion_order_preserved() {
        let mut msg = Message::new();
        msg.add_by_name("a", 1i32).unwrap();
        msg.add_by_name("b", 2i32).unwrap();
        msg.add_by_name("a", 3i32).unwrap();
        let names: Vec<_> = msg.iter().map(|f| f.name().unwrap()).collect();
        assert_eq!(names, ["a", "b", "a"]);
        let a_values: Vec<_> = msg
            .all_by_name("a")
            .map(|f| f.value().as_i64().unwrap())
            .collect();
        assert_eq!(a_values, [1, 3]);
    }

    #[test]
    fn integers_narrow_to_smallest_type() {
        let mut msg = Message::new();
        msg.add_by_name("tiny", 42i64).unwrap();
        msg.add_by_name("small", 300i64).unwrap();
        msg.add_by_name("medium", 70_000i64).unwrap();
        msg.add_by_name("large", 5_000_000_000i64).unwrap();
        assert_eq!(msg.get_by_name("tiny").unwrap().wire_type(), WireType::Byte);
        assert_eq!(msg.get_by_name("small").unwrap().wire_type(), WireType::Short);
        assert_eq!(msg.get_by_name("medium").unwrap().wire_type(), WireType::Int);
        assert_eq!(msg.get_by_name("large").unwrap().wire_type(), WireType::Long);
    }

    #[test]
    fn narrowing_is_idempotent() {
        let mut msg = Message::new();
        msg.add_by_name("x", 42i32).unwrap();
        msg.add_by_name("x", 42i8).unwrap();
        let types: Vec<_> = msg.all_by_name("x").map(|f| f.wire_type()).collect();
        assert_eq!(types, [WireType::Byte, WireType::Byte]);
    }

    #[test]
    fn ordinal_bounds() {
        let mut msg = Message::new();
        assert!(msg.add_by_ordinal(-32768, 1i32).is_ok());
        assert!(msg.add_by_ordinal(32767, 1i32).is_ok());
        assert_matches!(
            msg.add_by_ordinal(-32769, 1i32),
            Err(Error::InvalidOrdinal(-32769))
        );
        assert_matches!(
            msg.add_by_ordinal(32768, 1i32),
            Err(Error::InvalidOrdinal(32768))
        );
    }

    #[test]
    fn remove_by_name_and_ordinal() {
        let mut msg = Message::new();
        msg.add_full(Some("a"), Some(1), 1i32).unwrap();
        msg.add_full(Some("a"), Some(2), 2i32).unwrap();
        msg.add_full(Some("b"), Some(1), 3i32).unwrap();
        assert_eq!(msg.remove(Some("a"), Some(1)), 1);
        assert_eq!(msg.len(), 2);
        assert_eq!(msg.remove_by_name("a"), 1);
        assert_eq!(msg.remove_by_ordinal(1), 1);
        assert!(msg.is_empty());
    }

    #[test]
    fn typed_getters_widen() {
        let mut msg = Message::new();
        msg.add_by_name("n", 7i32).unwrap();
        // Stored narrowed to byte; still readable at any integer width.
        assert_eq!(msg.get_i32("n"), Some(7));
        assert_eq!(msg.get_i64("n"), Some(7));
        assert_eq!(msg.get_f64("n"), Some(7.0));
        assert_eq!(msg.get_str("n"), None);
    }

    #[test]
    fn taxonomy_back_application_recurses() {
        let tax = MapTaxonomy::new([(1, "price"), (2, "size")]).unwrap();
        let mut inner = Message::new();
        inner.add_by_ordinal(2, 100i32).unwrap();
        let mut msg = Message::new();
        msg.add_by_ordinal(1, 9.5f64).unwrap();
        msg.add_full(Some("kept"), Some(2), 1i32).unwrap();
        msg.add_by_ordinal(3, inner).unwrap();
        msg.apply_taxonomy(&tax);

        assert_eq!(msg.fields()[0].name(), Some("price"));
        // A field that already has a name keeps it.
        assert_eq!(msg.fields()[1].name(), Some("kept"));
        // Ordinal 3 isn't in the taxonomy.
        assert_eq!(msg.fields()[2].name(), None);
        let sub = msg.fields()[2].value().as_message().unwrap();
        assert_eq!(sub.fields()[0].name(), Some("size"));
    }

    #[test]
    fn freeze_captures_current_fields() {
        let mut msg = Message::new();
        msg.add_by_name("a", 1i32).unwrap();
        let frozen = msg.freeze();
        msg.add_by_name("b", 2i32).unwrap();
        assert_eq!(frozen.len(), 1);
        assert_eq!(msg.len(), 2);
        assert_eq!(frozen.thaw().len(), 1);
    }

    #[test]
    fn display_is_compact() {
        let mut msg = Message::new();
        msg.add_by_name("greeting", "hi").unwrap();
        msg.add_by_ordinal(1, 42i32).unwrap();
        assert_eq!(msg.to_string(), "FudgeMsg[greeting=\"hi\", 1=42]");
    }
}
