//! Default builders for sequences, sets, and maps.
//!
//! Wire shapes:
//!
//! - A sequence is a sub-message whose elements carry neither name nor
//!   ordinal; a null element travels as an indicator field.
//! - A set is a sub-message whose elements carry ordinal 1, optionally with
//!   a common element-type hint at ordinal 3.
//! - A map is a sub-message of key fields (ordinal 1) and value fields
//!   (ordinal 2) paired FIFO, optionally with type hints at ordinals 3 and 4.
//!
//! A message with no ordinal-0 class hints is recognized as one of these
//! shapes by scanning its ordinals; any ordinal outside the container
//! vocabulary aborts recognition.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::message::Message;
use crate::value::Value;

use super::builder::{BuilderRegistry, ErasedObjectBuilder, MessageBuilder, ObjectBuilder};
use super::deserializer::Deserializer;
use super::serializer::Serializer;
use super::{
    DynObject, KEY_ORDINAL, KEY_TYPE_HINT_ORDINAL, VALUE_ORDINAL, VALUE_TYPE_HINT_ORDINAL,
};

/// An untyped sequence: insertion-ordered, duplicates allowed, `None` for
/// null elements.
#[derive(Default)]
pub struct DynSequence(pub Vec<Option<DynObject>>);

/// An untyped set. Trait objects cannot hash, so membership survives a
/// round trip but order is whatever the wire carried and duplicates are not
/// collapsed.
#[derive(Default)]
pub struct DynSet(pub Vec<Option<DynObject>>);

/// An untyped map: key/value pairs in wire order.
#[derive(Default)]
pub struct DynMap(pub Vec<(Option<DynObject>, Option<DynObject>)>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ContainerKind {
    Sequence,
    Set,
    Map,
}

/// Recognize the container shape of a hint-less message from its ordinals.
pub(crate) fn detect(msg: &Message) -> Option<ContainerKind> {
    let mut saw_key = false;
    let mut saw_value = false;
    for field in msg {
        match field.ordinal() {
            None => {}
            Some(KEY_ORDINAL) => saw_key = true,
            Some(VALUE_ORDINAL) => saw_value = true,
            Some(KEY_TYPE_HINT_ORDINAL) | Some(VALUE_TYPE_HINT_ORDINAL) => {}
            Some(_) => return None,
        }
    }
    match (saw_key, saw_value) {
        (true, true) => Some(ContainerKind::Map),
        (true, false) => Some(ContainerKind::Set),
        (false, false) => Some(ContainerKind::Sequence),
        (false, true) => None,
    }
}

/// The element builder a type hint names, when it resolves.
fn hinted_builder(de: &Deserializer, msg: &Message, hint_ordinal: i16) -> Option<ErasedObjectBuilder> {
    let name = msg.get_by_ordinal(hint_ordinal)?.value().as_str()?;
    let resolved = de.context().dictionary().resolve_class_name(name);
    let ty = de.context().builders().type_for_name(&resolved)?;
    de.context().builders().object_builder(ty)
}

fn element(
    de: &Deserializer,
    field: &Field,
    hinted: Option<&ErasedObjectBuilder>,
) -> Result<Option<DynObject>> {
    match (field.value(), hinted) {
        (Value::Message(sub), Some(builder)) => builder(de, sub).map(Some),
        _ => de.field_value_to_object(field),
    }
}

pub(crate) fn decode_dyn_sequence(de: &Deserializer, msg: &Message) -> Result<DynSequence> {
    let mut out = Vec::with_capacity(msg.len());
    for field in msg {
        if field.name().is_some() {
            continue;
        }
        out.push(de.field_value_to_object(field)?);
    }
    Ok(DynSequence(out))
}

pub(crate) fn decode_dyn_set(de: &Deserializer, msg: &Message) -> Result<DynSet> {
    let hinted = hinted_builder(de, msg, KEY_TYPE_HINT_ORDINAL);
    let mut out = Vec::new();
    for field in msg {
        if field.ordinal() == Some(KEY_ORDINAL) {
            out.push(element(de, field, hinted.as_ref())?);
        }
    }
    Ok(DynSet(out))
}

pub(crate) fn decode_dyn_map(de: &Deserializer, msg: &Message) -> Result<DynMap> {
    let key_builder = hinted_builder(de, msg, KEY_TYPE_HINT_ORDINAL);
    let value_builder = hinted_builder(de, msg, VALUE_TYPE_HINT_ORDINAL);
    let mut keys = Vec::new();
    let mut values = Vec::new();
    for field in msg {
        match field.ordinal() {
            Some(KEY_ORDINAL) => keys.push(element(de, field, key_builder.as_ref())?),
            Some(VALUE_ORDINAL) => values.push(element(de, field, value_builder.as_ref())?),
            _ => {}
        }
    }
    if keys.len() != values.len() {
        return Err(Error::malformed("map entries with unpaired keys or values"));
    }
    Ok(DynMap(keys.into_iter().zip(values).collect()))
}

fn add_dyn_element(
    ser: &mut Serializer,
    msg: &mut Message,
    ordinal: Option<i16>,
    elem: &Option<DynObject>,
) -> Result<()> {
    match elem {
        None => {
            msg.add_full(None, ordinal.map(i32::from), Value::Indicator)?;
            Ok(())
        }
        Some(obj) => ser.add_dyn(msg, None, ordinal.map(i32::from), obj.as_ref()),
    }
}

pub(crate) struct DynSequenceBuilder;

impl MessageBuilder<DynSequence> for DynSequenceBuilder {
    fn build_message(&self, ser: &mut Serializer, value: &DynSequence) -> Result<Message> {
        let mut msg = Message::new();
        for elem in &value.0 {
            add_dyn_element(ser, &mut msg, None, elem)?;
        }
        Ok(msg)
    }
}

impl ObjectBuilder<DynSequence> for DynSequenceBuilder {
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<DynSequence> {
        decode_dyn_sequence(de, msg)
    }
}

pub(crate) struct DynSetBuilder;

impl MessageBuilder<DynSet> for DynSetBuilder {
    fn build_message(&self, ser: &mut Serializer, value: &DynSet) -> Result<Message> {
        let mut msg = Message::new();
        for elem in &value.0 {
            add_dyn_element(ser, &mut msg, Some(KEY_ORDINAL), elem)?;
        }
        Ok(msg)
    }
}

impl ObjectBuilder<DynSet> for DynSetBuilder {
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<DynSet> {
        decode_dyn_set(de, msg)
    }
}

pub(crate) struct DynMapBuilder;

impl MessageBuilder<DynMap> for DynMapBuilder {
    fn build_message(&self, ser: &mut Serializer, value: &DynMap) -> Result<Message> {
        let mut msg = Message::new();
        for (key, val) in &value.0 {
            add_dyn_element(ser, &mut msg, Some(KEY_ORDINAL), key)?;
            add_dyn_element(ser, &mut msg, Some(VALUE_ORDINAL), val)?;
        }
        Ok(msg)
    }
}

impl ObjectBuilder<DynMap> for DynMapBuilder {
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<DynMap> {
        decode_dyn_map(de, msg)
    }
}

/// Add the common-element type hint if the element type has a registered
/// class name.
fn add_type_hint<T: Any>(msg: &mut Message, ser: &Serializer, hint_ordinal: i16) -> Result<()> {
    if let Some(names) = ser.context().builders().header_names(TypeId::of::<T>()) {
        if let Some(name) = names.first() {
            msg.add_full(None, Some(hint_ordinal as i32), name.as_str())?;
        }
    }
    Ok(())
}

pub(crate) struct SequenceBuilder<T>(PhantomData<fn() -> T>);

impl<T> SequenceBuilder<T> {
    pub(crate) fn new() -> Self {
        SequenceBuilder(PhantomData)
    }
}

impl<T: Any + Send + Sync> MessageBuilder<Vec<T>> for SequenceBuilder<T> {
    fn build_message(&self, ser: &mut Serializer, value: &Vec<T>) -> Result<Message> {
        let mut msg = Message::new();
        for elem in value {
            ser.add_to_message(&mut msg, None, None, elem)?;
        }
        Ok(msg)
    }
}

impl<T: Any + Send + Sync> ObjectBuilder<Vec<T>> for SequenceBuilder<T> {
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(msg.len());
        for field in msg {
            if field.name().is_some() {
                continue;
            }
            let elem = de.field_value_to_object_as::<T>(field)?.ok_or({
                Error::ConversionUnavailable {
                    wire_type: "indicator",
                    target: std::any::type_name::<T>(),
                }
            })?;
            out.push(elem);
        }
        Ok(out)
    }
}

pub(crate) struct SetBuilder<T>(PhantomData<fn() -> T>);

impl<T> SetBuilder<T> {
    pub(crate) fn new() -> Self {
        SetBuilder(PhantomData)
    }
}

impl<T: Any + Send + Sync + Eq + Hash> MessageBuilder<HashSet<T>> for SetBuilder<T> {
    fn build_message(&self, ser: &mut Serializer, value: &HashSet<T>) -> Result<Message> {
        let mut msg = Message::new();
        add_type_hint::<T>(&mut msg, ser, KEY_TYPE_HINT_ORDINAL)?;
        for elem in value {
            ser.add_to_message(&mut msg, None, Some(KEY_ORDINAL as i32), elem)?;
        }
        Ok(msg)
    }
}

impl<T: Any + Send + Sync + Eq + Hash> ObjectBuilder<HashSet<T>> for SetBuilder<T> {
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<HashSet<T>> {
        let mut out = HashSet::new();
        for field in msg.all_by_ordinal(KEY_ORDINAL) {
            let elem = de.field_value_to_object_as::<T>(field)?.ok_or({
                Error::ConversionUnavailable {
                    wire_type: "indicator",
                    target: std::any::type_name::<T>(),
                }
            })?;
            out.insert(elem);
        }
        Ok(out)
    }
}

pub(crate) struct MapBuilder<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> MapBuilder<K, V> {
    pub(crate) fn new() -> Self {
        MapBuilder(PhantomData)
    }
}

impl<K, V> MessageBuilder<HashMap<K, V>> for MapBuilder<K, V>
where
    K: Any + Send + Sync + Eq + Hash,
    V: Any + Send + Sync,
{
    fn build_message(&self, ser: &mut Serializer, value: &HashMap<K, V>) -> Result<Message> {
        let mut msg = Message::new();
        add_type_hint::<K>(&mut msg, ser, KEY_TYPE_HINT_ORDINAL)?;
        add_type_hint::<V>(&mut msg, ser, VALUE_TYPE_HINT_ORDINAL)?;
        for (key, val) in value {
            ser.add_to_message(&mut msg, None, Some(KEY_ORDINAL as i32), key)?;
            ser.add_to_message(&mut msg, None, Some(VALUE_ORDINAL as i32), val)?;
        }
        Ok(msg)
    }
}

impl<K, V> ObjectBuilder<HashMap<K, V>> for MapBuilder<K, V>
where
    K: Any + Send + Sync + Eq + Hash,
    V: Any + Send + Sync,
{
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<HashMap<K, V>> {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for field in msg {
            match field.ordinal() {
                Some(KEY_ORDINAL) => keys.push(de.field_value_to_object_as::<K>(field)?),
                Some(VALUE_ORDINAL) => values.push(de.field_value_to_object_as::<V>(field)?),
                _ => {}
            }
        }
        if keys.len() != values.len() {
            return Err(Error::malformed("map entries with unpaired keys or values"));
        }
        let mut out = HashMap::with_capacity(keys.len());
        for (key, val) in keys.into_iter().zip(values) {
            let (Some(key), Some(val)) = (key, val) else {
                return Err(Error::ConversionUnavailable {
                    wire_type: "indicator",
                    target: "typed map entry",
                });
            };
            out.insert(key, val);
        }
        Ok(out)
    }
}

pub(crate) struct ArrayBuilder<T, const N: usize>(PhantomData<fn() -> T>);

impl<T, const N: usize> ArrayBuilder<T, N> {
    pub(crate) fn new() -> Self {
        ArrayBuilder(PhantomData)
    }
}

impl<T: Any + Send + Sync, const N: usize> MessageBuilder<[T; N]> for ArrayBuilder<T, N> {
    fn build_message(&self, ser: &mut Serializer, value: &[T; N]) -> Result<Message> {
        let mut msg = Message::new();
        for elem in value {
            ser.add_to_message(&mut msg, None, None, elem)?;
        }
        Ok(msg)
    }
}

impl<T: Any + Send + Sync, const N: usize> ObjectBuilder<[T; N]> for ArrayBuilder<T, N> {
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<[T; N]> {
        let mut out = Vec::with_capacity(N);
        for field in msg {
            if field.name().is_some() {
                continue;
            }
            let elem = de.field_value_to_object_as::<T>(field)?.ok_or({
                Error::ConversionUnavailable {
                    wire_type: "indicator",
                    target: std::any::type_name::<T>(),
                }
            })?;
            out.push(elem);
        }
        match <[T; N]>::try_from(out) {
            Ok(arr) => Ok(arr),
            Err(_) => Err(Error::ConversionUnavailable {
                wire_type: "message",
                target: std::any::type_name::<[T; N]>(),
            }),
        }
    }
}

impl BuilderRegistry {
    /// Register the sequence builder for `Vec<T>`.
    pub fn register_sequence_of<T: Any + Send + Sync>(&self) -> Result<()> {
        self.register::<Vec<T>, _>(&[], SequenceBuilder::<T>::new())
    }

    /// Register the array builder for `[T; N]`. Decoding fails unless the
    /// message holds exactly `N` elements.
    pub fn register_array_of<T: Any + Send + Sync, const N: usize>(&self) -> Result<()> {
        self.register::<[T; N], _>(&[], ArrayBuilder::<T, N>::new())
    }

    /// Register the set builder for `HashSet<T>`.
    pub fn register_set_of<T: Any + Send + Sync + Eq + Hash>(&self) -> Result<()> {
        self.register::<HashSet<T>, _>(&[], SetBuilder::<T>::new())
    }

    /// Register the map builder for `HashMap<K, V>`.
    pub fn register_map_of<K, V>(&self) -> Result<()>
    where
        K: Any + Send + Sync + Eq + Hash,
        V: Any + Send + Sync,
    {
        self.register::<HashMap<K, V>, _>(&[], MapBuilder::<K, V>::new())
    }

    /// Register the dynamic container builders. Called once per context.
    pub(crate) fn register_dyn_containers(&self) -> Result<()> {
        self.register::<DynSequence, _>(&[], DynSequenceBuilder)?;
        self.register::<DynSet, _>(&[], DynSetBuilder)?;
        self.register::<DynMap, _>(&[], DynMapBuilder)
    }
}
