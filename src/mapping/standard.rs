//! Standard builders: message pass-through, boxed primitives, enumerations,
//! and type-name references.

use std::any::Any;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::value::Value;

use super::builder::{BuilderRegistry, MessageBuilder, ObjectBuilder};
use super::deserializer::Deserializer;
use super::serializer::Serializer;
use super::{KEY_ORDINAL, TYPE_HEADER_ORDINAL};

/// A reference to a registered type, carried as its class name. The Rust
/// rendering of serializing a class object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeName(pub String);

/// Field name under which boxed primitives and type names store their
/// payload.
const VALUE_FIELD: &str = "value";
const NAME_FIELD: &str = "name";

struct MessagePassThrough;

impl MessageBuilder<Message> for MessagePassThrough {
    fn build_message(&self, _ser: &mut Serializer, value: &Message) -> Result<Message> {
        Ok(value.clone())
    }
}

impl ObjectBuilder<Message> for MessagePassThrough {
    fn build_object(&self, _de: &Deserializer, msg: &Message) -> Result<Message> {
        Ok(msg.clone())
    }
}

struct TypeNameBuilder;

impl MessageBuilder<TypeName> for TypeNameBuilder {
    fn build_message(&self, _ser: &mut Serializer, value: &TypeName) -> Result<Message> {
        let mut msg = Message::new();
        msg.add_by_name(NAME_FIELD, value.0.as_str())?;
        Ok(msg)
    }
}

impl ObjectBuilder<TypeName> for TypeNameBuilder {
    fn build_object(&self, _de: &Deserializer, msg: &Message) -> Result<TypeName> {
        let name = msg.get_str(NAME_FIELD).ok_or(Error::ConversionUnavailable {
            wire_type: "message",
            target: "TypeName",
        })?;
        Ok(TypeName(name.to_string()))
    }
}

struct BoxedPrimitive<T>(std::marker::PhantomData<fn() -> T>);

impl<T> MessageBuilder<T> for BoxedPrimitive<T>
where
    T: Any + Send + Sync + Clone + Into<Value>,
{
    fn build_message(&self, _ser: &mut Serializer, value: &T) -> Result<Message> {
        let mut msg = Message::new();
        msg.add_by_name(VALUE_FIELD, value.clone())?;
        Ok(msg)
    }
}

impl<T> ObjectBuilder<T> for BoxedPrimitive<T>
where
    T: Any + Send + Sync + Clone + Into<Value>,
{
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<T> {
        let field = msg
            .get_by_name(VALUE_FIELD)
            .ok_or(Error::ConversionUnavailable {
                wire_type: "message",
                target: std::any::type_name::<T>(),
            })?;
        de.context()
            .dictionary()
            .convert::<T>(field)?
            .ok_or(Error::ConversionUnavailable {
                wire_type: "indicator",
                target: std::any::type_name::<T>(),
            })
    }
}

/// An enumeration serialized by variant name: declaring-type name at
/// ordinal 0, variant name at ordinal 1.
struct EnumByName<T: 'static> {
    declaring_name: &'static str,
    variants: &'static [(&'static str, T)],
}

impl<T> MessageBuilder<T> for EnumByName<T>
where
    T: Any + Send + Sync + Clone + PartialEq,
{
    fn build_message(&self, _ser: &mut Serializer, value: &T) -> Result<Message> {
        let (name, _) = self
            .variants
            .iter()
            .find(|(_, v)| v == value)
            .ok_or(Error::ConversionUnavailable {
                wire_type: "enum",
                target: std::any::type_name::<T>(),
            })?;
        let mut msg = Message::new();
        msg.add_by_ordinal(TYPE_HEADER_ORDINAL as i32, self.declaring_name)?;
        msg.add_by_ordinal(KEY_ORDINAL as i32, *name)?;
        Ok(msg)
    }
}

impl<T> ObjectBuilder<T> for EnumByName<T>
where
    T: Any + Send + Sync + Clone + PartialEq,
{
    fn build_object(&self, _de: &Deserializer, msg: &Message) -> Result<T> {
        let variant = msg
            .get_by_ordinal(KEY_ORDINAL)
            .and_then(|f| f.value().as_str())
            .ok_or(Error::ConversionUnavailable {
                wire_type: "message",
                target: std::any::type_name::<T>(),
            })?;
        self.variants
            .iter()
            .find(|(name, _)| *name == variant)
            .map(|(_, v)| v.clone())
            .ok_or(Error::ConversionUnavailable {
                wire_type: "string",
                target: std::any::type_name::<T>(),
            })
    }
}

impl BuilderRegistry {
    /// Register an enumeration serialized by variant name. The declaring
    /// name doubles as the class header, so an untyped decode dispatches
    /// back to this builder.
    pub fn register_enum_of<T>(
        &self,
        declaring_name: &'static str,
        variants: &'static [(&'static str, T)],
    ) -> Result<()>
    where
        T: Any + Send + Sync + Clone + PartialEq,
    {
        self.register::<T, _>(
            &[declaring_name],
            EnumByName {
                declaring_name,
                variants,
            },
        )
    }

    /// Register the standard builders every context starts with.
    pub(crate) fn register_standard(&self) -> Result<()> {
        self.register::<Message, _>(&[], MessagePassThrough)?;
        self.register::<TypeName, _>(&["fudge.TypeName"], TypeNameBuilder)?;
        self.register_dyn_containers()?;

        macro_rules! boxed {
            ($($t:ty),*) => {
                $(self.register::<$t, _>(&[], BoxedPrimitive::<$t>(std::marker::PhantomData))?;)*
            };
        }
        boxed!(bool, i8, i16, i32, i64, f32, f64, String, Vec<u8>);
        Ok(())
    }
}
