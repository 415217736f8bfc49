//! The deserialization context.

use std::any::{Any, TypeId};

use tracing::debug;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::message::Message;
use crate::value::Value;

use super::containers::{self, ContainerKind};
use super::{DynObject, TYPE_HEADER_ORDINAL};

/// Drives object builders over decoded messages.
///
/// The untyped entry point follows the class-name hints at ordinal 0 when
/// present, falls back to container detection, and finally hands back the
/// raw message when nothing applies. The typed entry points constrain the
/// hints to the requested type and fall back to its registered builder.
pub struct Deserializer<'c> {
    ctx: &'c Context,
}

impl<'c> Deserializer<'c> {
    pub(crate) fn new(ctx: &'c Context) -> Self {
        Deserializer { ctx }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    /// Decode a message into whatever its hints say it is.
    ///
    /// Resolution order: ordinal-0 class names (through the rename
    /// registry), then container detection, then the message itself. A
    /// numeric ordinal-0 field is a reserved back/forward reference and
    /// fails with [`Error::UnsupportedFeature`].
    pub fn message_to_object(&self, msg: &Message) -> Result<DynObject> {
        for candidate in self.class_candidates(msg)? {
            if let Some(built) = self.try_candidate(&candidate, msg)? {
                return Ok(built);
            }
        }
        match containers::detect(msg) {
            Some(ContainerKind::Sequence) => {
                Ok(Box::new(containers::decode_dyn_sequence(self, msg)?))
            }
            Some(ContainerKind::Set) => Ok(Box::new(containers::decode_dyn_set(self, msg)?)),
            Some(ContainerKind::Map) => Ok(Box::new(containers::decode_dyn_map(self, msg)?)),
            None => Ok(Box::new(msg.clone())),
        }
    }

    /// Decode a message into `T`.
    ///
    /// Only ordinal-0 candidates that resolve to `T` itself are honored;
    /// with none, the builder registered for `T` is used directly. Fails
    /// with [`Error::NoBuilder`] when `T` has no registered builder.
    pub fn message_to_object_as<T: Any + Send + Sync>(&self, msg: &Message) -> Result<T> {
        let target = TypeId::of::<T>();
        for candidate in self.class_candidates(msg)? {
            if self.ctx.builders().type_for_name(&candidate) == Some(target) {
                if let Some(built) = self.try_candidate(&candidate, msg)? {
                    return match built.downcast::<T>() {
                        Ok(v) => Ok(*v),
                        Err(_) => Err(Error::NoBuilder {
                            target: std::any::type_name::<T>().to_string(),
                        }),
                    };
                }
            }
        }
        let builder = self
            .ctx
            .builders()
            .object_builder(target)
            .ok_or_else(|| Error::NoBuilder {
                target: std::any::type_name::<T>().to_string(),
            })?;
        let built = builder(self, msg)?;
        match built.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(_) => Err(Error::NoBuilder {
                target: std::any::type_name::<T>().to_string(),
            }),
        }
    }

    /// Decode a field: sub-messages recurse, anything else comes back as
    /// its raw host value. Indicator fields decode to `None`.
    pub fn field_value_to_object(&self, field: &Field) -> Result<Option<DynObject>> {
        match field.value() {
            Value::Indicator => Ok(None),
            Value::Message(sub) => Ok(Some(self.message_to_object(sub)?)),
            value => Ok(Some(raw_value(value))),
        }
    }

    /// Decode a field into `T`: sub-messages recurse through the typed
    /// entry point, anything else goes through the type dictionary's
    /// conversion. Indicator fields decode to `None`.
    pub fn field_value_to_object_as<T: Any + Send + Sync>(
        &self,
        field: &Field,
    ) -> Result<Option<T>> {
        match field.value() {
            Value::Indicator => Ok(None),
            Value::Message(sub) => Ok(Some(self.message_to_object_as::<T>(sub)?)),
            _ => self.ctx.dictionary().convert::<T>(field),
        }
    }

    /// The ordinal-0 class-name candidates, rename-resolved, most specific
    /// first.
    fn class_candidates(&self, msg: &Message) -> Result<Vec<String>> {
        let mut candidates = Vec::new();
        for field in msg.all_by_ordinal(TYPE_HEADER_ORDINAL) {
            match field.value() {
                Value::String(name) => {
                    candidates.push(self.ctx.dictionary().resolve_class_name(name));
                }
                value if value.as_i64().is_some() => {
                    return Err(Error::UnsupportedFeature(
                        "numeric back/forward references in class headers",
                    ));
                }
                _ => {}
            }
        }
        Ok(candidates)
    }

    fn try_candidate(&self, name: &str, msg: &Message) -> Result<Option<DynObject>> {
        let Some(ty) = self.ctx.builders().type_for_name(name) else {
            debug!(class = name, "unresolvable class name; trying next candidate");
            return Ok(None);
        };
        let Some(builder) = self.ctx.builders().object_builder(ty) else {
            return Ok(None);
        };
        builder(self, msg).map(Some)
    }
}

/// Box a non-message, non-indicator value as its natural host type. Unknown
/// payloads stay wrapped as a [`Value`], type id and all.
fn raw_value(value: &Value) -> DynObject {
    match value.clone() {
        Value::Boolean(v) => Box::new(v),
        Value::Byte(v) => Box::new(v),
        Value::Short(v) => Box::new(v),
        Value::Int(v) => Box::new(v),
        Value::Long(v) => Box::new(v),
        Value::Float(v) => Box::new(v),
        Value::Double(v) => Box::new(v),
        Value::ByteArray(v) => Box::new(v),
        Value::ShortArray(v) => Box::new(v),
        Value::IntArray(v) => Box::new(v),
        Value::LongArray(v) => Box::new(v),
        Value::FloatArray(v) => Box::new(v),
        Value::DoubleArray(v) => Box::new(v),
        Value::String(v) => Box::new(v),
        Value::Date(v) => Box::new(v),
        Value::Time(v) => Box::new(v),
        Value::DateTime(v) => Box::new(v),
        other => Box::new(other),
    }
}
