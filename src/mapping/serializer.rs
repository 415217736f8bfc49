//! The serialization context.

use std::any::{Any, TypeId};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::message::Message;

use super::TYPE_HEADER_ORDINAL;

/// Drives message builders over an object graph.
///
/// One serializer encodes one top-level object at a time. It keeps a handle
/// stack of the objects currently being encoded, identified by the (address,
/// type) pair, and refuses graphs that revisit an object already on the
/// stack. A cycle poisons the serializer; [`Serializer::reset`] readies it
/// for the next top-level encode.
pub struct Serializer<'c> {
    ctx: &'c Context,
    stack: Vec<(*const (), TypeId)>,
    poisoned: bool,
}

impl<'c> Serializer<'c> {
    pub(crate) fn new(ctx: &'c Context) -> Self {
        Serializer {
            ctx,
            stack: Vec::new(),
            poisoned: false,
        }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    /// Encode one object as a message through its registered message
    /// builder. Fails with [`Error::NoBuilder`] if none is registered.
    pub fn object_to_message<T: Any + Send + Sync>(&mut self, value: &T) -> Result<Message> {
        self.object_to_message_any(value, TypeId::of::<T>(), std::any::type_name::<T>())
    }

    fn object_to_message_any(
        &mut self,
        value: &dyn Any,
        ty: TypeId,
        ty_name: &str,
    ) -> Result<Message> {
        if self.poisoned {
            return Err(Error::CyclicReference);
        }
        let ptr = value as *const dyn Any as *const ();
        if self.stack.iter().any(|&(p, t)| p == ptr && t == ty) {
            self.poisoned = true;
            return Err(Error::CyclicReference);
        }
        let builder = self
            .ctx
            .builders()
            .message_builder(ty)
            .ok_or_else(|| Error::NoBuilder {
                target: ty_name.to_string(),
            })?;
        self.stack.push((ptr, ty));
        let result = builder(self, value);
        self.stack.pop();
        result
    }

    /// Add a value to a message: natively when its type has a wire type,
    /// as a sub-message built by [`Serializer::object_to_message`]
    /// otherwise.
    pub fn add_to_message<T: Any + Send + Sync>(
        &mut self,
        msg: &mut Message,
        name: Option<&str>,
        ordinal: Option<i32>,
        value: &T,
    ) -> Result<()> {
        self.add_any(msg, name, ordinal, value, TypeId::of::<T>(), std::any::type_name::<T>(), false, None)
    }

    /// Like [`Serializer::add_to_message`], but a sub-message that carries
    /// no ordinal-0 field gets the value's class header prepended: its
    /// registered names, most specific first, truncated before `stop_name`
    /// when given.
    pub fn add_to_message_with_class_headers<T: Any + Send + Sync>(
        &mut self,
        msg: &mut Message,
        name: Option<&str>,
        ordinal: Option<i32>,
        value: &T,
        stop_name: Option<&str>,
    ) -> Result<()> {
        self.add_any(msg, name, ordinal, value, TypeId::of::<T>(), std::any::type_name::<T>(), true, stop_name)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_any(
        &mut self,
        msg: &mut Message,
        name: Option<&str>,
        ordinal: Option<i32>,
        value: &dyn Any,
        ty: TypeId,
        ty_name: &str,
        class_headers: bool,
        stop_name: Option<&str>,
    ) -> Result<()> {
        if let Some(wire_value) = self.ctx.dictionary().value_of_any(ty, value)? {
            msg.add_full(name, ordinal, wire_value)?;
            return Ok(());
        }
        let mut sub = self.object_to_message_any(value, ty, ty_name)?;
        if class_headers && sub.get_by_ordinal(TYPE_HEADER_ORDINAL).is_none() {
            sub = self.prepend_class_header(sub, ty, stop_name)?;
        }
        msg.add_full(name, ordinal, sub)?;
        Ok(())
    }

    fn prepend_class_header(
        &self,
        sub: Message,
        ty: TypeId,
        stop_name: Option<&str>,
    ) -> Result<Message> {
        let Some(names) = self.ctx.builders().header_names(ty) else {
            return Ok(sub);
        };
        let mut headed = Message::new();
        for name in names.iter() {
            if stop_name == Some(name.as_str()) {
                break;
            }
            headed.add_by_ordinal(TYPE_HEADER_ORDINAL as i32, name.as_str())?;
        }
        for field in sub.fields() {
            headed.add_field(field.clone());
        }
        Ok(headed)
    }

    /// As [`Serializer::add_to_message`], for values whose type is only
    /// known at runtime.
    pub(crate) fn add_dyn(
        &mut self,
        msg: &mut Message,
        name: Option<&str>,
        ordinal: Option<i32>,
        value: &dyn Any,
    ) -> Result<()> {
        self.add_any(
            msg,
            name,
            ordinal,
            value,
            value.type_id(),
            "dynamically typed value",
            false,
            None,
        )
    }

    /// Clear the cycle-detection buffer. Required between top-level encodes,
    /// and after a [`Error::CyclicReference`] failure.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.poisoned = false;
    }
}
