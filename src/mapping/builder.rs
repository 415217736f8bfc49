//! Builder traits and the builder registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::{Error, Result};
use crate::message::Message;

use super::deserializer::Deserializer;
use super::serializer::Serializer;
use super::DynObject;

/// Builds a value of `T` from a message.
pub trait ObjectBuilder<T>: Send + Sync {
    fn build_object(&self, de: &Deserializer, msg: &Message) -> Result<T>;
}

/// Builds a message from a value of `T`.
pub trait MessageBuilder<T>: Send + Sync {
    fn build_message(&self, ser: &mut Serializer, value: &T) -> Result<Message>;
}

/// Both directions in one implementation. Blanket-derived for any type that
/// implements the two halves.
pub trait Builder<T>: ObjectBuilder<T> + MessageBuilder<T> {}

impl<T, B: ObjectBuilder<T> + MessageBuilder<T>> Builder<T> for B {}

pub(crate) type ErasedObjectBuilder =
    Arc<dyn Fn(&Deserializer, &Message) -> Result<DynObject> + Send + Sync>;
pub(crate) type ErasedMessageBuilder =
    Arc<dyn Fn(&mut Serializer, &dyn Any) -> Result<Message> + Send + Sync>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(o) => o,
        Err(e) => e.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(o) => o,
        Err(e) => e.into_inner(),
    }
}

/// The registry of builders, keyed by host type.
///
/// Holds the two builder maps (with a `None` sentinel memoizing types known
/// to have no builder), the name registry used to resolve class-name hints,
/// and the per-type name lists written as class headers. All maps take
/// concurrent registration after construction; a builder registration is
/// one-shot per type and conflicts fail with
/// [`Error::AlreadyRegistered`].
pub struct BuilderRegistry {
    object: RwLock<HashMap<TypeId, Option<ErasedObjectBuilder>>>,
    message: RwLock<HashMap<TypeId, Option<ErasedMessageBuilder>>>,
    names: RwLock<HashMap<String, TypeId>>,
    headers: RwLock<HashMap<TypeId, Arc<[String]>>>,
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuilderRegistry {
    pub fn new() -> Self {
        BuilderRegistry {
            object: RwLock::new(HashMap::new()),
            message: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
            headers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a combined builder for `T` under the given class names, most
    /// specific first. The names become `T`'s class header and resolve back
    /// to `T` when read from a message.
    pub fn register<T, B>(&self, names: &[&str], builder: B) -> Result<()>
    where
        T: Any + Send + Sync,
        B: Builder<T> + 'static,
    {
        let builder = Arc::new(builder);
        self.register_names::<T>(names)?;
        self.put_object_builder::<T>(erase_object(builder.clone()))?;
        self.put_message_builder::<T>(erase_message(builder))
    }

    /// Register only the message half for `T`.
    pub fn register_message_builder<T, B>(&self, builder: B) -> Result<()>
    where
        T: Any + Send + Sync,
        B: MessageBuilder<T> + 'static,
    {
        self.put_message_builder::<T>(erase_message(Arc::new(builder)))
    }

    /// Register only the object half for `T`, under the given class names.
    pub fn register_object_builder<T, B>(&self, names: &[&str], builder: B) -> Result<()>
    where
        T: Any + Send + Sync,
        B: ObjectBuilder<T> + 'static,
    {
        self.register_names::<T>(names)?;
        self.put_object_builder::<T>(erase_object(Arc::new(builder)))
    }

    /// Bind class names to `T` without touching its builders. Names resolve
    /// through [`BuilderRegistry::type_for_name`] and are written as `T`'s
    /// class header, most specific first.
    pub fn register_names<T: Any>(&self, names: &[&str]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let ty = TypeId::of::<T>();
        {
            let mut map = write(&self.names);
            for &name in names {
                match map.get(name) {
                    Some(existing) if *existing == ty => {}
                    Some(_) => {
                        return Err(Error::AlreadyRegistered(format!(
                            "class name {:?} already bound to another type",
                            name
                        )))
                    }
                    None => {
                        map.insert(name.to_string(), ty);
                    }
                }
            }
        }
        let header: Arc<[String]> = names.iter().map(|s| s.to_string()).collect();
        write(&self.headers).entry(ty).or_insert(header);
        debug!(ty = std::any::type_name::<T>(), ?names, "registered class names");
        Ok(())
    }

    /// The type a class name resolves to, if registered.
    pub fn type_for_name(&self, name: &str) -> Option<TypeId> {
        read(&self.names).get(name).copied()
    }

    /// The class header written for `ty`: its registered names, most
    /// specific first.
    pub fn header_names(&self, ty: TypeId) -> Option<Arc<[String]>> {
        read(&self.headers).get(&ty).cloned()
    }

    pub(crate) fn object_builder(&self, ty: TypeId) -> Option<ErasedObjectBuilder> {
        let found = read(&self.object).get(&ty).cloned();
        match found {
            Some(Some(builder)) => Some(builder),
            Some(None) => None,
            None => {
                // Memoize the absence; in this implementation builders only
                // appear through registration, so the sentinel is permanent
                // until one is registered.
                write(&self.object).entry(ty).or_insert(None);
                None
            }
        }
    }

    pub(crate) fn message_builder(&self, ty: TypeId) -> Option<ErasedMessageBuilder> {
        let found = read(&self.message).get(&ty).cloned();
        match found {
            Some(Some(builder)) => Some(builder),
            Some(None) => None,
            None => {
                write(&self.message).entry(ty).or_insert(None);
                None
            }
        }
    }

    fn put_object_builder<T: Any>(&self, builder: ErasedObjectBuilder) -> Result<()> {
        let ty = TypeId::of::<T>();
        let mut map = write(&self.object);
        match map.get(&ty) {
            Some(Some(_)) => Err(Error::AlreadyRegistered(format!(
                "object builder for {}",
                std::any::type_name::<T>()
            ))),
            _ => {
                map.insert(ty, Some(builder));
                Ok(())
            }
        }
    }

    fn put_message_builder<T: Any>(&self, builder: ErasedMessageBuilder) -> Result<()> {
        let ty = TypeId::of::<T>();
        let mut map = write(&self.message);
        match map.get(&ty) {
            Some(Some(_)) => Err(Error::AlreadyRegistered(format!(
                "message builder for {}",
                std::any::type_name::<T>()
            ))),
            _ => {
                map.insert(ty, Some(builder));
                Ok(())
            }
        }
    }
}

fn erase_object<T, B>(builder: Arc<B>) -> ErasedObjectBuilder
where
    T: Any + Send + Sync,
    B: ObjectBuilder<T> + 'static,
{
    Arc::new(move |de, msg| {
        let value = builder.build_object(de, msg)?;
        Ok(Box::new(value) as DynObject)
    })
}

fn erase_message<T, B>(builder: Arc<B>) -> ErasedMessageBuilder
where
    T: Any + Send + Sync,
    B: MessageBuilder<T> + 'static,
{
    Arc::new(move |ser, value| {
        let value = value.downcast_ref::<T>().ok_or_else(|| Error::NoBuilder {
            target: std::any::type_name::<T>().to_string(),
        })?;
        builder.build_message(ser, value)
    })
}
