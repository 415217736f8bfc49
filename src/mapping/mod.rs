//! Object mapping: arbitrary Rust values to and from messages.
//!
//! The mapping layer is a registry of builders. A [`MessageBuilder`] turns a
//! value of one type into a message; an [`ObjectBuilder`] turns a message
//! back into a value. The [`Serializer`] and [`Deserializer`] contexts drive
//! builders over whole object graphs: nested values become sub-messages,
//! cycles are detected and refused, and class-name hints at ordinal 0 pick
//! the right builder on the way back in.
//!
//! Rust has no classloader, so "class names" are the names supplied at
//! registration time; the deserializer resolves them through the type
//! dictionary's rename registry and this module's name registry.

mod builder;
mod containers;
mod deserializer;
mod serializer;
mod standard;

pub use self::builder::{Builder, BuilderRegistry, MessageBuilder, ObjectBuilder};
pub use self::containers::{DynMap, DynSequence, DynSet};
pub use self::deserializer::Deserializer;
pub use self::serializer::Serializer;
pub use self::standard::TypeName;

use std::any::Any;

/// A dynamically typed decode result.
pub type DynObject = Box<dyn Any + Send + Sync>;

/// Ordinal carrying class-name hints: a sequence of names, most specific
/// first.
pub const TYPE_HEADER_ORDINAL: i16 = 0;

/// Ordinal of set elements and map keys.
pub const KEY_ORDINAL: i16 = 1;

/// Ordinal of map values.
pub const VALUE_ORDINAL: i16 = 2;

/// Ordinal of the optional common-element (or key) type hint.
pub const KEY_TYPE_HINT_ORDINAL: i16 = 3;

/// Ordinal of the optional common-value type hint.
pub const VALUE_TYPE_HINT_ORDINAL: i16 = 4;
