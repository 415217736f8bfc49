//! An implementation of the Fudge binary messaging format.
//!
//! Fudge messages are ordered sequences of fields. Each field carries a typed
//! value and may be tagged with a name, a 16-bit ordinal, both, or neither.
//! Values can themselves be messages, nesting arbitrarily deep. Because every
//! field is self-describing, a message can always be decoded without outside
//! knowledge, and a [taxonomy](crate::Taxonomy) can compress field names down
//! to ordinals on the wire without losing them.
//!
//! The crate is layered bottom-up:
//!
//! - [`encode`] and [`decode`] hold the wire primitives: the field-prefix
//!   byte, the variable-width length codec, modified UTF-8, and the payload
//!   readers and writers for every wire type.
//! - [`TypeDictionary`] maps Rust types to wire types, layers secondary types
//!   over the primaries, and converts field values between host types.
//! - [`Message`] and [`Field`] are the data model, with insertion-ordered
//!   lookup by name or ordinal.
//! - [`Reader`] and [`Writer`] stream envelopes as event sequences without
//!   materializing more than one event at a time.
//! - The [`mapping`] module turns arbitrary Rust values into messages and
//!   back through a registry of builders.
//!
//! A [`Context`] ties the shared pieces together:
//!
//! ```
//! use fudge_msg::{Context, Envelope, Message};
//!
//! let ctx = Context::new();
//! let mut msg = Message::new();
//! msg.add_by_name("greeting", "hello").unwrap();
//! msg.add_by_ordinal(1, 42i32).unwrap();
//!
//! let encoded = ctx.encode(&Envelope::new(msg)).unwrap();
//! let decoded = ctx.decode(&encoded).unwrap();
//! assert_eq!(decoded.message().get_i32_by_ordinal(1), Some(42));
//! ```

mod context;
mod datetime;
mod dictionary;
mod envelope;
mod error;
mod field;
mod message;
mod prefix;
mod secondary;
mod taxonomy;
mod utf8;
mod value;
mod wire;

pub mod decode;
pub mod encode;
pub mod mapping;
pub mod reader;
pub mod writer;

pub use self::context::Context;
pub use self::datetime::{Accuracy, Date, DateTime, Time};
pub use self::dictionary::TypeDictionary;
pub use self::envelope::{Envelope, DIRECTIVE_FUDGE_FRAMED};
pub use self::error::{Error, Result};
pub use self::field::Field;
pub use self::message::{ImmutableMessage, Message};
pub use self::prefix::FieldPrefix;
pub use self::reader::{Reader, StreamEvent};
pub use self::secondary::SecondaryType;
pub use self::taxonomy::{MapResolver, MapTaxonomy, Taxonomy, TaxonomyResolver};
pub use self::value::Value;
pub use self::wire::WireType;
pub use self::writer::Writer;

/// Maximum sub-message nesting depth accepted by the stream codec.
pub const MAX_DEPTH: usize = 128;

/// Maximum encoded length of a field name, in modified UTF-8 bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Byte length of the envelope header.
pub const ENVELOPE_HEADER_LEN: usize = 8;
