//! The top-level envelope frame.

use crate::message::Message;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Low bit of the processing-directives byte: the payload is Fudge-framed.
pub const DIRECTIVE_FUDGE_FRAMED: u8 = 0x01;

/// A message wrapped for the wire: processing directives, schema version,
/// and the taxonomy id its field names were compressed with.
///
/// The total-size word of the header is derived at encode time and checked
/// at decode time; it is not part of this type.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Envelope {
    directives: u8,
    schema_version: u8,
    taxonomy_id: i16,
    message: Message,
}

impl Envelope {
    /// Wrap a message with default framing: no directives, schema version 0,
    /// no taxonomy.
    pub fn new(message: Message) -> Self {
        Envelope {
            directives: 0,
            schema_version: 0,
            taxonomy_id: 0,
            message,
        }
    }

    pub fn with_taxonomy_id(mut self, taxonomy_id: i16) -> Self {
        self.taxonomy_id = taxonomy_id;
        self
    }

    pub fn with_schema_version(mut self, schema_version: u8) -> Self {
        self.schema_version = schema_version;
        self
    }

    pub fn with_directives(mut self, directives: u8) -> Self {
        self.directives = directives;
        self
    }

    pub fn directives(&self) -> u8 {
        self.directives
    }

    pub fn schema_version(&self) -> u8 {
        self.schema_version
    }

    pub fn taxonomy_id(&self) -> i16 {
        self.taxonomy_id
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        Envelope::new(message)
    }
}
