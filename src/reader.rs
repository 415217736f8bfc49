//! The event-based stream reader.

use std::io::Read;

use tracing::trace;

use crate::decode;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::message::Message;
use crate::value::Value;
use crate::wire::WireType;
use crate::{ENVELOPE_HEADER_LEN, MAX_DEPTH};

/// One event of the stream grammar.
///
/// A well-formed stream is a sequence of envelopes, each
/// `EnvelopeStart (SimpleField | SubMessageStart .. SubMessageEnd)* EnvelopeEnd`,
/// with sub-messages nesting. There is no end marker on the wire; the reader
/// synthesizes `SubMessageEnd` and `EnvelopeEnd` from the declared byte
/// lengths.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    EnvelopeStart {
        processing_directives: u8,
        schema_version: u8,
        taxonomy_id: i16,
        total_size: u32,
    },
    SimpleField(Field),
    SubMessageStart {
        name: Option<String>,
        ordinal: Option<i16>,
    },
    SubMessageEnd,
    EnvelopeEnd,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    declared: usize,
    consumed: usize,
}

/// A pull reader producing [`StreamEvent`]s from a byte source.
///
/// The reader holds no lookahead beyond the event it returns, and blocks
/// only on source reads. A source that is at EOF between envelopes yields
/// `None`; EOF anywhere else is a [truncation](Error::TruncatedStream).
pub struct Reader<R: Read> {
    src: R,
    frames: Vec<Frame>,
}

impl<R: Read> Reader<R> {
    pub fn new(src: R) -> Self {
        Reader {
            src,
            frames: Vec::new(),
        }
    }

    /// Give back the underlying byte source.
    pub fn into_inner(self) -> R {
        self.src
    }

    /// Current sub-message depth: 0 between envelopes, 1 inside an envelope.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Produce the next event, or `None` at a clean end of input.
    pub fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        let Some(&frame) = self.frames.last() else {
            return self.begin_envelope();
        };

        // The innermost frame may already be exhausted; close it before
        // looking at more bytes. Enclosing frames were credited with this
        // frame's declared length when it was opened.
        if frame.consumed >= frame.declared {
            self.frames.pop();
            return Ok(Some(if self.frames.is_empty() {
                trace!("envelope end");
                StreamEvent::EnvelopeEnd
            } else {
                trace!(depth = self.frames.len(), "sub-message end");
                StreamEvent::SubMessageEnd
            }));
        }

        let header = decode::read_field_header(&mut self.src)?;
        let frame = self.frames.last_mut().expect("frame present");
        frame.consumed += header.consumed;

        if header.wire_type == WireType::Message {
            // Credit the whole nested body up front, so a sub-message that
            // spills past its parent is caught before its fields are read.
            frame.consumed += header.length;
            if self.frames.len() > MAX_DEPTH {
                return Err(Error::malformed("sub-message nesting too deep"));
            }
            self.check_overrun()?;
            self.frames.push(Frame {
                declared: header.length,
                consumed: 0,
            });
            return Ok(Some(StreamEvent::SubMessageStart {
                name: header.name,
                ordinal: header.ordinal,
            }));
        }

        let value = decode::read_value(&mut self.src, header.wire_type, header.length)?;
        let frame = self.frames.last_mut().expect("frame present");
        frame.consumed += header.length;
        self.check_overrun()?;
        let field = Field::new(header.name, header.ordinal, header.wire_type, value)?;
        Ok(Some(StreamEvent::SimpleField(field)))
    }

    fn begin_envelope(&mut self) -> Result<Option<StreamEvent>> {
        let Some(header) = decode::read_envelope_header(&mut self.src)? else {
            return Ok(None);
        };
        trace!(
            taxonomy_id = header.taxonomy_id,
            total_size = header.total_size,
            "envelope start"
        );
        self.frames.push(Frame {
            declared: header.total_size as usize - ENVELOPE_HEADER_LEN,
            consumed: 0,
        });
        Ok(Some(StreamEvent::EnvelopeStart {
            processing_directives: header.directives,
            schema_version: header.schema_version,
            taxonomy_id: header.taxonomy_id,
            total_size: header.total_size,
        }))
    }

    fn check_overrun(&self) -> Result<()> {
        // A field may not spill past any enclosing frame; parents already
        // account for nested declared lengths, so checking the innermost
        // open frame suffices.
        match self.frames.last() {
            Some(frame) if frame.consumed > frame.declared => Err(Error::malformed(
                "field stream overran its declared length",
            )),
            _ => Ok(()),
        }
    }

    /// Consume the rest of the current sub-message and hand its remaining
    /// bytes back verbatim, for later reparsing with
    /// [`decode::read_fields`]. Only valid inside a sub-message, i.e. after
    /// a [`StreamEvent::SubMessageStart`] and before the matching end.
    pub fn skip_sub_message(&mut self) -> Result<Vec<u8>> {
        if self.frames.len() < 2 {
            return Err(Error::malformed("no sub-message is open"));
        }
        let frame = self.frames.pop().expect("frame length checked");
        let remaining = frame.declared - frame.consumed;
        let mut blob = vec![0u8; remaining];
        self.src.read_exact(&mut blob)?;
        trace!(skipped = remaining, "skipped sub-message tail");
        Ok(blob)
    }

    /// Read one whole envelope, or `None` at a clean end of input. Names are
    /// not taxonomy-resolved here; see
    /// [`Context::decode`](crate::Context::decode) for that.
    pub fn read_envelope(&mut self) -> Result<Option<Envelope>> {
        let Some(event) = self.next_event()? else {
            return Ok(None);
        };
        let StreamEvent::EnvelopeStart {
            processing_directives,
            schema_version,
            taxonomy_id,
            ..
        } = event
        else {
            return Err(Error::malformed("expected an envelope start"));
        };

        // One message under construction per open sub-message.
        let mut stack: Vec<(Option<String>, Option<i16>, Message)> = Vec::new();
        let mut current = Message::new();
        loop {
            match self.next_event()? {
                Some(StreamEvent::SimpleField(field)) => {
                    current.add_field(field);
                }
                Some(StreamEvent::SubMessageStart { name, ordinal }) => {
                    stack.push((name, ordinal, std::mem::take(&mut current)));
                }
                Some(StreamEvent::SubMessageEnd) => {
                    let (name, ordinal, parent) =
                        stack.pop().ok_or_else(|| Error::malformed("unbalanced sub-message"))?;
                    let sub = std::mem::replace(&mut current, parent);
                    current.add_field(Field::new(
                        name,
                        ordinal,
                        WireType::Message,
                        Value::Message(sub),
                    )?);
                }
                Some(StreamEvent::EnvelopeEnd) => break,
                Some(StreamEvent::EnvelopeStart { .. }) => {
                    return Err(Error::malformed("envelope start inside an envelope"))
                }
                None => return Err(Error::truncated("envelope body")),
            }
        }
        Ok(Some(
            Envelope::new(current)
                .with_directives(processing_directives)
                .with_schema_version(schema_version)
                .with_taxonomy_id(taxonomy_id),
        ))
    }
}
