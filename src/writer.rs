//! The event-based stream writer.

use std::io::Write;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::encode;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::taxonomy::{Taxonomy, TaxonomyResolver};
use crate::utf8;
use crate::wire::WireType;
use crate::{ENVELOPE_HEADER_LEN, MAX_DEPTH, MAX_NAME_LEN};

/// A push writer mirroring the reader's event vocabulary.
///
/// Because a sub-message's byte length appears on the wire before its
/// payload, every open sub-message encodes into its own scratch buffer; the
/// buffer is framed into its parent when the sub-message ends, and the
/// finished envelope body is framed behind the 8-byte header when the
/// envelope ends. Nothing reaches the sink before `end_envelope`.
///
/// When the writer has a taxonomy resolver and the current envelope names a
/// non-zero taxonomy, fields that carry a name but no ordinal are compressed:
/// if the taxonomy knows the name, the ordinal travels instead.
///
/// [`Writer::finish`] is the checked close. Dropping a writer flushes on a
/// best-effort basis and reports failure through the log, since drops cannot
/// return errors.
pub struct Writer<W: Write> {
    sink: Option<W>,
    resolver: Option<Arc<dyn TaxonomyResolver>>,
    taxonomy: Option<Arc<dyn Taxonomy>>,
    header: Option<(u8, u8, i16)>,
    /// One scratch buffer per open scope: the envelope body, then one per
    /// open sub-message.
    bufs: Vec<Vec<u8>>,
    /// Name and ordinal for each open sub-message, already compressed.
    pending: Vec<(Option<String>, Option<i16>)>,
}

impl<W: Write> Writer<W> {
    pub fn new(sink: W) -> Self {
        Writer {
            sink: Some(sink),
            resolver: None,
            taxonomy: None,
            header: None,
            bufs: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn with_resolver(sink: W, resolver: Arc<dyn TaxonomyResolver>) -> Self {
        let mut writer = Writer::new(sink);
        writer.resolver = Some(resolver);
        writer
    }

    /// Open an envelope. Fails if one is already open.
    pub fn start_envelope(
        &mut self,
        directives: u8,
        schema_version: u8,
        taxonomy_id: i16,
    ) -> Result<()> {
        if self.header.is_some() {
            return Err(Error::malformed("envelope already open"));
        }
        self.taxonomy = match (taxonomy_id, &self.resolver) {
            (0, _) | (_, None) => None,
            (id, Some(resolver)) => {
                let taxonomy = resolver.resolve(id);
                if taxonomy.is_none() {
                    trace!(taxonomy_id = id, "taxonomy not resolvable; writing names");
                }
                taxonomy
            }
        };
        self.header = Some((directives, schema_version, taxonomy_id));
        self.bufs.push(Vec::new());
        Ok(())
    }

    /// Append one field to the current scope, recursing through any
    /// sub-message value.
    pub fn write_field(&mut self, field: &Field) -> Result<()> {
        let taxonomy = self.taxonomy.clone();
        let buf = self.current_buf()?;
        encode::write_field(buf, field, taxonomy.as_deref())
    }

    /// Append every field of an iterator in order.
    pub fn write_all_fields<'a, I>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Field>,
    {
        for field in fields {
            self.write_field(field)?;
        }
        Ok(())
    }

    /// Open a sub-message field. Its byte length is not known yet, so the
    /// body accumulates in a fresh scratch buffer until the matching
    /// [`Writer::end_sub_message`].
    pub fn start_sub_message(&mut self, name: Option<&str>, ordinal: Option<i16>) -> Result<()> {
        self.current_buf()?;
        if self.bufs.len() > MAX_DEPTH {
            return Err(Error::malformed("sub-message nesting too deep"));
        }
        if let Some(name) = name {
            if utf8::encoded_len(name) > MAX_NAME_LEN {
                return Err(Error::malformed("field name longer than 255 bytes"));
            }
        }
        let mut name = name.map(str::to_string);
        let mut ordinal = ordinal;
        if let (Some(n), None, Some(tax)) = (name.as_deref(), ordinal, self.taxonomy.as_deref()) {
            if let Some(ord) = tax.ordinal_for(n) {
                name = None;
                ordinal = Some(ord);
            }
        }
        self.pending.push((name, ordinal));
        self.bufs.push(Vec::new());
        Ok(())
    }

    /// Close the innermost sub-message and frame it into its parent.
    pub fn end_sub_message(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Err(Error::malformed("no sub-message is open"));
        }
        let (name, ordinal) = self.pending.pop().expect("pending just checked");
        let payload = self.bufs.pop().expect("buffer per pending scope");
        let parent = self.current_buf()?;
        encode::write_raw_field(
            parent,
            WireType::Message,
            name.as_deref(),
            ordinal,
            &payload,
        )
    }

    /// Close the envelope: the header is computed and the whole frame goes
    /// to the sink.
    pub fn end_envelope(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            return Err(Error::malformed("sub-message still open at envelope end"));
        }
        let (directives, schema_version, taxonomy_id) = self
            .header
            .take()
            .ok_or_else(|| Error::malformed("no envelope is open"))?;
        let body = self.bufs.pop().expect("envelope body buffer present");
        self.taxonomy = None;

        let total = u32::try_from(ENVELOPE_HEADER_LEN + body.len())
            .map_err(|_| Error::malformed("envelope larger than 4GiB"))?;
        let mut frame = Vec::with_capacity(total as usize);
        encode::write_envelope_header(
            &mut frame,
            directives,
            schema_version,
            taxonomy_id,
            total,
        );
        frame.extend_from_slice(&body);

        let sink = self.sink.as_mut().expect("sink present until finish");
        sink.write_all(&frame)?;
        trace!(total_size = total, "envelope written");
        Ok(())
    }

    /// Write a whole envelope in one call.
    pub fn write_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        self.start_envelope(
            envelope.directives(),
            envelope.schema_version(),
            envelope.taxonomy_id(),
        )?;
        self.write_all_fields(envelope.message())?;
        self.end_envelope()
    }

    /// Flush the sink.
    pub fn flush(&mut self) -> Result<()> {
        let sink = self.sink.as_mut().expect("sink present until finish");
        sink.flush()?;
        Ok(())
    }

    /// Close the writer, flushing the sink and handing it back. Fails if an
    /// envelope is still open.
    pub fn finish(mut self) -> Result<W> {
        if self.header.is_some() {
            return Err(Error::malformed("envelope still open at writer close"));
        }
        let mut sink = self.sink.take().expect("sink present until finish");
        sink.flush()?;
        Ok(sink)
    }

    fn current_buf(&mut self) -> Result<&mut Vec<u8>> {
        if self.header.is_none() {
            return Err(Error::malformed("no envelope is open"));
        }
        Ok(self.bufs.last_mut().expect("buffer present while open"))
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.header.is_some() {
            warn!("writer dropped with an open envelope; buffered fields discarded");
        }
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                warn!(error = %e, "final flush failed on writer drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::reader::Reader;
    use crate::taxonomy::{MapResolver, MapTaxonomy};
    use crate::value::Value;
    use assert_matches::assert_matches;

    fn resolver_with(id: i16, entries: &[(i16, &str)]) -> Arc<dyn TaxonomyResolver> {
        let tax = MapTaxonomy::new(entries.iter().map(|&(o, n)| (o, n))).unwrap();
        let mut resolver = MapResolver::new();
        resolver.register(id, Arc::new(tax)).unwrap();
        Arc::new(resolver)
    }

    #[test]
    fn event_sequence_matches_whole_message_write() {
        let mut inner = Message::new();
        inner.add_by_name("n", 7i32).unwrap();
        let mut msg = Message::new();
        msg.add_by_name("greeting", "hi").unwrap();
        msg.add_by_name("nested", inner.clone()).unwrap();

        // Whole-message path.
        let mut whole = Writer::new(Vec::new());
        whole.write_envelope(&Envelope::new(msg.clone())).unwrap();
        let whole = whole.finish().unwrap();

        // Event-driven path.
        let mut events = Writer::new(Vec::new());
        events.start_envelope(0, 0, 0).unwrap();
        events
            .write_field(msg.get_by_name("greeting").unwrap())
            .unwrap();
        events.start_sub_message(Some("nested"), None).unwrap();
        events.write_all_fields(&inner).unwrap();
        events.end_sub_message().unwrap();
        events.end_envelope().unwrap();
        let events = events.finish().unwrap();

        assert_eq!(whole, events);
    }

    #[test]
    fn taxonomy_compression_is_lossless() {
        let resolver = resolver_with(1, &[(1, "price")]);
        let mut msg = Message::new();
        msg.add_by_name("price", 9.5f64).unwrap();
        msg.add_by_name("venue", "XLON").unwrap();

        let mut writer = Writer::with_resolver(Vec::new(), resolver.clone());
        writer
            .write_envelope(&Envelope::new(msg).with_taxonomy_id(1))
            .unwrap();
        let wire = writer.finish().unwrap();

        // On the wire: "price" travels as bare ordinal 1.
        let mut reader = Reader::new(wire.as_slice());
        let envelope = reader.read_envelope().unwrap().unwrap();
        let price = envelope.message().get_by_ordinal(1).unwrap();
        assert_eq!(price.name(), None);
        assert_eq!(price.value(), &Value::Double(9.5));
        // "venue" is not in the taxonomy and keeps its name.
        assert!(envelope.message().get_by_name("venue").is_some());

        // Back-applying the taxonomy recovers the name.
        let mut msg = envelope.into_message();
        let tax = resolver.resolve(1).unwrap();
        msg.apply_taxonomy(tax.as_ref());
        assert_eq!(msg.get_f64("price"), Some(9.5));
    }

    #[test]
    fn unresolvable_taxonomy_writes_names() {
        let resolver = resolver_with(1, &[(1, "price")]);
        let mut msg = Message::new();
        msg.add_by_name("price", 9.5f64).unwrap();
        let mut writer = Writer::with_resolver(Vec::new(), resolver);
        writer
            .write_envelope(&Envelope::new(msg.clone()).with_taxonomy_id(9))
            .unwrap();
        let wire = writer.finish().unwrap();
        let envelope = Reader::new(wire.as_slice()).read_envelope().unwrap().unwrap();
        assert_eq!(envelope.message(), &msg);
    }

    #[test]
    fn fields_outside_an_envelope_rejected() {
        let mut writer = Writer::new(Vec::new());
        let field = Field::of(None, None, Value::Int(1)).unwrap();
        assert_matches!(writer.write_field(&field), Err(Error::MalformedStream(_)));
        assert_matches!(writer.end_sub_message(), Err(Error::MalformedStream(_)));
        assert_matches!(writer.end_envelope(), Err(Error::MalformedStream(_)));
    }

    #[test]
    fn unbalanced_sub_message_rejected() {
        let mut writer = Writer::new(Vec::new());
        writer.start_envelope(0, 0, 0).unwrap();
        writer.start_sub_message(None, Some(1)).unwrap();
        assert_matches!(writer.end_envelope(), Err(Error::MalformedStream(_)));
        writer.end_sub_message().unwrap();
        writer.end_envelope().unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn finish_with_open_envelope_rejected() {
        let mut writer = Writer::new(Vec::new());
        writer.start_envelope(0, 0, 0).unwrap();
        assert_matches!(writer.finish(), Err(Error::MalformedStream(_)));
    }

    #[test]
    fn nothing_reaches_sink_before_envelope_end() {
        let mut writer = Writer::new(Vec::new());
        writer.start_envelope(0, 0, 0).unwrap();
        let field = Field::of(Some("x".into()), None, Value::Int(1)).unwrap();
        writer.write_field(&field).unwrap();
        assert!(writer.sink.as_ref().unwrap().is_empty());
        writer.end_envelope().unwrap();
        assert!(!writer.sink.as_ref().unwrap().is_empty());
    }
}
