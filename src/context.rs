//! The shared context: dictionary, resolver, and builder registry.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::dictionary::TypeDictionary;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::mapping::{BuilderRegistry, Deserializer, Serializer};
use crate::reader::Reader;
use crate::taxonomy::{NoResolver, TaxonomyResolver};
use crate::writer::Writer;

/// Everything a stream or mapping operation shares: the type dictionary,
/// the taxonomy resolver, and the builder registry.
///
/// A context is built once and shared (it is `Clone`; clones share the same
/// registries). Registrations may happen concurrently with use: the
/// registries lock internally, and a successful registration is visible to
/// every later lookup.
#[derive(Clone)]
pub struct Context {
    dictionary: Arc<TypeDictionary>,
    builders: Arc<BuilderRegistry>,
    resolver: Arc<dyn TaxonomyResolver>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with the standard wire types and default builders
    /// registered, and no taxonomies.
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(NoResolver))
    }

    /// As [`Context::new`], with the given taxonomy resolver.
    pub fn with_resolver(resolver: Arc<dyn TaxonomyResolver>) -> Self {
        let builders = BuilderRegistry::new();
        builders
            .register_standard()
            .expect("fresh registry accepts the standard builders");
        Context {
            dictionary: Arc::new(TypeDictionary::new()),
            builders: Arc::new(builders),
            resolver,
        }
    }

    pub fn dictionary(&self) -> &TypeDictionary {
        &self.dictionary
    }

    pub fn builders(&self) -> &BuilderRegistry {
        &self.builders
    }

    pub fn resolver(&self) -> &Arc<dyn TaxonomyResolver> {
        &self.resolver
    }

    /// A serializer bound to this context.
    pub fn serializer(&self) -> Serializer<'_> {
        Serializer::new(self)
    }

    /// A deserializer bound to this context.
    pub fn deserializer(&self) -> Deserializer<'_> {
        Deserializer::new(self)
    }

    /// A stream writer over `sink`, compressing names through this
    /// context's resolver.
    pub fn writer<W: Write>(&self, sink: W) -> Writer<W> {
        Writer::with_resolver(sink, self.resolver.clone())
    }

    /// A stream reader over `src`.
    pub fn reader<R: Read>(&self, src: R) -> Reader<R> {
        Reader::new(src)
    }

    /// Encode one envelope to bytes.
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        let mut writer = self.writer(Vec::new());
        writer.write_envelope(envelope)?;
        writer.finish()
    }

    /// Decode one envelope from bytes. When the envelope names a taxonomy
    /// this resolver knows, its names are applied back onto the fields.
    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope> {
        let mut reader = self.reader(bytes);
        let mut envelope = reader
            .read_envelope()?
            .ok_or_else(|| crate::Error::truncated("envelope header"))?;
        if let Some(taxonomy) = self.resolver.resolve(envelope.taxonomy_id()) {
            envelope.message_mut().apply_taxonomy(taxonomy.as_ref());
        }
        Ok(envelope)
    }

    /// Decode every envelope in the byte stream.
    pub fn decode_all(&self, bytes: &[u8]) -> Result<Vec<Envelope>> {
        let mut reader = self.reader(bytes);
        let mut envelopes = Vec::new();
        while let Some(mut envelope) = reader.read_envelope()? {
            if let Some(taxonomy) = self.resolver.resolve(envelope.taxonomy_id()) {
                envelope.message_mut().apply_taxonomy(taxonomy.as_ref());
            }
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mapping::{DynMap, DynSequence, DynSet, DynObject};
    use crate::message::Message;
    use crate::secondary::SecondaryType;
    use crate::taxonomy::{MapResolver, MapTaxonomy};
    use crate::value::Value;
    use crate::wire::WireType;
    use assert_matches::assert_matches;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[test]
    fn envelope_round_trip() {
        let ctx = Context::new();
        let mut inner = Message::new();
        inner.add_by_name("n", 7i32).unwrap();
        let mut msg = Message::new();
        msg.add_by_name("greeting", "hi").unwrap();
        msg.add_by_name("nested", inner).unwrap();

        let bytes = ctx.encode(&Envelope::new(msg.clone())).unwrap();
        let back = ctx.decode(&bytes).unwrap();
        assert_eq!(back.message(), &msg);
        // Declared size matches the byte count.
        assert_eq!(
            u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize,
            bytes.len()
        );
    }

    #[test]
    fn taxonomy_round_trip_recovers_names() {
        let mut resolver = MapResolver::new();
        resolver
            .register(1, Arc::new(MapTaxonomy::new([(1, "price")]).unwrap()))
            .unwrap();
        let ctx = Context::with_resolver(Arc::new(resolver));

        let mut msg = Message::new();
        msg.add_by_name("price", 9.5f64).unwrap();
        let bytes = ctx
            .encode(&Envelope::new(msg.clone()).with_taxonomy_id(1))
            .unwrap();
        let back = ctx.decode(&bytes).unwrap();
        assert_eq!(back.message().get_f64("price"), Some(9.5));
        // The recovered field also kept the wire ordinal.
        assert_eq!(
            back.message().get_by_name("price").unwrap().ordinal(),
            Some(1)
        );
    }

    #[test]
    fn sequence_of_mixed_values_round_trips() {
        let ctx = Context::new();
        let seq = DynSequence(vec![
            Some(Box::new(1i8) as DynObject),
            None,
            Some(Box::new("x".to_string()) as DynObject),
            Some(Box::new(3.5f64) as DynObject),
        ]);

        let mut ser = ctx.serializer();
        let msg = ser.object_to_message(&seq).unwrap();
        let types: Vec<_> = msg.iter().map(|f| f.wire_type()).collect();
        assert_eq!(
            types,
            [
                WireType::Byte,
                WireType::Indicator,
                WireType::String,
                WireType::Double
            ]
        );
        assert!(msg.iter().all(|f| f.name().is_none() && f.ordinal().is_none()));

        let de = ctx.deserializer();
        let back = de.message_to_object(&msg).unwrap();
        let back = back.downcast::<DynSequence>().unwrap();
        assert_eq!(back.0.len(), 4);
        assert_eq!(back.0[0].as_ref().unwrap().downcast_ref::<i8>(), Some(&1));
        assert!(back.0[1].is_none());
        assert_eq!(
            back.0[2].as_ref().unwrap().downcast_ref::<String>().unwrap(),
            "x"
        );
        assert_eq!(back.0[3].as_ref().unwrap().downcast_ref::<f64>(), Some(&3.5));
    }

    #[test]
    fn container_detection_by_ordinals() {
        let ctx = Context::new();
        let de = ctx.deserializer();

        let mut set_like = Message::new();
        set_like.add_by_ordinal(1, 10i32).unwrap();
        set_like.add_by_ordinal(1, 20i32).unwrap();
        assert!(de
            .message_to_object(&set_like)
            .unwrap()
            .downcast::<DynSet>()
            .is_ok());

        let mut map_like = Message::new();
        map_like.add_by_ordinal(1, "k").unwrap();
        map_like.add_by_ordinal(2, 5i32).unwrap();
        assert!(de
            .message_to_object(&map_like)
            .unwrap()
            .downcast::<DynMap>()
            .is_ok());

        let mut seq_like = Message::new();
        seq_like.add(1i32);
        assert!(de
            .message_to_object(&seq_like)
            .unwrap()
            .downcast::<DynSequence>()
            .is_ok());

        // An ordinal outside the container vocabulary aborts detection.
        let mut other = Message::new();
        other.add_by_ordinal(1, 10i32).unwrap();
        other.add_by_ordinal(7, 20i32).unwrap();
        assert!(de
            .message_to_object(&other)
            .unwrap()
            .downcast::<Message>()
            .is_ok());
    }

    #[test]
    fn map_tolerates_interleaved_keys_and_values() {
        let ctx = Context::new();
        let mut msg = Message::new();
        // v1, k1, k2, v2: pairing is FIFO per ordinal.
        msg.add_by_ordinal(2, 100i32).unwrap();
        msg.add_by_ordinal(1, "a").unwrap();
        msg.add_by_ordinal(1, "b").unwrap();
        msg.add_by_ordinal(2, 120i32).unwrap();

        let de = ctx.deserializer();
        let map = de
            .message_to_object(&msg)
            .unwrap()
            .downcast::<DynMap>()
            .unwrap();
        let pairs: Vec<(String, i64)> = map
            .0
            .iter()
            .map(|(k, v)| {
                (
                    k.as_ref().unwrap().downcast_ref::<String>().unwrap().clone(),
                    *v.as_ref().unwrap().downcast_ref::<i8>().unwrap() as i64,
                )
            })
            .collect();
        assert_eq!(pairs, [("a".to_string(), 100), ("b".to_string(), 120)]);
    }

    #[test]
    fn typed_containers_round_trip() {
        let ctx = Context::new();
        ctx.builders().register_sequence_of::<i64>().unwrap();
        ctx.builders().register_set_of::<String>().unwrap();
        ctx.builders().register_map_of::<String, i64>().unwrap();

        let mut ser = ctx.serializer();
        let de = ctx.deserializer();

        let seq = vec![1i64, 2, 3];
        let msg = ser.object_to_message(&seq).unwrap();
        assert_eq!(de.message_to_object_as::<Vec<i64>>(&msg).unwrap(), seq);
        ser.reset();

        let set: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let msg = ser.object_to_message(&set).unwrap();
        assert_eq!(de.message_to_object_as::<HashSet<String>>(&msg).unwrap(), set);
        ser.reset();

        let mut map = HashMap::new();
        map.insert("one".to_string(), 1i64);
        map.insert("two".to_string(), 2i64);
        let msg = ser.object_to_message(&map).unwrap();
        assert_eq!(
            de.message_to_object_as::<HashMap<String, i64>>(&msg).unwrap(),
            map
        );
    }

    #[test]
    fn fixed_size_arrays_round_trip() {
        let ctx = Context::new();
        ctx.builders().register_array_of::<f64, 3>().unwrap();

        let arr = [1.0f64, 2.5, -3.25];
        let mut ser = ctx.serializer();
        let msg = ser.object_to_message(&arr).unwrap();
        let de = ctx.deserializer();
        assert_eq!(de.message_to_object_as::<[f64; 3]>(&msg).unwrap(), arr);

        // The wrong element count is refused rather than padded.
        let mut short = Message::new();
        short.add(1.0f64);
        assert_matches!(
            de.message_to_object_as::<[f64; 3]>(&short),
            Err(Error::ConversionUnavailable { .. })
        );
    }

    #[test]
    fn random_messages_round_trip() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        fn random_message(rng: &mut StdRng, depth: usize) -> Message {
            let mut msg = Message::new();
            for _ in 0..rng.gen_range(0..8) {
                let name = if rng.gen_bool(0.5) {
                    Some(format!("f{}", rng.gen_range(0..100)))
                } else {
                    None
                };
                let ordinal = if rng.gen_bool(0.3) {
                    Some(rng.gen::<i16>() as i32)
                } else {
                    None
                };
                match rng.gen_range(0..9) {
                    0 => msg.add_full(name.as_deref(), ordinal, rng.gen::<bool>()),
                    1 => msg.add_full(name.as_deref(), ordinal, rng.gen::<i64>()),
                    2 => msg.add_full(name.as_deref(), ordinal, rng.gen::<f64>()),
                    3 => msg.add_full(name.as_deref(), ordinal, rng.gen::<f32>()),
                    4 => {
                        let len = rng.gen_range(0..40);
                        let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                        msg.add_full(name.as_deref(), ordinal, bytes)
                    }
                    5 => {
                        let len = rng.gen_range(0..10);
                        let s: String = (0..len)
                            .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
                            .collect();
                        msg.add_full(name.as_deref(), ordinal, s)
                    }
                    6 => msg.add_full(name.as_deref(), ordinal, Value::Indicator),
                    7 if depth < 3 => {
                        msg.add_full(name.as_deref(), ordinal, random_message(rng, depth + 1))
                    }
                    _ => {
                        let len = rng.gen_range(0..6);
                        let longs: Vec<i64> = (0..len).map(|_| rng.gen()).collect();
                        msg.add_full(name.as_deref(), ordinal, longs)
                    }
                }
                .unwrap();
            }
            msg
        }

        let ctx = Context::new();
        let mut rng = StdRng::seed_from_u64(0x0f5d_9e21);
        for _ in 0..50 {
            let msg = random_message(&mut rng, 0);
            let bytes = ctx.encode(&Envelope::new(msg.clone())).unwrap();
            let back = ctx.decode(&bytes).unwrap();
            assert_eq!(back.message(), &msg);
            assert_eq!(
                u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize,
                bytes.len()
            );
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Currency {
        Usd,
        Eur,
    }

    struct CurrencyType;

    impl SecondaryType for CurrencyType {
        type Host = Currency;

        fn primary(&self) -> WireType {
            WireType::Int
        }

        fn to_primary(&self, value: &Currency) -> crate::Result<Value> {
            Ok(Value::Int(match value {
                Currency::Usd => 1,
                Currency::Eur => 2,
            }))
        }

        fn from_primary(&self, value: Value) -> crate::Result<Currency> {
            match value.as_i64() {
                Some(1) => Ok(Currency::Usd),
                Some(2) => Ok(Currency::Eur),
                _ => Err(Error::ConversionUnavailable {
                    wire_type: "int",
                    target: "Currency",
                }),
            }
        }
    }

    #[test]
    fn secondary_currency_travels_as_int() {
        let ctx = Context::new();
        ctx.dictionary().register_secondary(CurrencyType).unwrap();

        let mut msg = Message::new();
        let mut ser = ctx.serializer();
        ser.add_to_message(&mut msg, Some("ccy"), None, &Currency::Usd)
            .unwrap();

        let bytes = ctx.encode(&Envelope::new(msg)).unwrap();
        let back = ctx.decode(&bytes).unwrap();
        let field = back.message().get_by_name("ccy").unwrap();
        // On the wire it is integral (narrowed), not a distinct type.
        assert!(field.value().as_i64().is_some());
        assert_eq!(
            ctx.dictionary().convert::<Currency>(field).unwrap(),
            Some(Currency::Usd)
        );
    }

    struct Node {
        label: String,
        next: Mutex<Option<Arc<Node>>>,
    }

    struct NodeBuilder;

    impl crate::mapping::MessageBuilder<Node> for NodeBuilder {
        fn build_message(&self, ser: &mut Serializer, value: &Node) -> crate::Result<Message> {
            let mut msg = Message::new();
            msg.add_by_name("label", value.label.as_str())?;
            let next = value.next.lock().unwrap();
            if let Some(next) = next.as_ref() {
                ser.add_to_message(&mut msg, Some("next"), None, next.as_ref())?;
            }
            Ok(msg)
        }
    }

    #[test]
    fn cyclic_object_graph_rejected() {
        let ctx = Context::new();
        ctx.builders()
            .register_message_builder::<Node, _>(NodeBuilder)
            .unwrap();

        let a = Arc::new(Node {
            label: "a".into(),
            next: Mutex::new(None),
        });
        let b = Arc::new(Node {
            label: "b".into(),
            next: Mutex::new(Some(a.clone())),
        });
        *a.next.lock().unwrap() = Some(b.clone());

        let mut ser = ctx.serializer();
        assert_matches!(
            ser.object_to_message(a.as_ref()),
            Err(Error::CyclicReference)
        );
        // The serializer stays poisoned until reset.
        assert_matches!(
            ser.object_to_message(&"fine".to_string()),
            Err(Error::CyclicReference)
        );
        ser.reset();

        // An acyclic chain of the same shape encodes.
        *a.next.lock().unwrap() = None;
        let msg = ser.object_to_message(b.as_ref()).unwrap();
        assert_eq!(msg.get_str("label"), Some("b"));
        assert_eq!(msg.get_message("next").unwrap().get_str("label"), Some("a"));
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Quote {
        ticker: String,
        price: f64,
    }

    struct QuoteBuilder;

    impl crate::mapping::MessageBuilder<Quote> for QuoteBuilder {
        fn build_message(&self, _ser: &mut Serializer, value: &Quote) -> crate::Result<Message> {
            let mut msg = Message::new();
            msg.add_by_name("ticker", value.ticker.as_str())?;
            msg.add_by_name("price", value.price)?;
            Ok(msg)
        }
    }

    impl crate::mapping::ObjectBuilder<Quote> for QuoteBuilder {
        fn build_object(&self, _de: &Deserializer, msg: &Message) -> crate::Result<Quote> {
            Ok(Quote {
                ticker: msg
                    .get_str("ticker")
                    .ok_or(Error::ConversionUnavailable {
                        wire_type: "message",
                        target: "Quote",
                    })?
                    .to_string(),
                price: msg.get_f64("price").ok_or(Error::ConversionUnavailable {
                    wire_type: "message",
                    target: "Quote",
                })?,
            })
        }
    }

    #[test]
    fn class_headers_dispatch_untyped_decode() {
        let ctx = Context::new();
        ctx.builders()
            .register::<Quote, _>(&["md.Quote", "md.Instrument"], QuoteBuilder)
            .unwrap();

        let quote = Quote {
            ticker: "VOD".into(),
            price: 72.5,
        };
        let mut holder = Message::new();
        let mut ser = ctx.serializer();
        ser.add_to_message_with_class_headers(&mut holder, Some("quote"), None, &quote, None)
            .unwrap();

        let sub = holder.get_message("quote").unwrap();
        let headers: Vec<_> = sub
            .all_by_ordinal(0)
            .map(|f| f.value().as_str().unwrap().to_string())
            .collect();
        assert_eq!(headers, ["md.Quote", "md.Instrument"]);

        let de = ctx.deserializer();
        let back = de.message_to_object(sub).unwrap();
        assert_eq!(back.downcast::<Quote>().unwrap().as_ref(), &quote);

        // Typed decode is constrained but accepts the same hints.
        assert_eq!(de.message_to_object_as::<Quote>(sub).unwrap(), quote);
    }

    #[test]
    fn renamed_class_still_resolves() {
        let ctx = Context::new();
        ctx.builders()
            .register::<Quote, _>(&["md.Quote"], QuoteBuilder)
            .unwrap();
        ctx.dictionary()
            .register_class_rename("legacy.Quote", "md.Quote")
            .unwrap();

        let mut msg = Message::new();
        msg.add_by_ordinal(0, "legacy.Quote").unwrap();
        msg.add_by_name("ticker", "VOD").unwrap();
        msg.add_by_name("price", 72.5f64).unwrap();

        let de = ctx.deserializer();
        let back = de.message_to_object(&msg).unwrap();
        assert!(back.downcast::<Quote>().is_ok());
    }

    #[test]
    fn unknown_class_hint_returns_raw_message() {
        let ctx = Context::new();
        let mut msg = Message::new();
        msg.add_by_ordinal(0, "nobody.Knows").unwrap();
        msg.add_by_name("x", 1i32).unwrap();

        let de = ctx.deserializer();
        let back = de.message_to_object(&msg).unwrap();
        assert_eq!(back.downcast::<Message>().unwrap().as_ref(), &msg);
    }

    #[test]
    fn numeric_class_hint_is_unsupported() {
        let ctx = Context::new();
        let mut msg = Message::new();
        msg.add_by_ordinal(0, 3i32).unwrap();

        let de = ctx.deserializer();
        assert_matches!(
            de.message_to_object(&msg),
            Err(Error::UnsupportedFeature(_))
        );
    }

    #[test]
    fn no_builder_reported() {
        struct Opaque;
        let ctx = Context::new();
        let mut ser = ctx.serializer();
        assert_matches!(
            ser.object_to_message(&Opaque),
            Err(Error::NoBuilder { .. })
        );
    }

    #[test]
    fn multiple_envelopes_decode_in_order() {
        let ctx = Context::new();
        let mut a = Message::new();
        a.add_by_name("x", 1i32).unwrap();
        let mut b = Message::new();
        b.add_by_name("y", 2i32).unwrap();

        let mut bytes = ctx.encode(&Envelope::new(a.clone())).unwrap();
        bytes.extend(ctx.encode(&Envelope::new(b.clone())).unwrap());
        let envelopes = ctx.decode_all(&bytes).unwrap();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].message(), &a);
        assert_eq!(envelopes[1].message(), &b);
    }
}
