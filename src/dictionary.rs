//! The type dictionary: host-type registrations and value conversion.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::datetime::{Date, DateTime, Time};
use crate::error::{Error, Result};
use crate::field::Field;
use crate::message::Message;
use crate::secondary::{ErasedSecondaryType, SecondaryAdapter, SecondaryType};
use crate::value::Value;
use crate::wire::WireType;

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

/// The registry tying Rust types to wire types.
///
/// A dictionary is built once, shared behind an [`Arc`], and extended
/// concurrently afterwards: every map inside is independently locked, a
/// successful registration is visible to all later lookups, and duplicate
/// registrations are idempotent when they agree and fail when they don't.
///
/// Three registries live here:
///
/// - **Host associations** map a Rust `TypeId` to the wire type its values
///   travel as. The standard primitives are pre-registered.
/// - **Secondary types** layer domain types over a primary wire type (see
///   [`SecondaryType`]).
/// - **Class renames** map retired type names to their current spelling,
///   consulted whenever a class-name string from a message is resolved.
pub struct TypeDictionary {
    by_host: RwLock<HashMap<TypeId, WireType>>,
    secondary: RwLock<HashMap<TypeId, Arc<dyn ErasedSecondaryType>>>,
    renames: RwLock<HashMap<String, String>>,
}

impl Default for TypeDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeDictionary {
    /// A dictionary with the standard wire types registered against their
    /// natural Rust host types.
    pub fn new() -> Self {
        let dict = TypeDictionary {
            by_host: RwLock::new(HashMap::new()),
            secondary: RwLock::new(HashMap::new()),
            renames: RwLock::new(HashMap::new()),
        };
        {
            let mut map = write(&dict.by_host);
            map.insert(TypeId::of::<()>(), WireType::Indicator);
            map.insert(TypeId::of::<bool>(), WireType::Boolean);
            map.insert(TypeId::of::<i8>(), WireType::Byte);
            map.insert(TypeId::of::<i16>(), WireType::Short);
            map.insert(TypeId::of::<i32>(), WireType::Int);
            map.insert(TypeId::of::<i64>(), WireType::Long);
            map.insert(TypeId::of::<f32>(), WireType::Float);
            map.insert(TypeId::of::<f64>(), WireType::Double);
            map.insert(TypeId::of::<String>(), WireType::String);
            map.insert(TypeId::of::<Vec<u8>>(), WireType::ByteArray);
            map.insert(TypeId::of::<Vec<i16>>(), WireType::ShortArray);
            map.insert(TypeId::of::<Vec<i32>>(), WireType::IntArray);
            map.insert(TypeId::of::<Vec<i64>>(), WireType::LongArray);
            map.insert(TypeId::of::<Vec<f32>>(), WireType::FloatArray);
            map.insert(TypeId::of::<Vec<f64>>(), WireType::DoubleArray);
            map.insert(TypeId::of::<Message>(), WireType::Message);
            map.insert(TypeId::of::<Date>(), WireType::Date);
            map.insert(TypeId::of::<Time>(), WireType::Time);
            map.insert(TypeId::of::<DateTime>(), WireType::DateTime);
        }
        dict
    }

    /// The wire type for a numeric id. Never fails; unassigned ids come back
    /// as [`WireType::Unknown`].
    pub fn wire_type_by_id(&self, id: u8) -> WireType {
        WireType::from_id(id)
    }

    /// Associate a Rust type with a wire type, so raw values of that type
    /// can be written. Re-registering the same association is a no-op; a
    /// conflicting one fails.
    pub fn register_host_type<T: 'static>(&self, wire_type: WireType) -> Result<()> {
        let mut map = write(&self.by_host);
        match map.get(&TypeId::of::<T>()) {
            Some(existing) if *existing == wire_type => Ok(()),
            Some(existing) => Err(Error::AlreadyRegistered(format!(
                "host type {} already mapped to wire type {}",
                std::any::type_name::<T>(),
                existing.name()
            ))),
            None => {
                debug!(
                    host = std::any::type_name::<T>(),
                    wire = wire_type.name(),
                    "registered host type"
                );
                map.insert(TypeId::of::<T>(), wire_type);
                Ok(())
            }
        }
    }

    /// The wire type a value of `T` travels as, if `T` is registered either
    /// directly or as a secondary type.
    pub fn wire_type_of<T: 'static>(&self) -> Option<WireType> {
        let host = TypeId::of::<T>();
        if let Some(wire) = read(&self.by_host).get(&host) {
            return Some(*wire);
        }
        read(&self.secondary).get(&host).map(|s| s.primary())
    }

    /// Register a secondary type for its host type. Re-registering with the
    /// same primary wire type is a no-op; a different primary fails.
    pub fn register_secondary<S: SecondaryType>(&self, secondary: S) -> Result<()> {
        let host = TypeId::of::<S::Host>();
        let primary = secondary.primary();
        let mut map = write(&self.secondary);
        match map.get(&host) {
            Some(existing) if existing.primary() == primary => Ok(()),
            Some(existing) => Err(Error::AlreadyRegistered(format!(
                "secondary type for {} already registered over {}",
                std::any::type_name::<S::Host>(),
                existing.primary().name()
            ))),
            None => {
                debug!(
                    host = std::any::type_name::<S::Host>(),
                    primary = primary.name(),
                    "registered secondary type"
                );
                map.insert(host, Arc::new(SecondaryAdapter(secondary)));
                Ok(())
            }
        }
    }

    pub(crate) fn secondary_of_id(&self, host: TypeId) -> Option<Arc<dyn ErasedSecondaryType>> {
        read(&self.secondary).get(&host).cloned()
    }

    /// Record that `old_name` is now spelled `new_name`. Consulted when
    /// resolving class-name strings from messages. Conflicting targets fail.
    pub fn register_class_rename(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut map = write(&self.renames);
        match map.get(old_name) {
            Some(existing) if existing == new_name => Ok(()),
            Some(existing) => Err(Error::AlreadyRegistered(format!(
                "class rename {:?} already points at {:?}",
                old_name, existing
            ))),
            None => {
                debug!(old = old_name, new = new_name, "registered class rename");
                map.insert(old_name.to_string(), new_name.to_string());
                Ok(())
            }
        }
    }

    /// Resolve a class name through the rename registry, following chains of
    /// renames. A name with no rename resolves to itself.
    pub fn resolve_class_name(&self, name: &str) -> String {
        let map = read(&self.renames);
        let mut current = name;
        // Chains are followed at most as deep as the registry itself, which
        // also terminates rename loops.
        for _ in 0..=map.len() {
            match map.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.to_string()
    }

    /// Convert a field's value into host type `T`.
    ///
    /// Returns `Ok(None)` when the value carries no data: an indicator field
    /// converts to "no value" for every requested type. Fails with
    /// [`Error::ConversionUnavailable`] when no conversion path exists.
    pub fn convert<T: Send + Sync + 'static>(&self, field: &Field) -> Result<Option<T>> {
        if field.value().is_indicator() {
            return Ok(None);
        }
        let target = TypeId::of::<T>();
        if let Some(secondary) = self.secondary_of_id(target) {
            if secondary.can_convert_primary(field.wire_type()) {
                let primary = coerce_to_wire(field.value(), secondary.primary())
                    .ok_or_else(|| conversion_unavailable::<T>(field))?;
                let boxed = secondary.from_primary_any(primary)?;
                return match boxed.downcast::<T>() {
                    Ok(v) => Ok(Some(*v)),
                    Err(_) => Err(conversion_unavailable::<T>(field)),
                };
            }
            return Err(conversion_unavailable::<T>(field));
        }
        match primitive_convert(target, field.value()) {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(v) => Ok(Some(*v)),
                Err(_) => Err(conversion_unavailable::<T>(field)),
            },
            None => Err(conversion_unavailable::<T>(field)),
        }
    }

    /// Whether [`TypeDictionary::convert`] would succeed for `T`.
    pub fn can_convert<T: Send + Sync + 'static>(&self, field: &Field) -> bool {
        self.convert::<T>(field).is_ok()
    }

    /// Turn a runtime-typed reference into a wire value, if its type is
    /// registered directly or as a secondary type. Used when adding raw
    /// values to a message; `None` means the value must travel as a
    /// sub-message instead.
    pub(crate) fn value_of_any(&self, ty: TypeId, value: &dyn Any) -> Result<Option<Value>> {
        macro_rules! arm {
            ($t:ty, $to:expr) => {
                if ty == TypeId::of::<$t>() {
                    let v = value
                        .downcast_ref::<$t>()
                        .expect("TypeId just matched");
                    #[allow(clippy::redundant_closure_call)]
                    return Ok(Some(($to)(v)));
                }
            };
        }

        arm!((), |_: &()| Value::Indicator);
        arm!(bool, |v: &bool| Value::Boolean(*v));
        arm!(i8, |v: &i8| Value::Byte(*v));
        arm!(i16, |v: &i16| Value::Short(*v));
        arm!(i32, |v: &i32| Value::Int(*v));
        arm!(i64, |v: &i64| Value::Long(*v));
        arm!(f32, |v: &f32| Value::Float(*v));
        arm!(f64, |v: &f64| Value::Double(*v));
        arm!(String, |v: &String| Value::String(v.clone()));
        arm!(&str, |v: &&str| Value::String(v.to_string()));
        arm!(Vec<u8>, |v: &Vec<u8>| Value::ByteArray(v.clone()));
        arm!(Vec<i16>, |v: &Vec<i16>| Value::ShortArray(v.clone()));
        arm!(Vec<i32>, |v: &Vec<i32>| Value::IntArray(v.clone()));
        arm!(Vec<i64>, |v: &Vec<i64>| Value::LongArray(v.clone()));
        arm!(Vec<f32>, |v: &Vec<f32>| Value::FloatArray(v.clone()));
        arm!(Vec<f64>, |v: &Vec<f64>| Value::DoubleArray(v.clone()));
        arm!(Date, |v: &Date| Value::Date(*v));
        arm!(Time, |v: &Time| Value::Time(*v));
        arm!(DateTime, |v: &DateTime| Value::DateTime(*v));
        arm!(Value, |v: &Value| v.clone());

        if let Some(secondary) = self.secondary_of_id(ty) {
            return secondary.to_primary_any(value).map(Some);
        }
        Ok(None)
    }
}

fn conversion_unavailable<T>(field: &Field) -> Error {
    Error::ConversionUnavailable {
        wire_type: field.wire_type().name(),
        target: std::any::type_name::<T>(),
    }
}

/// Coerce a value to the host representation of the given wire type, used to
/// feed secondary-type converters whose primary is wider than the value that
/// actually travelled.
fn coerce_to_wire(value: &Value, target: WireType) -> Option<Value> {
    if value.natural_wire_type() == target {
        return Some(value.clone());
    }
    let v = value.as_i64()?;
    match target {
        WireType::Byte => i8::try_from(v).ok().map(Value::Byte),
        WireType::Short => i16::try_from(v).ok().map(Value::Short),
        WireType::Int => i32::try_from(v).ok().map(Value::Int),
        WireType::Long => Some(Value::Long(v)),
        _ => None,
    }
}

type AnyBox = Box<dyn Any + Send + Sync>;

/// The built-in conversion lattice between primitive host types. Integer
/// conversions are lossless-or-nothing; floats widen freely and narrow only
/// when the value survives the round trip.
fn primitive_convert(target: TypeId, value: &Value) -> Option<AnyBox> {
    macro_rules! arm {
        ($t:ty, $expr:expr) => {
            if target == TypeId::of::<$t>() {
                return ($expr).map(|v| Box::new(v) as AnyBox);
            }
        };
    }

    arm!(bool, value.as_bool());
    arm!(i8, value.as_i64().and_then(|v| i8::try_from(v).ok()));
    arm!(i16, value.as_i64().and_then(|v| i16::try_from(v).ok()));
    arm!(i32, value.as_i64().and_then(|v| i32::try_from(v).ok()));
    arm!(i64, value.as_i64());
    arm!(f32, as_f32_exact(value));
    arm!(f64, value.as_f64());
    arm!(String, value.as_str().map(str::to_string));
    arm!(Vec<u8>, match *value {
        Value::ByteArray(ref v) => Some(v.clone()),
        _ => None,
    });
    arm!(Vec<i16>, match *value {
        Value::ShortArray(ref v) => Some(v.clone()),
        _ => None,
    });
    arm!(Vec<i32>, match *value {
        Value::IntArray(ref v) => Some(v.clone()),
        _ => None,
    });
    arm!(Vec<i64>, match *value {
        Value::LongArray(ref v) => Some(v.clone()),
        _ => None,
    });
    arm!(Vec<f32>, match *value {
        Value::FloatArray(ref v) => Some(v.clone()),
        _ => None,
    });
    arm!(Vec<f64>, match *value {
        Value::DoubleArray(ref v) => Some(v.clone()),
        _ => None,
    });
    arm!(Message, value.as_message().cloned());
    arm!(Date, value.as_date());
    arm!(Time, value.as_time());
    arm!(DateTime, value.as_datetime());
    None
}

fn as_f32_exact(value: &Value) -> Option<f32> {
    match *value {
        Value::Float(v) => Some(v),
        Value::Double(v) => {
            let narrowed = v as f32;
            (narrowed as f64 == v).then_some(narrowed)
        }
        _ => {
            let v = value.as_i64()?;
            let narrowed = v as f32;
            (narrowed as i64 == v).then_some(narrowed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

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

        fn to_primary(&self, value: &Currency) -> Result<Value> {
            Ok(Value::Int(match value {
                Currency::Usd => 1,
                Currency::Eur => 2,
            }))
        }

        fn from_primary(&self, value: Value) -> Result<Currency> {
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

    fn field(value: Value) -> Field {
        Field::of(None, None, value).unwrap()
    }

    #[test]
    fn standard_host_types_preregistered() {
        let dict = TypeDictionary::new();
        assert_eq!(dict.wire_type_of::<i32>(), Some(WireType::Int));
        assert_eq!(dict.wire_type_of::<String>(), Some(WireType::String));
        assert_eq!(dict.wire_type_of::<Vec<f64>>(), Some(WireType::DoubleArray));
        assert_eq!(dict.wire_type_of::<Currency>(), None);
    }

    #[test]
    fn unassigned_id_is_unknown() {
        let dict = TypeDictionary::new();
        assert_eq!(dict.wire_type_by_id(4), WireType::Int);
        assert_eq!(dict.wire_type_by_id(200), WireType::Unknown(200));
    }

    #[test]
    fn host_registration_conflicts() {
        struct Opaque;
        let dict = TypeDictionary::new();
        dict.register_host_type::<Opaque>(WireType::ByteArray).unwrap();
        // Same mapping again is fine.
        dict.register_host_type::<Opaque>(WireType::ByteArray).unwrap();
        assert_matches!(
            dict.register_host_type::<Opaque>(WireType::String),
            Err(Error::AlreadyRegistered(_))
        );
    }

    #[test]
    fn integer_conversions_are_lossless_or_nothing() {
        let dict = TypeDictionary::new();
        let small = field(Value::Byte(42));
        assert_eq!(dict.convert::<i64>(&small).unwrap(), Some(42));
        assert_eq!(dict.convert::<i32>(&small).unwrap(), Some(42));
        assert_eq!(dict.convert::<f64>(&small).unwrap(), Some(42.0));

        let big = field(Value::Long(5_000_000_000));
        assert_eq!(dict.convert::<i64>(&big).unwrap(), Some(5_000_000_000));
        assert_matches!(
            dict.convert::<i32>(&big),
            Err(Error::ConversionUnavailable { .. })
        );
        assert!(!dict.can_convert::<i32>(&big));
        assert!(dict.can_convert::<i64>(&big));
    }

    #[test]
    fn float_narrowing_requires_exact_round_trip() {
        let dict = TypeDictionary::new();
        let exact = field(Value::Double(1.5));
        assert_eq!(dict.convert::<f32>(&exact).unwrap(), Some(1.5));
        let inexact = field(Value::Double(0.1));
        assert_matches!(
            dict.convert::<f32>(&inexact),
            Err(Error::ConversionUnavailable { .. })
        );
    }

    #[test]
    fn indicator_converts_to_none_for_any_target() {
        let dict = TypeDictionary::new();
        let ind = field(Value::Indicator);
        assert_eq!(dict.convert::<i32>(&ind).unwrap(), None);
        assert_eq!(dict.convert::<String>(&ind).unwrap(), None);
        assert_eq!(dict.convert::<Currency>(&ind).unwrap(), None);
    }

    #[test]
    fn secondary_type_round_trip() {
        let dict = TypeDictionary::new();
        dict.register_secondary(CurrencyType).unwrap();
        assert_eq!(dict.wire_type_of::<Currency>(), Some(WireType::Int));

        // The value narrowed to byte on the way in; conversion must still
        // find its way back through the int primary.
        let f = field(Value::Byte(1));
        assert_eq!(dict.convert::<Currency>(&f).unwrap(), Some(Currency::Usd));
        let f = field(Value::Int(2));
        assert_eq!(dict.convert::<Currency>(&f).unwrap(), Some(Currency::Eur));
        let f = field(Value::String("USD".into()));
        assert_matches!(
            dict.convert::<Currency>(&f),
            Err(Error::ConversionUnavailable { .. })
        );
    }

    #[test]
    fn secondary_reregistration() {
        struct CurrencyAsString;
        impl SecondaryType for CurrencyAsString {
            type Host = Currency;
            fn primary(&self) -> WireType {
                WireType::String
            }
            fn to_primary(&self, _: &Currency) -> Result<Value> {
                Ok(Value::String("USD".into()))
            }
            fn from_primary(&self, _: Value) -> Result<Currency> {
                Ok(Currency::Usd)
            }
        }

        let dict = TypeDictionary::new();
        dict.register_secondary(CurrencyType).unwrap();
        dict.register_secondary(CurrencyType).unwrap();
        assert_matches!(
            dict.register_secondary(CurrencyAsString),
            Err(Error::AlreadyRegistered(_))
        );
    }

    #[test]
    fn class_renames_follow_chains() {
        let dict = TypeDictionary::new();
        dict.register_class_rename("legacy.Quote", "quotes.Quote").unwrap();
        dict.register_class_rename("quotes.Quote", "md.Quote").unwrap();
        assert_eq!(dict.resolve_class_name("legacy.Quote"), "md.Quote");
        assert_eq!(dict.resolve_class_name("md.Quote"), "md.Quote");
        dict.register_class_rename("legacy.Quote", "quotes.Quote").unwrap();
        assert_matches!(
            dict.register_class_rename("legacy.Quote", "other.Quote"),
            Err(Error::AlreadyRegistered(_))
        );
    }

    #[test]
    fn datetime_projects_to_date_and_time() {
        let dict = TypeDictionary::new();
        let dt = DateTime::new(
            Date::new(2024, 5, 1).unwrap(),
            Time::from_hms(10, 30, 0).unwrap(),
        );
        let f = field(Value::DateTime(dt));
        assert_eq!(dict.convert::<Date>(&f).unwrap(), Some(dt.date()));
        assert_eq!(dict.convert::<Time>(&f).unwrap(), Some(dt.time()));
        assert_eq!(dict.convert::<DateTime>(&f).unwrap(), Some(dt));
    }
}
