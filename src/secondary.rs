//! Secondary types: domain types layered over primary wire types.

use std::any::Any;

use crate::error::{Error, Result};
use crate::value::Value;
use crate::wire::WireType;

/// An adapter that encodes a host type as one of the primary wire types.
///
/// Registering a secondary type does not allocate a new wire id; on the wire
/// the value is indistinguishable from its primary. The two conversion
/// functions must be inverses: `from_primary(to_primary(v)) == v`.
///
/// ```
/// use fudge_msg::{SecondaryType, Value, WireType, Result, Error};
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// enum Currency { Usd, Eur }
///
/// struct CurrencyType;
///
/// impl SecondaryType for CurrencyType {
///     type Host = Currency;
///
///     fn primary(&self) -> WireType {
///         WireType::Int
///     }
///
///     fn to_primary(&self, value: &Currency) -> Result<Value> {
///         Ok(Value::Int(match value {
///             Currency::Usd => 1,
///             Currency::Eur => 2,
///         }))
///     }
///
///     fn from_primary(&self, value: Value) -> Result<Currency> {
///         match value.as_i64() {
///             Some(1) => Ok(Currency::Usd),
///             Some(2) => Ok(Currency::Eur),
///             _ => Err(Error::ConversionUnavailable {
///                 wire_type: "int",
///                 target: "Currency",
///             }),
///         }
///     }
/// }
/// ```
pub trait SecondaryType: Send + Sync + 'static {
    /// The host type this adapter covers.
    type Host: Send + Sync + 'static;

    /// The primary wire type values of `Host` travel as.
    fn primary(&self) -> WireType;

    /// Convert a host value into its primary representation.
    fn to_primary(&self, value: &Self::Host) -> Result<Value>;

    /// Convert a primary representation back into the host type. The value
    /// handed in is already coerced to [`SecondaryType::primary`].
    fn from_primary(&self, value: Value) -> Result<Self::Host>;
}

/// Object-safe form of [`SecondaryType`], as held by the type dictionary.
pub(crate) trait ErasedSecondaryType: Send + Sync {
    fn primary(&self) -> WireType;

    fn host_type_name(&self) -> &'static str;

    fn to_primary_any(&self, value: &dyn Any) -> Result<Value>;

    fn from_primary_any(&self, value: Value) -> Result<Box<dyn Any + Send + Sync>>;

    /// Whether a field of the given wire type can feed
    /// [`ErasedSecondaryType::from_primary_any`] after coercion.
    fn can_convert_primary(&self, wire_type: WireType) -> bool;
}

pub(crate) struct SecondaryAdapter<S>(pub S);

impl<S: SecondaryType> ErasedSecondaryType for SecondaryAdapter<S> {
    fn primary(&self) -> WireType {
        self.0.primary()
    }

    fn host_type_name(&self) -> &'static str {
        std::any::type_name::<S::Host>()
    }

    fn to_primary_any(&self, value: &dyn Any) -> Result<Value> {
        let value = value.downcast_ref::<S::Host>().ok_or({
            Error::ConversionUnavailable {
                wire_type: "secondary",
                target: std::any::type_name::<S::Host>(),
            }
        })?;
        self.0.to_primary(value)
    }

    fn from_primary_any(&self, value: Value) -> Result<Box<dyn Any + Send + Sync>> {
        Ok(Box::new(self.0.from_primary(value)?))
    }

    fn can_convert_primary(&self, wire_type: WireType) -> bool {
        let primary = self.0.primary();
        if wire_type == primary {
            return true;
        }
        // Integral values narrow on the wire, so a secondary over `int` must
        // accept a field that travelled as byte or short.
        integral(primary) && integral(wire_type)
    }
}

fn integral(wire_type: WireType) -> bool {
    matches!(
        wire_type,
        WireType::Byte | WireType::Short | WireType::Int | WireType::Long
    )
}
