//! Scalar types a data point can carry.
//!
//! [`ScalarType`] ties a Rust type to its [`DataType`] keyword, its dynamic
//! [`Value`] variant and its wire encoding. Values are encoded with
//! `bincode`: fixed-width little-endian numbers, `bool` as one byte and
//! strings as a length-prefixed UTF-8 sequence.

use batchio_common::data::{DataType, Value};
use batchio_common::error::IoError;
use core::fmt;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A scalar that a typed value handler can be instantiated for.
pub trait ScalarType:
    Clone + Default + PartialEq + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Keyword this type is selected by.
    const DATA_TYPE: DataType;

    /// Wrap into a dynamic value.
    fn into_value(self) -> Value;

    /// Unwrap a dynamic value of the matching variant.
    fn from_value(value: Value) -> Option<Self>;

    /// Whether two values are the same for change detection.
    ///
    /// Floating point values compare by bit pattern so a NaN that stays
    /// NaN does not count as a change.
    fn same_as(&self, other: &Self) -> bool {
        self == other
    }

    /// Encode for a write command.
    fn encode(&self) -> Result<Vec<u8>, IoError> {
        bincode::serialize(self).map_err(|_| IoError::Encode)
    }

    /// Decode one payload field.
    fn decode(bytes: &[u8]) -> Result<Self, IoError> {
        bincode::deserialize(bytes).map_err(|_| IoError::Decode)
    }
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ScalarType for $ty {
                const DATA_TYPE: DataType = DataType::$variant;

                #[inline]
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                #[inline]
                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

macro_rules! impl_float_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ScalarType for $ty {
                const DATA_TYPE: DataType = DataType::$variant;

                #[inline]
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }

                #[inline]
                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                #[inline]
                fn same_as(&self, other: &Self) -> bool {
                    self.to_bits() == other.to_bits()
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    String => String,
}

impl_float_scalar! {
    f32 => Float32,
    f64 => Float64,
}

/// Encoding of the zero value of `data_type`.
///
/// Devices use this for items that were never written.
pub fn default_bytes(data_type: DataType) -> Vec<u8> {
    fn zero<T: ScalarType>() -> Vec<u8> {
        T::default().encode().unwrap_or_default()
    }

    match data_type {
        DataType::Bool => zero::<bool>(),
        DataType::Uint8 => zero::<u8>(),
        DataType::Uint16 => zero::<u16>(),
        DataType::Uint32 => zero::<u32>(),
        DataType::Uint64 => zero::<u64>(),
        DataType::Int8 => zero::<i8>(),
        DataType::Int16 => zero::<i16>(),
        DataType::Int32 => zero::<i32>(),
        DataType::Int64 => zero::<i64>(),
        DataType::Float32 => zero::<f32>(),
        DataType::Float64 => zero::<f64>(),
        DataType::String => zero::<String>(),
    }
}
