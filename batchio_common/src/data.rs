//! Data types, values and quality.
//!
//! `DataType` is the keyword table the configuration uses to pick a value
//! handler for a data point. `Value` is the dynamically typed form used at
//! the accessor boundary, where the concrete handler type is not known.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::error::IoError;

// ─── DataType ───────────────────────────────────────────────────────

/// Scalar type of a data point, selected by keyword in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DataType {
    Bool = 0,
    Uint8 = 1,
    Uint16 = 2,
    Uint32 = 3,
    Uint64 = 4,
    Int8 = 5,
    Int16 = 6,
    Int32 = 7,
    Int64 = 8,
    Float32 = 9,
    Float64 = 10,
    String = 11,
}

impl DataType {
    /// All supported data types, in keyword table order.
    pub const ALL: [DataType; 12] = [
        Self::Bool,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Float32,
        Self::Float64,
        Self::String,
    ];

    /// Configuration keyword for this type.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for DataType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|data_type| data_type.keyword() == s)
            .ok_or_else(|| format!("unknown data type: {s:?}"))
    }
}

// ─── Quality ────────────────────────────────────────────────────────

/// Quality of an input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Quality {
    /// The value was read successfully in the last cycle.
    Good = 0,
    /// The value is stale or was never read.
    #[default]
    Bad = 1,
}

impl Quality {
    /// Quality implied by a point error.
    #[inline]
    pub const fn from_error(error: &Option<IoError>) -> Self {
        match error {
            None => Self::Good,
            Some(_) => Self::Bad,
        }
    }
}

// ─── Direction ──────────────────────────────────────────────────────

/// Direction an event or data point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

// ─── Value ──────────────────────────────────────────────────────────

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Quality(Quality),
    Timestamp(SystemTime),
    Error(Option<IoError>),
}

impl Value {
    /// Scalar data type of this value, `None` for status values.
    pub fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Self::Bool(_) => DataType::Bool,
            Self::Uint8(_) => DataType::Uint8,
            Self::Uint16(_) => DataType::Uint16,
            Self::Uint32(_) => DataType::Uint32,
            Self::Uint64(_) => DataType::Uint64,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::String(_) => DataType::String,
            Self::Quality(_) | Self::Timestamp(_) | Self::Error(_) => return None,
        })
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                #[inline]
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Bool,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Quality => Quality,
    SystemTime => Timestamp,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<Option<IoError>> for Value {
    fn from(value: Option<IoError>) -> Self {
        Self::Error(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_parse_back() {
        for data_type in DataType::ALL {
            assert_eq!(data_type.keyword().parse::<DataType>(), Ok(data_type));
        }
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let err = "uint128".parse::<DataType>().unwrap_err();
        assert!(err.contains("uint128"));
    }

    #[test]
    fn keyword_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            data_type: DataType,
        }

        let wrapper: Wrapper = toml::from_str(r#"data_type = "float64""#).unwrap();
        assert_eq!(wrapper.data_type, DataType::Float64);
        assert!(toml::from_str::<Wrapper>(r#"data_type = "double""#).is_err());
    }

    #[test]
    fn quality_follows_error() {
        assert_eq!(Quality::from_error(&None), Quality::Good);
        assert_eq!(Quality::from_error(&Some(IoError::NoData)), Quality::Bad);
        assert_eq!(Quality::default(), Quality::Bad);
    }

    #[test]
    fn value_reports_scalar_type() {
        assert_eq!(Value::from(42i32).data_type(), Some(DataType::Int32));
        assert_eq!(Value::from("x").data_type(), Some(DataType::String));
        assert_eq!(Value::from(Quality::Good).data_type(), None);
    }
}
