//! Error types for state block accessors.

use batchio_common::data::DataType;
use thiserror::Error;

/// Errors returned when building or using an accessor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The owning transaction has not been realized, so the attribute has no
    /// slot yet.
    #[error("attribute is not backed by a realized state block")]
    NotRealized,

    /// The value passed to a write accessor has the wrong type.
    #[error("type mismatch: expected {expected}, got {}", display_actual(.actual))]
    TypeMismatch {
        /// Data type the attribute holds
        expected: DataType,
        /// Data type of the rejected value, `None` for status values
        actual: Option<DataType>,
    },
}

fn display_actual(actual: &Option<DataType>) -> &'static str {
    match actual {
        Some(data_type) => data_type.keyword(),
        None => "status value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_names_both_types() {
        let err = AccessError::TypeMismatch {
            expected: DataType::Int32,
            actual: Some(DataType::String),
        };
        let text = err.to_string();
        assert!(text.contains("int32"), "{text}");
        assert!(text.contains("string"), "{text}");

        let err = AccessError::TypeMismatch {
            expected: DataType::Bool,
            actual: None,
        };
        assert!(err.to_string().contains("status value"));
    }
}
