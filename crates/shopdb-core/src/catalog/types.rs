//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};

/// Scalar data types a field can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Integer,
    /// Arbitrary-precision decimal (28 significant digits).
    Decimal,
    /// UTF-8 string.
    String,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Integer | ScalarType::Decimal)
    }

    /// Type name used in error messages and schema descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Integer => "integer",
            ScalarType::Decimal => "decimal",
            ScalarType::String => "string",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_checks() {
        assert!(ScalarType::Integer.is_numeric());
        assert!(ScalarType::Decimal.is_numeric());
        assert!(!ScalarType::String.is_numeric());
        assert!(!ScalarType::Bool.is_numeric());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ScalarType::Decimal).unwrap();
        assert_eq!(json, "\"decimal\"");
    }
}
