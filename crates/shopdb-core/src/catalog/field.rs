//! Field definitions for entities.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::types::ScalarType;
use crate::value::{is_decimal_literal, Value};

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: ScalarType,
    /// Whether the field is required (non-nullable).
    pub required: bool,
    /// Whether this field is the entity's primary key.
    pub primary_key: bool,
    /// Whether the storage layer generates the value on insert.
    pub auto_generated: bool,
    /// Default value if not provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Predicate checked at write time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<Validator>,
    /// Foreign key target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Reference>,
}

/// Default value for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Decimal value.
    Decimal(Decimal),
    /// String value.
    String(String),
}

/// Named write-time predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    /// Value must be representable as a decimal number.
    IsDecimal,
    /// Value must be numeric (an integer, a decimal, or a numeric string).
    IsNumeric,
    /// Strings must contain a non-whitespace character.
    NotEmpty,
}

/// Target of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// Referenced entity name.
    pub entity: String,
    /// Referenced field (the target's primary key).
    pub field: String,
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, field_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            primary_key: false,
            auto_generated: false,
            default: None,
            validator: None,
            references: None,
        }
    }

    /// Create an optional field (required = false).
    pub fn optional(name: impl Into<String>, field_type: ScalarType) -> Self {
        Self {
            required: false,
            ..Self::new(name, field_type)
        }
    }

    /// Create an auto-incrementing integer surrogate key.
    pub fn surrogate_key(name: impl Into<String>) -> Self {
        Self::new(name, ScalarType::Integer)
            .as_primary_key()
            .auto_generated()
    }

    /// Mark as the primary key. Primary keys are always required.
    pub fn as_primary_key(mut self) -> Self {
        self.primary_key = true;
        self.required = true;
        self
    }

    /// Let the storage layer generate the value.
    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Set the write-time validator.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Declare this field as a foreign key to `entity.field`.
    pub fn references(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.references = Some(Reference {
            entity: entity.into(),
            field: field.into(),
        });
        self
    }

    /// Check if this field has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Check if this field is a foreign key.
    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }
}

impl DefaultValue {
    /// Convert to a runtime value.
    pub fn to_value(&self) -> Value {
        match self {
            DefaultValue::Null => Value::Null,
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Int(i) => Value::Int(*i),
            DefaultValue::Decimal(d) => Value::Decimal(*d),
            DefaultValue::String(s) => Value::String(s.clone()),
        }
    }

    /// Check whether the default can be stored in a field of this type.
    pub fn fits(&self, field_type: ScalarType) -> bool {
        matches!(
            (self, field_type),
            (DefaultValue::Null, _)
                | (DefaultValue::Bool(_), ScalarType::Bool)
                | (DefaultValue::Int(_), ScalarType::Integer | ScalarType::Decimal)
                | (DefaultValue::Decimal(_), ScalarType::Decimal)
                | (DefaultValue::String(_), ScalarType::String)
        )
    }
}

impl Validator {
    /// Validator name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Validator::IsDecimal => "isDecimal",
            Validator::IsNumeric => "isNumeric",
            Validator::NotEmpty => "notEmpty",
        }
    }

    /// Evaluate the predicate against a non-null value.
    pub fn check(&self, value: &Value) -> bool {
        match self {
            Validator::IsDecimal => value.parse_decimal().is_some(),
            Validator::IsNumeric => match value {
                Value::Int(_) | Value::Decimal(_) => true,
                Value::String(s) => is_decimal_literal(s.trim()),
                _ => false,
            },
            Validator::NotEmpty => match value {
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::new("stock", ScalarType::Integer)
            .with_default(DefaultValue::Int(10))
            .with_validator(Validator::IsNumeric);

        assert_eq!(field.name, "stock");
        assert!(field.required);
        assert!(!field.primary_key);
        assert!(field.has_default());
        assert_eq!(field.validator, Some(Validator::IsNumeric));
    }

    #[test]
    fn test_surrogate_key() {
        let field = FieldDef::surrogate_key("id");

        assert!(field.primary_key);
        assert!(field.auto_generated);
        assert!(field.required);
        assert_eq!(field.field_type, ScalarType::Integer);
    }

    #[test]
    fn test_foreign_key() {
        let field = FieldDef::optional("category_id", ScalarType::Integer).references("category", "id");

        assert!(!field.required);
        assert!(field.is_foreign_key());
        assert_eq!(field.references.unwrap().entity, "category");
    }

    #[test]
    fn test_is_decimal() {
        assert!(Validator::IsDecimal.check(&Value::from("19.99")));
        assert!(Validator::IsDecimal.check(&Value::Int(20)));
        assert!(!Validator::IsDecimal.check(&Value::from("abc")));
        assert!(!Validator::IsDecimal.check(&Value::Bool(false)));
        assert!(!Validator::IsDecimal.check(&Value::from("1_000")));
        assert!(!Validator::IsDecimal.check(&Value::from("1__2.3_")));
        assert!(!Validator::IsDecimal.check(&Value::from("1.")));
        assert!(!Validator::IsDecimal.check(&Value::from("1e3")));
        assert!(Validator::IsDecimal.check(&Value::from("-0.5")));
    }

    #[test]
    fn test_is_numeric() {
        assert!(Validator::IsNumeric.check(&Value::Int(5)));
        assert!(Validator::IsNumeric.check(&Value::from("42")));
        assert!(Validator::IsNumeric.check(&Value::from("-3")));
        assert!(Validator::IsNumeric.check(&Value::from(".5")));
        assert!(Validator::IsNumeric.check(&Value::from("1.5")));
        assert!(!Validator::IsNumeric.check(&Value::from("1.")));
        assert!(!Validator::IsNumeric.check(&Value::from("ten")));
        assert!(!Validator::IsNumeric.check(&Value::from("")));
    }

    #[test]
    fn test_default_fits() {
        assert!(DefaultValue::Int(10).fits(ScalarType::Integer));
        assert!(DefaultValue::Int(10).fits(ScalarType::Decimal));
        assert!(!DefaultValue::String("x".into()).fits(ScalarType::Integer));
        assert!(!DefaultValue::Decimal(Decimal::ONE).fits(ScalarType::Integer));
    }
}
