//! Field-level write validation.
//!
//! Supplied values are checked against the entity declaration in this order:
//! unknown and auto-generated fields, nullability (after applying defaults),
//! the field's validator, then coercion to the storage type.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;

use crate::catalog::{EntityDef, FieldDef, ScalarType};
use crate::error::ValidationError;
use crate::query::Row;
use crate::value::Value;

/// Validates and normalizes row values for one entity.
pub struct FieldValidator<'a> {
    entity: &'a EntityDef,
}

impl<'a> FieldValidator<'a> {
    /// Create a validator for an entity declaration.
    pub fn new(entity: &'a EntityDef) -> Self {
        Self { entity }
    }

    /// Build the full field list for a new row.
    ///
    /// Auto-generated fields are left as [`Value::Null`] for the storage
    /// layer to fill. A field supplied twice keeps its last value.
    pub fn prepare_insert(
        &self,
        values: Vec<(String, Value)>,
    ) -> Result<Vec<(String, Value)>, ValidationError> {
        let mut supplied = self.collect(values)?;

        let mut row = Vec::with_capacity(self.entity.fields.len());
        for field in &self.entity.fields {
            if field.auto_generated {
                row.push((field.name.clone(), Value::Null));
                continue;
            }

            let value = match supplied.remove(field.name.as_str()) {
                Some(value) => value,
                None => match &field.default {
                    Some(default) => default.to_value(),
                    None if field.required => {
                        return Err(ValidationError::MissingField {
                            entity: self.entity.name.clone(),
                            field: field.name.clone(),
                        })
                    }
                    None => Value::Null,
                },
            };
            row.push((field.name.clone(), self.check(field, value)?));
        }

        Ok(row)
    }

    /// Merge changes into an existing row.
    ///
    /// The primary key and auto-generated fields cannot be changed.
    pub fn prepare_update(
        &self,
        current: &Row,
        changes: Vec<(String, Value)>,
    ) -> Result<Vec<(String, Value)>, ValidationError> {
        let mut supplied = self.collect(changes)?;
        if let Some(key) = self.entity.primary_key() {
            if supplied.contains_key(key.name.as_str()) {
                return Err(ValidationError::AutoGenerated {
                    entity: self.entity.name.clone(),
                    field: key.name.clone(),
                });
            }
        }

        let mut row = Vec::with_capacity(self.entity.fields.len());
        for field in &self.entity.fields {
            let value = match supplied.remove(field.name.as_str()) {
                Some(value) => self.check(field, value)?,
                // Rows written before a field was added carry no value for it.
                None => current.get(&field.name).cloned().unwrap_or(Value::Null),
            };
            row.push((field.name.clone(), value));
        }

        Ok(row)
    }

    fn collect(
        &self,
        values: Vec<(String, Value)>,
    ) -> Result<HashMap<String, Value>, ValidationError> {
        let mut supplied = HashMap::with_capacity(values.len());
        for (name, value) in values {
            let Some(field) = self.entity.get_field(&name) else {
                return Err(ValidationError::UnknownField {
                    entity: self.entity.name.clone(),
                    field: name,
                });
            };
            if field.auto_generated {
                return Err(ValidationError::AutoGenerated {
                    entity: self.entity.name.clone(),
                    field: name,
                });
            }
            supplied.insert(name, value);
        }
        Ok(supplied)
    }

    /// Apply nullability, the validator and coercion to one value.
    fn check(&self, field: &FieldDef, value: Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            if field.required {
                return Err(ValidationError::NullViolation {
                    entity: self.entity.name.clone(),
                    field: field.name.clone(),
                });
            }
            return Ok(Value::Null);
        }

        if let Some(validator) = field.validator {
            if !validator.check(&value) {
                return Err(ValidationError::Predicate {
                    entity: self.entity.name.clone(),
                    field: field.name.clone(),
                    validator: validator.name().to_string(),
                    value: value.to_string(),
                });
            }
        }

        coerce(field.field_type, &value).ok_or_else(|| ValidationError::TypeMismatch {
            entity: self.entity.name.clone(),
            field: field.name.clone(),
            expected: field.field_type.name().to_string(),
            value: value.to_string(),
        })
    }
}

/// Convert a non-null value to a field's storage type.
///
/// Numeric strings are parsed; a decimal only becomes an integer when it has
/// no fractional part. Returns None when no lossless conversion exists.
pub fn coerce(field_type: ScalarType, value: &Value) -> Option<Value> {
    match (field_type, value) {
        (ScalarType::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
        (ScalarType::Integer, Value::Int(i)) => Some(Value::Int(*i)),
        (ScalarType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Some(Value::Int(i)),
            Err(_) => integral(value),
        },
        (ScalarType::Integer, Value::Decimal(_)) => integral(value),
        (ScalarType::Decimal, Value::Int(_) | Value::Decimal(_) | Value::String(_)) => {
            value.parse_decimal().map(Value::Decimal)
        }
        (ScalarType::String, Value::String(s)) => Some(Value::String(s.clone())),
        _ => None,
    }
}

fn integral(value: &Value) -> Option<Value> {
    let decimal = value.parse_decimal()?;
    if !decimal.fract().is_zero() {
        return None;
    }
    decimal.to_i64().map(Value::Int)
}
