//! Materialized rows.

use rust_decimal::Decimal;

use crate::value::Value;

/// A stored row decoded into field values, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Primary key value.
    pub id: i64,
    /// Field name/value pairs, including the primary key.
    pub fields: Vec<(String, Value)>,
}

impl Row {
    /// Create a row.
    pub fn new(id: i64, fields: Vec<(String, Value)>) -> Self {
        Self { id, fields }
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Integer field, or None when absent or null.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// String field, or None when absent or null.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Decimal field, or None when absent or null.
    pub fn get_decimal(&self, name: &str) -> Option<Decimal> {
        self.get(name).and_then(Value::as_decimal)
    }

    /// Replace a field's value. Returns false if the field is absent.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// JSON object of the row's fields.
    pub fn to_json(&self) -> serde_json::Value {
        let object: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        serde_json::Value::Object(object)
    }
}
