//! Entity definitions.

use serde::{Deserialize, Serialize};

use super::field::FieldDef;
use crate::error::ConfigurationError;

/// An entity definition (table schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Logical entity name (unique within schema).
    pub name: String,
    /// Field definitions, in declaration order.
    pub fields: Vec<FieldDef>,
    /// Registration options.
    pub options: EntityOptions,
}

/// Options attached to an entity declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityOptions {
    /// Storage table name. Derived from the logical name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// The primary key carries business meaning and is supplied by callers.
    #[serde(default)]
    pub natural_key: bool,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            options: EntityOptions::default(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Override the storage table name.
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.options.table_name = Some(table.into());
        self
    }

    /// Declare that the primary key is a caller-supplied natural key.
    pub fn with_natural_key(mut self) -> Self {
        self.options.natural_key = true;
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get the position of a field by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Get the primary key field definition.
    pub fn primary_key(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Get all foreign key fields.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_foreign_key())
    }

    /// Storage table name: the override, or the lower-cased snake form of the
    /// logical name.
    pub fn table_name(&self) -> String {
        self.options
            .table_name
            .clone()
            .unwrap_or_else(|| derive_table_name(&self.name))
    }

    /// Check the declaration in isolation.
    ///
    /// Cross-entity checks (references, relations) happen in the schema builder.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyEntityName);
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ConfigurationError::EmptyFieldName {
                    entity: self.name.clone(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigurationError::DuplicateField {
                    entity: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if field.auto_generated && field.field_type != super::ScalarType::Integer {
                return Err(ConfigurationError::AutoGeneratedNotInteger {
                    entity: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if let Some(default) = &field.default {
                if !default.fits(field.field_type) {
                    return Err(self.invalid_default(field, "type mismatch"));
                }
                if field.required && matches!(default, super::DefaultValue::Null) {
                    return Err(self.invalid_default(field, "null default on a required field"));
                }
                if field.auto_generated {
                    return Err(self.invalid_default(field, "field is auto-generated"));
                }
            }
        }

        let keys: Vec<&FieldDef> = self.fields.iter().filter(|f| f.primary_key).collect();
        match keys.as_slice() {
            [] => Err(ConfigurationError::MissingPrimaryKey {
                entity: self.name.clone(),
            }),
            [key] => {
                if key.field_type != super::ScalarType::Integer {
                    Err(ConfigurationError::PrimaryKeyNotInteger {
                        entity: self.name.clone(),
                        field: key.name.clone(),
                    })
                } else if !key.auto_generated && !self.options.natural_key {
                    Err(ConfigurationError::PrimaryKeyNotGenerated {
                        entity: self.name.clone(),
                        field: key.name.clone(),
                    })
                } else {
                    Ok(())
                }
            }
            many => Err(ConfigurationError::MultiplePrimaryKeys {
                entity: self.name.clone(),
                fields: many.iter().map(|f| f.name.clone()).collect(),
            }),
        }
    }

    fn invalid_default(&self, field: &FieldDef, reason: &str) -> ConfigurationError {
        ConfigurationError::InvalidDefault {
            entity: self.name.clone(),
            field: field.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Lower-case snake form of a logical name: `ProductTag` -> `product_tag`.
pub fn derive_table_name(name: &str) -> String {
    let mut table = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.trim().chars() {
        if c.is_uppercase() {
            if prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                table.push('_');
            }
            table.extend(c.to_lowercase());
        } else if c == '-' || c == ' ' {
            table.push('_');
        } else {
            table.push(c);
        }
        prev = Some(c);
    }
    table
}
