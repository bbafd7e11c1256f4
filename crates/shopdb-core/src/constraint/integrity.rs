//! Foreign key existence checks.

use crate::catalog::{EntityId, Schema};
use crate::error::{Error, ReferentialIntegrityError};
use crate::storage::StorageEngine;
use crate::value::Value;

/// Checks that every non-null foreign key of a row points at a stored row.
pub struct ReferenceValidator<'a> {
    schema: &'a Schema,
    engine: &'a StorageEngine,
}

impl<'a> ReferenceValidator<'a> {
    /// Create a new reference validator.
    pub fn new(schema: &'a Schema, engine: &'a StorageEngine) -> Self {
        Self { schema, engine }
    }

    /// Validate all foreign keys of a prepared row.
    pub fn validate_row(&self, entity: EntityId, row: &[(String, Value)]) -> Result<(), Error> {
        self.validate_changed(entity, row, |_| true)
    }

    /// Validate the foreign keys named in `changed`.
    ///
    /// Unchanged keys were checked when written; a referenced row deleted
    /// since then was handled by its delete behavior.
    pub fn validate_update(
        &self,
        entity: EntityId,
        row: &[(String, Value)],
        changed: &[String],
    ) -> Result<(), Error> {
        self.validate_changed(entity, row, |name| changed.iter().any(|c| c == name))
    }

    fn validate_changed(
        &self,
        entity: EntityId,
        row: &[(String, Value)],
        include: impl Fn(&str) -> bool,
    ) -> Result<(), Error> {
        for fk in self.schema.foreign_keys_of(entity) {
            let field = self.schema.field(fk.source);
            if !include(&field.name) {
                continue;
            }
            let value = row
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, value)| value);

            let target_id = match value {
                None | Some(Value::Null) => continue,
                Some(Value::Int(id)) => *id,
                Some(other) => {
                    return Err(Error::InvalidData(format!(
                        "foreign key '{}.{}' holds a {} value",
                        self.schema.entity(entity).name,
                        field.name,
                        other.type_name()
                    )))
                }
            };

            if !self.engine.contains(self.schema.table(fk.target), target_id)? {
                return Err(ReferentialIntegrityError::MissingTarget {
                    entity: self.schema.entity(entity).name.clone(),
                    field: field.name.clone(),
                    target_entity: self.schema.entity(fk.target).name.clone(),
                    value: target_id,
                }
                .into());
            }
        }
        Ok(())
    }
}
