//! Cascade executor for handling referential integrity on deletes.
//!
//! This module implements the delete behaviors declared on associations:
//! - CASCADE: Delete referencing rows recursively
//! - RESTRICT: Refuse the delete while referencing rows exist
//! - SET NULL: Set the foreign key to null on referencing rows
//!
//! All writes are queued on a [`Transaction`] and become visible together on
//! commit.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::catalog::{DeleteBehavior, EntityId, ForeignKey, Schema};
use crate::error::{Error, ReferentialIntegrityError};
use crate::query::{decode_entity, encode_entity, get_field};
use crate::storage::{RowKey, StorageEngine, Transaction};
use crate::value::Value;

/// Maximum cascade depth to prevent runaway recursion.
pub const MAX_CASCADE_DEPTH: usize = 64;

/// Result of a cascade operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CascadeResult {
    /// Rows that were deleted (entity, id), the requested row first.
    pub deleted: Vec<(String, i64)>,
    /// Foreign keys that were set to null (entity, id, field).
    pub nullified: Vec<(String, i64, String)>,
}

impl CascadeResult {
    /// Create an empty cascade result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of affected rows.
    pub fn affected_count(&self) -> usize {
        self.deleted.len() + self.nullified.len()
    }

    /// Number of deleted rows of one entity.
    pub fn deleted_count(&self, entity: &str) -> usize {
        self.deleted.iter().filter(|(e, _)| e == entity).count()
    }
}

/// Executes delete behaviors for a row and everything that references it.
pub struct CascadeExecutor<'a> {
    schema: &'a Schema,
    engine: &'a StorageEngine,
}

impl<'a> CascadeExecutor<'a> {
    /// Create a new cascade executor.
    pub fn new(schema: &'a Schema, engine: &'a StorageEngine) -> Self {
        Self { schema, engine }
    }

    /// Queue the deletion of a row and apply the delete behaviors of every
    /// foreign key that references it.
    pub fn process_delete(
        &self,
        entity: EntityId,
        id: i64,
        tx: &mut Transaction<'_>,
    ) -> Result<CascadeResult, Error> {
        let mut result = CascadeResult::new();
        let mut visited = HashSet::new();

        self.delete_recursive(entity, id, tx, &mut result, &mut visited, 0)?;

        // The requested row is queued last; report it first.
        result.deleted.rotate_right(1);
        Ok(result)
    }

    fn delete_recursive(
        &self,
        entity: EntityId,
        id: i64,
        tx: &mut Transaction<'_>,
        result: &mut CascadeResult,
        visited: &mut HashSet<(EntityId, i64)>,
        depth: usize,
    ) -> Result<(), Error> {
        if depth > MAX_CASCADE_DEPTH {
            return Err(ReferentialIntegrityError::MaxDepthExceeded { depth }.into());
        }

        // Prevent cycles
        if !visited.insert((entity, id)) {
            return Ok(());
        }

        let referencing: Vec<ForeignKey> = self.schema.referencing(entity).copied().collect();
        for fk in &referencing {
            let referencing_ids = self.find_referencing(fk, id, tx)?;
            if referencing_ids.is_empty() {
                continue;
            }

            let source = fk.source.entity;
            let source_name = &self.schema.entity(source).name;
            match fk.on_delete {
                DeleteBehavior::Restrict => {
                    return Err(ReferentialIntegrityError::RestrictViolation {
                        entity: self.schema.entity(entity).name.clone(),
                        id,
                        referencing_entity: source_name.clone(),
                        count: referencing_ids.len(),
                    }
                    .into());
                }
                DeleteBehavior::Cascade => {
                    for ref_id in referencing_ids {
                        self.delete_recursive(source, ref_id, tx, result, visited, depth + 1)?;
                    }
                }
                DeleteBehavior::SetNull => {
                    let field = &self.schema.field(fk.source).name;
                    for ref_id in referencing_ids {
                        self.set_field_null(tx, source, ref_id, field)?;
                        result.nullified.push((source_name.clone(), ref_id, field.clone()));
                    }
                    warn!(
                        entity = %source_name,
                        field = %field,
                        target = %self.schema.entity(entity).name,
                        target_id = id,
                        "foreign keys set to null"
                    );
                }
            }
        }

        tx.delete(RowKey::new(self.schema.table(entity), id));
        debug!(entity = %self.schema.entity(entity).name, id, depth, "row deleted");
        result
            .deleted
            .push((self.schema.entity(entity).name.clone(), id));
        Ok(())
    }

    /// Ids of rows whose foreign key currently holds `target_id`, including
    /// writes already queued on the transaction.
    fn find_referencing(
        &self,
        fk: &ForeignKey,
        target_id: i64,
        tx: &Transaction<'_>,
    ) -> Result<Vec<i64>, Error> {
        let table = self.schema.table(fk.source.entity);
        let field = &self.schema.field(fk.source).name;
        let wanted = Value::Int(target_id);

        let mut referencing = Vec::new();
        for scan_result in self.engine.scan_table(table) {
            let (id, _) = scan_result?;
            let Some(record) = tx.get(table, id)? else {
                continue;
            };
            if get_field(&record.data, field)?.as_ref() == Some(&wanted) {
                referencing.push(id);
            }
        }
        Ok(referencing)
    }

    /// Queue a rewrite of a row with one field set to null.
    fn set_field_null(
        &self,
        tx: &mut Transaction<'_>,
        entity: EntityId,
        id: i64,
        field: &str,
    ) -> Result<(), Error> {
        let table = self.schema.table(entity);
        let Some(record) = tx.get(table, id)? else {
            return Ok(());
        };

        let mut fields = decode_entity(&record.data)?;
        for (name, value) in fields.iter_mut() {
            if name == field {
                *value = Value::Null;
            }
        }
        let data = encode_entity(&fields)?;
        tx.put(RowKey::new(table, id), record.revised(data));
        Ok(())
    }
}
