//! Database handle binding a frozen schema to a storage engine.
//!
//! [`Database::bind`] is the only way to obtain a handle: it registers every
//! table with the storage engine and records the schema in the catalog once.
//! Afterwards the schema is shared read-only.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::catalog::{Accessor, AccessorKind, Catalog, EntityId, Schema};
use crate::constraint::{coerce, CascadeExecutor, CascadeResult, FieldValidator, ReferenceValidator};
use crate::error::{Error, ResolutionError, ValidationError};
use crate::query::{encode_entity, RelationLoader, Row};
use crate::storage::{Record, RowKey, StorageConfig, StorageEngine};
use crate::value::Value;

/// A bound database: storage, catalog and schema.
///
/// Reads take no lock. Writes are serialized so the referential checks of one
/// write cannot race the delete of another.
pub struct Database {
    storage: StorageEngine,
    catalog: Catalog,
    schema: Arc<Schema>,
    schema_version: u64,
    write_lock: Mutex<()>,
}

impl Database {
    /// Bind a schema to a storage engine.
    pub fn bind(storage: StorageEngine, schema: Schema) -> Result<Self, Error> {
        let catalog = Catalog::open(storage.db())?;

        let mut created = 0;
        for (id, _) in schema.entities() {
            if storage.register_table(schema.table(id))? {
                created += 1;
            }
        }
        let schema_version = catalog.apply_schema(&schema)?;

        info!(
            version = schema_version,
            entities = schema.entity_count(),
            relations = schema.relations().len(),
            new_tables = created,
            "schema bound"
        );

        Ok(Self {
            storage,
            catalog,
            schema: Arc::new(schema),
            schema_version,
            write_lock: Mutex::new(()),
        })
    }

    /// Open a storage engine and bind a schema to it.
    pub fn open(config: StorageConfig, schema: Schema) -> Result<Self, Error> {
        Self::bind(StorageEngine::open(config)?, schema)
    }

    /// The bound schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Catalog version describing the bound schema.
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    /// The catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The storage engine.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Insert a row and return it as stored.
    pub fn insert<I, K>(&self, entity: &str, values: I) -> Result<Row, Error>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entity_id = self.schema.entity_id(entity)?;
        let def = self.schema.entity(entity_id);
        let table = self.schema.table(entity_id);
        let mut fields = FieldValidator::new(def).prepare_insert(collect(values))?;

        let _guard = self.write_lock.lock();
        ReferenceValidator::new(&self.schema, &self.storage).validate_row(entity_id, &fields)?;

        let key = self.schema.primary_key(entity_id);
        let id = if key.auto_generated {
            self.storage.next_id(table)?
        } else {
            let id = fields
                .iter()
                .find(|(name, _)| *name == key.name)
                .and_then(|(_, value)| value.as_i64())
                .ok_or_else(|| ValidationError::MissingField {
                    entity: def.name.clone(),
                    field: key.name.clone(),
                })?;
            if self.storage.contains(table, id)? {
                return Err(ValidationError::DuplicateKey {
                    entity: def.name.clone(),
                    field: key.name.clone(),
                    value: id,
                }
                .into());
            }
            id
        };
        for (name, value) in fields.iter_mut() {
            if *name == key.name {
                *value = Value::Int(id);
            }
        }

        self.storage
            .put(&RowKey::new(table, id), &Record::new(encode_entity(&fields)?))?;
        debug!(entity, id, "row inserted");

        Ok(Row::new(id, fields))
    }

    /// Apply a partial update and return the row as stored.
    pub fn update<I, K>(&self, entity: &str, id: i64, changes: I) -> Result<Row, Error>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let entity_id = self.schema.entity_id(entity)?;
        let def = self.schema.entity(entity_id);
        let table = self.schema.table(entity_id);
        let changes = collect(changes);
        let changed: Vec<String> = changes.iter().map(|(name, _)| name.clone()).collect();

        let _guard = self.write_lock.lock();
        let record = self.storage.get(table, id)?.ok_or_else(|| not_found(entity, id))?;
        let current = crate::query::decode_row(id, &record)?;

        let fields = FieldValidator::new(def).prepare_update(&current, changes)?;
        ReferenceValidator::new(&self.schema, &self.storage)
            .validate_update(entity_id, &fields, &changed)?;

        self.storage
            .put(&RowKey::new(table, id), &record.revised(encode_entity(&fields)?))?;
        debug!(entity, id, fields = ?changed, "row updated");

        Ok(Row::new(id, fields))
    }

    /// Delete a row, applying the delete behavior of every association that
    /// references it.
    pub fn delete(&self, entity: &str, id: i64) -> Result<CascadeResult, Error> {
        let entity_id = self.schema.entity_id(entity)?;

        let _guard = self.write_lock.lock();
        if !self.storage.contains(self.schema.table(entity_id), id)? {
            return Err(not_found(entity, id));
        }

        let mut tx = self.storage.transaction();
        let result = CascadeExecutor::new(&self.schema, &self.storage)
            .process_delete(entity_id, id, &mut tx)?;
        tx.commit()?;

        info!(
            entity,
            id,
            deleted = result.deleted.len(),
            nullified = result.nullified.len(),
            "row deleted"
        );
        Ok(result)
    }

    /// Get a row by primary key.
    pub fn get(&self, entity: &str, id: i64) -> Result<Option<Row>, Error> {
        let entity_id = self.schema.entity_id(entity)?;
        self.loader().fetch(entity_id, id)
    }

    /// All rows of an entity in id order.
    pub fn all(&self, entity: &str) -> Result<Vec<Row>, Error> {
        let entity_id = self.schema.entity_id(entity)?;
        self.loader().scan(entity_id)
    }

    /// Rows whose field equals `value`.
    ///
    /// The value is coerced to the field type first, so `"3"` matches an
    /// integer 3. Null matches nothing.
    pub fn find_by(
        &self,
        entity: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Row>, Error> {
        let entity_id = self.schema.entity_id(entity)?;
        let def = self.schema.entity(entity_id);
        let field_def = def.get_field(field).ok_or_else(|| ResolutionError::UnknownField {
            entity: def.name.clone(),
            field: field.to_string(),
        })?;

        let value = value.into();
        let value = coerce(field_def.field_type, &value).unwrap_or(value);
        self.loader().find_by(entity_id, field, &value)
    }

    /// Number of rows of an entity.
    pub fn count(&self, entity: &str) -> Result<usize, Error> {
        let entity_id = self.schema.entity_id(entity)?;
        self.storage.count(self.schema.table(entity_id))
    }

    /// Rows reached from row `id` through a named accessor.
    pub fn related(&self, entity: &str, id: i64, accessor: &str) -> Result<Vec<Row>, Error> {
        let (entity_id, accessor) = self.resolve_accessor(entity, accessor, None)?;
        self.require_row(entity_id, entity, id)?;
        self.loader().load(entity_id, id, accessor)
    }

    /// Rows on the many side of a one-to-many accessor.
    pub fn has_many(&self, entity: &str, id: i64, accessor: &str) -> Result<Vec<Row>, Error> {
        let (entity_id, accessor) =
            self.resolve_accessor(entity, accessor, Some(AccessorKind::HasMany))?;
        self.require_row(entity_id, entity, id)?;
        self.loader()
            .has_many(self.schema.relation(accessor.relation), id)
    }

    /// The owner row of a belongs-to accessor, if the foreign key is set.
    pub fn belongs_to(&self, entity: &str, id: i64, accessor: &str) -> Result<Option<Row>, Error> {
        let (entity_id, accessor) =
            self.resolve_accessor(entity, accessor, Some(AccessorKind::BelongsTo))?;
        let row = self
            .loader()
            .fetch(entity_id, id)?
            .ok_or_else(|| not_found(entity, id))?;
        self.loader()
            .belongs_to(self.schema.relation(accessor.relation), &row)
    }

    /// Rows paired with row `id` through a many-to-many accessor.
    pub fn many_to_many(&self, entity: &str, id: i64, accessor: &str) -> Result<Vec<Row>, Error> {
        let (entity_id, accessor) =
            self.resolve_accessor(entity, accessor, Some(AccessorKind::BelongsToMany))?;
        self.require_row(entity_id, entity, id)?;
        self.loader()
            .many_to_many(self.schema.relation(accessor.relation), entity_id, id)
    }

    /// Follow an accessor for many rows, scanning the related or join table once.
    pub fn related_for_all(
        &self,
        entity: &str,
        rows: &[Row],
        accessor: &str,
    ) -> Result<HashMap<i64, Vec<Row>>, Error> {
        let (entity_id, accessor) = self.resolve_accessor(entity, accessor, None)?;
        self.loader().load_for_all(entity_id, rows, accessor)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.catalog.flush()?;
        self.storage.flush()
    }

    fn loader(&self) -> RelationLoader<'_> {
        RelationLoader::new(&self.storage, &self.schema)
    }

    fn resolve_accessor(
        &self,
        entity: &str,
        accessor: &str,
        kind: Option<AccessorKind>,
    ) -> Result<(EntityId, &Accessor), Error> {
        let entity_id = self.schema.entity_id(entity)?;
        let found = self.schema.accessor(entity_id, accessor)?;
        if kind.is_some_and(|k| k != found.kind) {
            return Err(ResolutionError::UnknownAccessor {
                entity: entity.to_string(),
                accessor: accessor.to_string(),
            }
            .into());
        }
        Ok((entity_id, found))
    }

    fn require_row(&self, entity_id: EntityId, entity: &str, id: i64) -> Result<(), Error> {
        if self.storage.contains(self.schema.table(entity_id), id)? {
            Ok(())
        } else {
            Err(not_found(entity, id))
        }
    }
}

fn collect<I, K>(values: I) -> Vec<(String, Value)>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    values
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect()
}

fn not_found(entity: &str, id: i64) -> Error {
    Error::NotFound {
        entity: entity.to_string(),
        id,
    }
}
