//! Relation resolution over stored rows.
//!
//! Loads go through the resolved relation metadata in the [`Schema`]: a
//! one-to-many is answered by matching the foreign key on the many side, a
//! many-to-many by collecting the far keys of matching join rows. Results are
//! returned in id order and never contain duplicates. A null foreign key
//! matches nothing.

use std::collections::{BTreeSet, HashMap};

use crate::catalog::{Accessor, AccessorKind, EntityId, RelationDef, RelationKind, Schema};
use crate::error::Error;
use crate::storage::{Record, StorageEngine};
use crate::value::Value;

use super::row::Row;
use super::value_codec::{decode_entity, get_field};

/// Loads rows and their related rows.
pub struct RelationLoader<'a> {
    storage: &'a StorageEngine,
    schema: &'a Schema,
}

impl<'a> RelationLoader<'a> {
    /// Create a loader over a storage engine and the schema bound to it.
    pub fn new(storage: &'a StorageEngine, schema: &'a Schema) -> Self {
        Self { storage, schema }
    }

    /// Fetch one row by primary key.
    pub fn fetch(&self, entity: EntityId, id: i64) -> Result<Option<Row>, Error> {
        match self.storage.get(self.schema.table(entity), id)? {
            Some(record) => Ok(Some(decode_row(id, &record)?)),
            None => Ok(None),
        }
    }

    /// All rows of an entity in id order.
    pub fn scan(&self, entity: EntityId) -> Result<Vec<Row>, Error> {
        self.storage
            .scan_table(self.schema.table(entity))
            .map(|result| {
                let (id, record) = result?;
                decode_row(id, &record)
            })
            .collect()
    }

    /// Rows whose field equals `value`.
    pub fn find_by(&self, entity: EntityId, field: &str, value: &Value) -> Result<Vec<Row>, Error> {
        if value.is_null() {
            return Ok(Vec::new());
        }
        let mut rows = Vec::new();
        for result in self.storage.scan_table(self.schema.table(entity)) {
            let (id, record) = result?;
            if get_field(&record.data, field)?.as_ref() == Some(value) {
                rows.push(decode_row(id, &record)?);
            }
        }
        Ok(rows)
    }

    /// Follow an accessor from the row `id` of `entity`.
    pub fn load(&self, entity: EntityId, id: i64, accessor: &Accessor) -> Result<Vec<Row>, Error> {
        let relation = self.schema.relation(accessor.relation);
        match accessor.kind {
            AccessorKind::HasMany => self.has_many(relation, id),
            AccessorKind::BelongsTo => {
                let Some(row) = self.fetch(entity, id)? else {
                    return Ok(Vec::new());
                };
                Ok(self.belongs_to(relation, &row)?.into_iter().collect())
            }
            AccessorKind::BelongsToMany => self.many_to_many(relation, entity, id),
        }
    }

    /// Rows on the many side referencing `owner_id`.
    pub fn has_many(&self, relation: &RelationDef, owner_id: i64) -> Result<Vec<Row>, Error> {
        let RelationKind::OneToMany { many, foreign_key, .. } = relation.kind else {
            return Err(not_one_to_many(relation));
        };
        let fk_name = &self.schema.field(foreign_key).name;
        self.find_by(many, fk_name, &Value::Int(owner_id))
    }

    /// The owner row referenced by a many-side row, if its key is set.
    pub fn belongs_to(&self, relation: &RelationDef, row: &Row) -> Result<Option<Row>, Error> {
        let RelationKind::OneToMany { owner, foreign_key, .. } = relation.kind else {
            return Err(not_one_to_many(relation));
        };
        match row.get_i64(&self.schema.field(foreign_key).name) {
            Some(owner_id) => self.fetch(owner, owner_id),
            None => Ok(None),
        }
    }

    /// Rows on the other side of a many-to-many, starting from `from`.
    pub fn many_to_many(
        &self,
        relation: &RelationDef,
        from: EntityId,
        id: i64,
    ) -> Result<Vec<Row>, Error> {
        let far_ids = self.paired_ids(relation, from, id)?;
        let target = self.far_side(relation, from)?;

        let mut rows = Vec::with_capacity(far_ids.len());
        for far_id in far_ids {
            // Join rows may point at rows removed outside a cascade.
            if let Some(row) = self.fetch(target, far_id)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Follow an accessor for many rows at once.
    ///
    /// Scans the related table (or the join table) once and groups the
    /// matches by source id. Belongs-to fetches each owner by key.
    pub fn load_for_all(
        &self,
        entity: EntityId,
        rows: &[Row],
        accessor: &Accessor,
    ) -> Result<HashMap<i64, Vec<Row>>, Error> {
        let relation = self.schema.relation(accessor.relation);
        let mut grouped: HashMap<i64, Vec<Row>> = rows.iter().map(|r| (r.id, Vec::new())).collect();

        match (accessor.kind, &relation.kind) {
            (AccessorKind::HasMany, RelationKind::OneToMany { many, foreign_key, .. }) => {
                let fk_name = &self.schema.field(*foreign_key).name;
                for row in self.scan(*many)? {
                    if let Some(bucket) = row.get_i64(fk_name).and_then(|fk| grouped.get_mut(&fk)) {
                        bucket.push(row);
                    }
                }
            }
            (AccessorKind::BelongsTo, RelationKind::OneToMany { .. }) => {
                for row in rows {
                    if let Some(owner) = self.belongs_to(relation, row)? {
                        grouped.entry(row.id).or_default().push(owner);
                    }
                }
            }
            _ => {
                let target = self.far_side(relation, entity)?;
                let pairs = self.join_pairs(relation, entity, |near| grouped.contains_key(&near))?;
                let mut cache: HashMap<i64, Option<Row>> = HashMap::new();
                for (near_id, far_ids) in pairs {
                    for far_id in far_ids {
                        let related = match cache.get(&far_id) {
                            Some(hit) => hit.clone(),
                            None => {
                                let fetched = self.fetch(target, far_id)?;
                                cache.insert(far_id, fetched.clone());
                                fetched
                            }
                        };
                        if let Some(related) = related {
                            grouped.entry(near_id).or_default().push(related);
                        }
                    }
                }
            }
        }

        Ok(grouped)
    }

    /// Distinct far-side ids paired with `id` through the join entity.
    fn paired_ids(
        &self,
        relation: &RelationDef,
        from: EntityId,
        id: i64,
    ) -> Result<BTreeSet<i64>, Error> {
        let mut pairs = self.join_pairs(relation, from, |near| near == id)?;
        Ok(pairs.remove(&id).unwrap_or_default())
    }

    /// One pass over the join table, grouping far-side ids by the near-side
    /// id of every join row accepted by `wanted`.
    fn join_pairs(
        &self,
        relation: &RelationDef,
        from: EntityId,
        wanted: impl Fn(i64) -> bool,
    ) -> Result<HashMap<i64, BTreeSet<i64>>, Error> {
        let RelationKind::ManyToMany {
            left,
            through,
            left_key,
            right_key,
            ..
        } = relation.kind
        else {
            return Err(Error::InvalidData(format!(
                "relation '{}' is not many-to-many",
                relation.name
            )));
        };
        let (near, far) = if from == left {
            (left_key, right_key)
        } else {
            (right_key, left_key)
        };
        let near_name = &self.schema.field(near).name;
        let far_name = &self.schema.field(far).name;

        let mut pairs: HashMap<i64, BTreeSet<i64>> = HashMap::new();
        for result in self.storage.scan_table(self.schema.table(through)) {
            let (_, record) = result?;
            let Some(near_id) = get_field(&record.data, near_name)?.and_then(|v| v.as_i64()) else {
                continue;
            };
            if !wanted(near_id) {
                continue;
            }
            if let Some(far_id) = get_field(&record.data, far_name)?.and_then(|v| v.as_i64()) {
                pairs.entry(near_id).or_default().insert(far_id);
            }
        }
        Ok(pairs)
    }

    fn far_side(&self, relation: &RelationDef, from: EntityId) -> Result<EntityId, Error> {
        match relation.kind {
            RelationKind::ManyToMany { left, right, .. } if from == left => Ok(right),
            RelationKind::ManyToMany { left, right, .. } if from == right => Ok(left),
            _ => Err(Error::InvalidData(format!(
                "entity '{}' is not an endpoint of '{}'",
                self.schema.entity(from).name,
                relation.name
            ))),
        }
    }
}

/// Decode a stored record into a row.
pub(crate) fn decode_row(id: i64, record: &Record) -> Result<Row, Error> {
    Ok(Row::new(id, decode_entity(&record.data)?))
}

fn not_one_to_many(relation: &RelationDef) -> Error {
    Error::InvalidData(format!("relation '{}' is not one-to-many", relation.name))
}
