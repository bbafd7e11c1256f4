//! Schema registration: entity declarations and the association registry.
//!
//! A [`SchemaBuilder`] is filled once at process start and consumed by
//! [`SchemaBuilder::build`], which performs the remaining cross-entity checks
//! and returns an immutable [`Schema`]. Any error aborts the build; no partial
//! schema is ever returned.

use std::collections::HashMap;

use tracing::{debug, info};

use super::entity::EntityDef;
use super::relation::{
    pluralize, Accessor, AccessorKind, DeleteBehavior, EntityId, FieldRef, RelationDef,
    RelationId, RelationKind,
};
use super::schema::{ForeignKey, Schema};
use crate::error::{ConfigurationError, Error, ResolutionError};

/// Typed handle to a declared entity.
///
/// Handles are only meaningful for the builder (and schema) that issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    id: EntityId,
    name: String,
    table: String,
}

impl EntityHandle {
    /// Position of the entity in the schema.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Logical entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage table name.
    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Collects entity and relation declarations before the schema is frozen.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityDef>,
    tables: Vec<String>,
    by_name: HashMap<String, EntityId>,
    relations: Vec<RelationDef>,
    accessors: Vec<Vec<Accessor>>,
    key_owners: HashMap<FieldRef, RelationId>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity.
    ///
    /// Declaring the same name again with an identical definition returns the
    /// existing handle. A different definition under a bound name is a
    /// [`ConfigurationError::ConflictingRedefinition`].
    pub fn define_entity(&mut self, def: EntityDef) -> Result<EntityHandle, Error> {
        def.validate()?;

        if let Some(&id) = self.by_name.get(&def.name) {
            if self.entities[id.0] == def {
                debug!(entity = %def.name, "entity already defined, reusing handle");
                return Ok(self.handle_for(id));
            }
            return Err(ConfigurationError::ConflictingRedefinition { entity: def.name }.into());
        }

        let table = def.table_name();
        if let Some(pos) = self.tables.iter().position(|t| *t == table) {
            return Err(ConfigurationError::DuplicateTable {
                table,
                existing: self.entities[pos].name.clone(),
                entity: def.name,
            }
            .into());
        }

        let id = EntityId(self.entities.len());
        debug!(entity = %def.name, table = %table, fields = def.fields.len(), "entity defined");
        self.by_name.insert(def.name.clone(), id);
        self.tables.push(table);
        self.entities.push(def);
        self.accessors.push(Vec::new());

        Ok(self.handle_for(id))
    }

    /// Look up a declared entity by logical name.
    pub fn entity(&self, name: &str) -> Result<EntityHandle, Error> {
        let id = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| ResolutionError::UnknownEntity {
                name: name.to_string(),
            })?;
        Ok(self.handle_for(id))
    }

    /// Declare `owner` has many `many` through `many.foreign_key`, refusing
    /// deletes of `owner` rows while references exist.
    pub fn declare_one_to_many(
        &mut self,
        owner: &EntityHandle,
        many: &EntityHandle,
        foreign_key: &str,
    ) -> Result<RelationId, Error> {
        self.declare_one_to_many_with(owner, many, foreign_key, DeleteBehavior::Restrict)
    }

    /// Declare a one-to-many relation with an explicit delete behavior.
    pub fn declare_one_to_many_with(
        &mut self,
        owner: &EntityHandle,
        many: &EntityHandle,
        foreign_key: &str,
        on_delete: DeleteBehavior,
    ) -> Result<RelationId, Error> {
        self.one_to_many(owner, many, foreign_key, on_delete, false)
    }

    /// Declare that `many` belongs to `owner` through `many.foreign_key`.
    ///
    /// This is the inverse side of a one-to-many. When the matching
    /// one-to-many is already declared the existing relation is returned.
    pub fn declare_belongs_to(
        &mut self,
        many: &EntityHandle,
        owner: &EntityHandle,
        foreign_key: &str,
    ) -> Result<RelationId, Error> {
        self.one_to_many(owner, many, foreign_key, DeleteBehavior::Restrict, true)
    }

    /// Declare a symmetric many-to-many relation realized by `through`; join
    /// rows are deleted with either endpoint.
    ///
    /// Declaring the same pair again, from either side, returns the existing
    /// relation.
    pub fn declare_many_to_many(
        &mut self,
        left: &EntityHandle,
        right: &EntityHandle,
        through: &EntityHandle,
        left_key: &str,
        right_key: &str,
    ) -> Result<RelationId, Error> {
        self.declare_many_to_many_with(
            left,
            right,
            through,
            left_key,
            right_key,
            DeleteBehavior::Cascade,
        )
    }

    /// Declare a many-to-many relation with an explicit delete behavior for
    /// join rows.
    pub fn declare_many_to_many_with(
        &mut self,
        left: &EntityHandle,
        right: &EntityHandle,
        through: &EntityHandle,
        left_key: &str,
        right_key: &str,
        on_delete: DeleteBehavior,
    ) -> Result<RelationId, Error> {
        let left_id = self.resolve(left)?;
        let right_id = self.resolve(right)?;
        let through_id = self.resolve(through)?;

        let left_ref = self.resolve_field(through_id, left_key)?;
        let right_ref = self.resolve_field(through_id, right_key)?;
        if left_ref == right_ref {
            return Err(ConfigurationError::SameJoinKeys {
                entity: through.name.clone(),
                field: left_key.to_string(),
            }
            .into());
        }

        self.check_key_target(left_ref, left_id)?;
        self.check_key_target(right_ref, right_id)?;
        if let Some(existing) =
            self.matching_many_to_many(through_id, left_ref, right_ref, on_delete)
        {
            debug!(
                relation = %self.relations[existing.0].name,
                "many-to-many already declared, reusing relation"
            );
            return Ok(existing);
        }
        self.check_key_unused(left_ref)?;
        self.check_key_unused(right_ref)?;
        self.check_set_null(left_ref, on_delete)?;
        self.check_set_null(right_ref, on_delete)?;

        let relation = RelationId(self.relations.len());
        let left_accessor = Accessor {
            name: pluralize(&right.name),
            kind: AccessorKind::BelongsToMany,
            target: right_id,
            relation,
        };
        let right_accessor = Accessor {
            name: pluralize(&left.name),
            kind: AccessorKind::BelongsToMany,
            target: left_id,
            relation,
        };
        self.check_accessor_free(left_id, &left_accessor.name)?;
        self.check_accessor_free(right_id, &right_accessor.name)?;
        if left_id == right_id && left_accessor.name == right_accessor.name {
            return Err(ConfigurationError::AccessorClash {
                entity: left.name.clone(),
                accessor: left_accessor.name,
            }
            .into());
        }

        let name = format!("{}_{}", left.name, pluralize(&right.name));
        debug!(
            relation = %name,
            through = %through.name,
            left_key,
            right_key,
            "many-to-many declared"
        );
        self.accessors[left_id.0].push(left_accessor);
        self.accessors[right_id.0].push(right_accessor);
        self.key_owners.insert(left_ref, relation);
        self.key_owners.insert(right_ref, relation);
        self.relations.push(RelationDef {
            name,
            kind: RelationKind::ManyToMany {
                left: left_id,
                right: right_id,
                through: through_id,
                left_key: left_ref,
                right_key: right_ref,
            },
            on_delete,
        });

        Ok(relation)
    }

    /// Resolve every field reference and freeze the schema.
    pub fn build(self) -> Result<Schema, Error> {
        let mut foreign_keys = Vec::new();

        for (index, entity) in self.entities.iter().enumerate() {
            for (field_index, field) in entity.fields.iter().enumerate() {
                let Some(reference) = &field.references else {
                    continue;
                };
                let unknown = || ResolutionError::UnknownReference {
                    entity: entity.name.clone(),
                    field: field.name.clone(),
                    target_entity: reference.entity.clone(),
                    target_field: reference.field.clone(),
                };

                let target = *self.by_name.get(&reference.entity).ok_or_else(unknown)?;
                let target_def = &self.entities[target.0];
                let target_field = target_def.get_field(&reference.field).ok_or_else(unknown)?;

                if !target_field.primary_key || target_field.field_type != field.field_type {
                    let expected = target_def
                        .primary_key()
                        .map(|pk| format!("{}.{}", target_def.name, pk.name))
                        .unwrap_or_default();
                    return Err(ConfigurationError::ForeignKeyTargetMismatch {
                        entity: entity.name.clone(),
                        field: field.name.clone(),
                        expected,
                        actual: Some(format!("{}.{}", reference.entity, reference.field)),
                    }
                    .into());
                }

                let source = FieldRef {
                    entity: EntityId(index),
                    field: field_index,
                };
                let relation = self.key_owners.get(&source).copied();
                let on_delete = relation
                    .map(|r| self.relations[r.0].on_delete)
                    .unwrap_or(DeleteBehavior::Restrict);

                foreign_keys.push(ForeignKey {
                    source,
                    target,
                    relation,
                    on_delete,
                });
            }
        }

        info!(
            entities = self.entities.len(),
            relations = self.relations.len(),
            foreign_keys = foreign_keys.len(),
            "schema built"
        );

        Ok(Schema::from_parts(
            self.entities,
            self.tables,
            self.by_name,
            self.relations,
            self.accessors,
            foreign_keys,
        ))
    }

    fn one_to_many(
        &mut self,
        owner: &EntityHandle,
        many: &EntityHandle,
        foreign_key: &str,
        on_delete: DeleteBehavior,
        accept_existing: bool,
    ) -> Result<RelationId, Error> {
        let owner_id = self.resolve(owner)?;
        let many_id = self.resolve(many)?;
        let key = self.resolve_field(many_id, foreign_key)?;
        self.check_key_target(key, owner_id)?;

        if let Some(&existing) = self.key_owners.get(&key) {
            let relation = &self.relations[existing.0];
            let same_pair = matches!(
                relation.kind,
                RelationKind::OneToMany { owner: o, many: m, .. } if o == owner_id && m == many_id
            );
            if accept_existing && same_pair {
                return Ok(existing);
            }
            return Err(ConfigurationError::ForeignKeyReused {
                entity: many.name.clone(),
                field: foreign_key.to_string(),
                relation: relation.name.clone(),
            }
            .into());
        }
        self.check_set_null(key, on_delete)?;

        let relation = RelationId(self.relations.len());
        let has_many = Accessor {
            name: pluralize(&many.name),
            kind: AccessorKind::HasMany,
            target: many_id,
            relation,
        };
        let belongs_to = Accessor {
            name: owner.name.clone(),
            kind: AccessorKind::BelongsTo,
            target: owner_id,
            relation,
        };
        self.check_accessor_free(owner_id, &has_many.name)?;
        self.check_accessor_free(many_id, &belongs_to.name)?;

        let name = format!("{}_{}", owner.name, pluralize(&many.name));
        debug!(relation = %name, foreign_key, ?on_delete, "one-to-many declared");
        self.accessors[owner_id.0].push(has_many);
        self.accessors[many_id.0].push(belongs_to);
        self.key_owners.insert(key, relation);
        self.relations.push(RelationDef {
            name,
            kind: RelationKind::OneToMany {
                owner: owner_id,
                many: many_id,
                foreign_key: key,
            },
            on_delete,
        });

        Ok(relation)
    }

    /// A many-to-many over the same join keys, declared from either side.
    fn matching_many_to_many(
        &self,
        through: EntityId,
        left_key: FieldRef,
        right_key: FieldRef,
        on_delete: DeleteBehavior,
    ) -> Option<RelationId> {
        let existing = *self.key_owners.get(&left_key)?;
        let relation = &self.relations[existing.0];
        let RelationKind::ManyToMany {
            through: t,
            left_key: l,
            right_key: r,
            ..
        } = relation.kind
        else {
            return None;
        };
        let same_keys = (l == left_key && r == right_key) || (l == right_key && r == left_key);
        (t == through && same_keys && relation.on_delete == on_delete).then_some(existing)
    }

    fn handle_for(&self, id: EntityId) -> EntityHandle {
        EntityHandle {
            id,
            name: self.entities[id.0].name.clone(),
            table: self.tables[id.0].clone(),
        }
    }

    fn resolve(&self, handle: &EntityHandle) -> Result<EntityId, ResolutionError> {
        match self.entities.get(handle.id.0) {
            Some(def) if def.name == handle.name => Ok(handle.id),
            _ => Err(ResolutionError::UnknownEntity {
                name: handle.name.clone(),
            }),
        }
    }

    fn resolve_field(&self, entity: EntityId, field: &str) -> Result<FieldRef, ResolutionError> {
        let def = &self.entities[entity.0];
        def.field_index(field)
            .map(|index| FieldRef {
                entity,
                field: index,
            })
            .ok_or_else(|| ResolutionError::UnknownField {
                entity: def.name.clone(),
                field: field.to_string(),
            })
    }

    /// The key must be declared as referencing `target`'s primary key.
    fn check_key_target(&self, key: FieldRef, target: EntityId) -> Result<(), ConfigurationError> {
        let holder = &self.entities[key.entity.0];
        let field = &holder.fields[key.field];
        let target_def = &self.entities[target.0];
        let Some(pk) = target_def.primary_key() else {
            return Err(ConfigurationError::MissingPrimaryKey {
                entity: target_def.name.clone(),
            });
        };

        let matches = field
            .references
            .as_ref()
            .is_some_and(|r| r.entity == target_def.name && r.field == pk.name);
        if matches {
            Ok(())
        } else {
            Err(ConfigurationError::ForeignKeyTargetMismatch {
                entity: holder.name.clone(),
                field: field.name.clone(),
                expected: format!("{}.{}", target_def.name, pk.name),
                actual: field
                    .references
                    .as_ref()
                    .map(|r| format!("{}.{}", r.entity, r.field)),
            })
        }
    }

    fn check_key_unused(&self, key: FieldRef) -> Result<(), ConfigurationError> {
        match self.key_owners.get(&key) {
            Some(existing) => {
                let holder = &self.entities[key.entity.0];
                Err(ConfigurationError::ForeignKeyReused {
                    entity: holder.name.clone(),
                    field: holder.fields[key.field].name.clone(),
                    relation: self.relations[existing.0].name.clone(),
                })
            }
            None => Ok(()),
        }
    }

    fn check_set_null(
        &self,
        key: FieldRef,
        on_delete: DeleteBehavior,
    ) -> Result<(), ConfigurationError> {
        let holder = &self.entities[key.entity.0];
        let field = &holder.fields[key.field];
        if on_delete == DeleteBehavior::SetNull && field.required {
            return Err(ConfigurationError::SetNullOnRequired {
                entity: holder.name.clone(),
                field: field.name.clone(),
            });
        }
        Ok(())
    }

    fn check_accessor_free(&self, entity: EntityId, name: &str) -> Result<(), ConfigurationError> {
        let taken = self.accessors[entity.0].iter().any(|a| a.name == name)
            || self.entities[entity.0].get_field(name).is_some();
        if taken {
            return Err(ConfigurationError::AccessorClash {
                entity: self.entities[entity.0].name.clone(),
                accessor: name.to_string(),
            });
        }
        Ok(())
    }
}
