//! Frozen schema and its versioned snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::entity::EntityDef;
use super::field::FieldDef;
use super::relation::{Accessor, DeleteBehavior, EntityId, FieldRef, RelationDef, RelationId};
use crate::error::{Error, ResolutionError};

/// A foreign key resolved against its target entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// The referencing field.
    pub source: FieldRef,
    /// The referenced entity (its primary key).
    pub target: EntityId,
    /// Relation realized by this key, if one was declared.
    pub relation: Option<RelationId>,
    /// What happens to the source row when the target row is deleted.
    pub on_delete: DeleteBehavior,
}

/// Immutable, fully resolved schema.
///
/// Produced once by [`SchemaBuilder::build`](super::SchemaBuilder::build) and
/// shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Schema {
    entities: Vec<EntityDef>,
    tables: Vec<String>,
    by_name: HashMap<String, EntityId>,
    relations: Vec<RelationDef>,
    accessors: Vec<Vec<Accessor>>,
    foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    pub(crate) fn from_parts(
        entities: Vec<EntityDef>,
        tables: Vec<String>,
        by_name: HashMap<String, EntityId>,
        relations: Vec<RelationDef>,
        accessors: Vec<Vec<Accessor>>,
        foreign_keys: Vec<ForeignKey>,
    ) -> Self {
        Self {
            entities,
            tables,
            by_name,
            relations,
            accessors,
            foreign_keys,
        }
    }

    /// Number of declared entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Resolve an entity name.
    pub fn entity_id(&self, name: &str) -> Result<EntityId, ResolutionError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ResolutionError::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// Get an entity definition by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.by_name.get(name).map(|id| &self.entities[id.0])
    }

    /// Get an entity definition by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued for this schema.
    pub fn entity(&self, id: EntityId) -> &EntityDef {
        &self.entities[id.0]
    }

    /// Storage table of an entity.
    pub fn table(&self, id: EntityId) -> &str {
        &self.tables[id.0]
    }

    /// All entity definitions with their ids.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &EntityDef)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(index, def)| (EntityId(index), def))
    }

    /// List all entity names in declaration order.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Field definition behind a resolved reference.
    pub fn field(&self, field: FieldRef) -> &FieldDef {
        &self.entities[field.entity.0].fields[field.field]
    }

    /// Primary key field of an entity.
    pub fn primary_key(&self, id: EntityId) -> &FieldDef {
        let entity = &self.entities[id.0];
        entity
            .fields
            .iter()
            .find(|f| f.primary_key)
            .unwrap_or_else(|| unreachable!("entity '{}' validated without primary key", entity.name))
    }

    /// All relations in declaration order.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Get a relation by id.
    pub fn relation(&self, id: RelationId) -> &RelationDef {
        &self.relations[id.0]
    }

    /// Accessors derived for an entity.
    pub fn accessors(&self, id: EntityId) -> &[Accessor] {
        &self.accessors[id.0]
    }

    /// Look up an accessor by name.
    pub fn accessor(&self, id: EntityId, name: &str) -> Result<&Accessor, ResolutionError> {
        self.accessors[id.0]
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| ResolutionError::UnknownAccessor {
                entity: self.entities[id.0].name.clone(),
                accessor: name.to_string(),
            })
    }

    /// Foreign keys declared on an entity.
    pub fn foreign_keys_of(&self, id: EntityId) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.source.entity == id)
    }

    /// Foreign keys that point at an entity.
    pub fn referencing(&self, id: EntityId) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.iter().filter(move |fk| fk.target == id)
    }

    /// Snapshot of the schema at a catalog version.
    pub fn bundle(&self, version: u64) -> SchemaBundle {
        SchemaBundle {
            version,
            created_at: crate::storage::key::current_timestamp(),
            fingerprint: self.fingerprint(),
            entities: self.entities.clone(),
            relations: self.relations.clone(),
        }
    }

    /// Stable content hash of the entity and relation declarations.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for entity in &self.entities {
            // Declarations only contain serde-friendly data; encoding cannot fail.
            if let Ok(bytes) = serde_json::to_vec(entity) {
                hasher.update(&bytes);
            }
        }
        for relation in &self.relations {
            if let Ok(bytes) = serde_json::to_vec(relation) {
                hasher.update(&bytes);
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Human-readable description: entities with their tables, fields and
    /// accessors, plus relations by name.
    pub fn describe(&self) -> serde_json::Value {
        let entities: Vec<serde_json::Value> = self
            .entities()
            .map(|(id, entity)| {
                let accessors: Vec<serde_json::Value> = self
                    .accessors(id)
                    .iter()
                    .map(|a| {
                        serde_json::json!({
                            "name": a.name,
                            "kind": a.kind,
                            "target": self.entity(a.target).name,
                            "relation": self.relation(a.relation).name,
                        })
                    })
                    .collect();
                serde_json::json!({
                    "name": entity.name,
                    "table": self.table(id),
                    "fields": entity.fields,
                    "accessors": accessors,
                })
            })
            .collect();
        let relations: Vec<serde_json::Value> = self
            .relations
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name,
                    "cardinality": r.cardinality(),
                    "on_delete": r.on_delete,
                })
            })
            .collect();

        serde_json::json!({
            "fingerprint": self.fingerprint(),
            "entities": entities,
            "relations": relations,
        })
    }
}

/// A versioned snapshot of the schema as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version (monotonically increasing).
    pub version: u64,
    /// Creation timestamp (microseconds since Unix epoch).
    pub created_at: u64,
    /// Content hash of the declarations.
    pub fingerprint: String,
    /// Entity definitions in declaration order.
    pub entities: Vec<EntityDef>,
    /// Relation definitions in declaration order.
    pub relations: Vec<RelationDef>,
}

impl SchemaBundle {
    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AccessorKind, FieldDef, ScalarType, SchemaBuilder};

    fn sample_schema() -> Schema {
        let mut builder = SchemaBuilder::new();
        let user = builder
            .define_entity(
                EntityDef::new("user")
                    .with_field(FieldDef::surrogate_key("id"))
                    .with_field(FieldDef::new("name", ScalarType::String)),
            )
            .unwrap();
        let post = builder
            .define_entity(
                EntityDef::new("post")
                    .with_field(FieldDef::surrogate_key("id"))
                    .with_field(FieldDef::new("title", ScalarType::String))
                    .with_field(FieldDef::new("author_id", ScalarType::Integer).references("user", "id")),
            )
            .unwrap();
        builder.declare_one_to_many(&user, &post, "author_id").unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_lookup() {
        let schema = sample_schema();

        assert_eq!(schema.entity_count(), 2);
        assert!(schema.get_entity("user").is_some());
        assert!(schema.get_entity("comment").is_none());
        assert!(matches!(
            schema.entity_id("comment"),
            Err(ResolutionError::UnknownEntity { .. })
        ));
        assert_eq!(schema.entity_names(), vec!["user", "post"]);
    }

    #[test]
    fn test_foreign_keys() {
        let schema = sample_schema();
        let user = schema.entity_id("user").unwrap();
        let post = schema.entity_id("post").unwrap();

        let referencing: Vec<_> = schema.referencing(user).collect();
        assert_eq!(referencing.len(), 1);
        assert_eq!(referencing[0].source.entity, post);
        assert_eq!(schema.field(referencing[0].source).name, "author_id");
        assert_eq!(referencing[0].on_delete, DeleteBehavior::Restrict);
        assert!(referencing[0].relation.is_some());

        assert_eq!(schema.foreign_keys_of(post).count(), 1);
        assert_eq!(schema.foreign_keys_of(user).count(), 0);
    }

    #[test]
    fn test_accessor_lookup() {
        let schema = sample_schema();
        let user = schema.entity_id("user").unwrap();

        assert_eq!(schema.accessor(user, "posts").unwrap().kind, AccessorKind::HasMany);
        assert!(matches!(
            schema.accessor(user, "comments"),
            Err(ResolutionError::UnknownAccessor { .. })
        ));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(sample_schema().fingerprint(), sample_schema().fingerprint());
    }

    #[test]
    fn test_bundle_bytes() {
        let bundle = sample_schema().bundle(3);
        let decoded = SchemaBundle::from_bytes(&bundle.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded, bundle);
        assert_eq!(decoded.entity_names(), vec!["user", "post"]);
    }

    #[test]
    fn test_describe_names_accessors() {
        let description = sample_schema().describe();
        let post = &description["entities"][1];

        assert_eq!(post["table"], "post");
        assert_eq!(post["accessors"][0]["name"], "user");
        assert_eq!(description["relations"][0]["name"], "user_posts");
    }
}
