//! Relation definitions between entities.
//!
//! Relations are resolved at registration time: every endpoint is stored as a
//! typed [`EntityId`] or [`FieldRef`] into the schema rather than as a name to
//! be looked up again at query time.

use serde::{Deserialize, Serialize};

/// Position of an entity within a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub usize);

/// Position of a relation within a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationId(pub usize);

/// A resolved reference to one field of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    /// Entity holding the field.
    pub entity: EntityId,
    /// Field position in the entity's declaration.
    pub field: usize,
}

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// One-to-many relation (foreign key on many side).
    OneToMany,
    /// Many-to-many relation (requires a join entity).
    ManyToMany,
}

/// Behavior when a referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Delete referencing rows.
    Cascade,
    /// Refuse the delete while referencing rows exist.
    Restrict,
    /// Set the foreign key to null.
    SetNull,
}

/// Shape of a resolved relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// `owner` has many `many`; `many.foreign_key` references `owner`'s key.
    OneToMany {
        /// Entity on the "one" side.
        owner: EntityId,
        /// Entity on the "many" side.
        many: EntityId,
        /// Foreign key on `many`.
        foreign_key: FieldRef,
    },
    /// `left` and `right` relate through rows of `through`.
    ManyToMany {
        /// First endpoint.
        left: EntityId,
        /// Second endpoint.
        right: EntityId,
        /// Join entity.
        through: EntityId,
        /// Key on `through` referencing `left`.
        left_key: FieldRef,
        /// Key on `through` referencing `right`.
        right_key: FieldRef,
    },
}

/// A relation definition between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name (unique within schema).
    pub name: String,
    /// Resolved endpoints.
    pub kind: RelationKind,
    /// Delete behavior for rows holding the relation's foreign keys.
    pub on_delete: DeleteBehavior,
}

impl RelationDef {
    /// Relation cardinality.
    pub fn cardinality(&self) -> Cardinality {
        match self.kind {
            RelationKind::OneToMany { .. } => Cardinality::OneToMany,
            RelationKind::ManyToMany { .. } => Cardinality::ManyToMany,
        }
    }

    /// Check if this is a many-to-many relation.
    pub fn is_many_to_many(&self) -> bool {
        self.cardinality() == Cardinality::ManyToMany
    }

    /// Foreign keys that realize this relation.
    pub fn foreign_keys(&self) -> Vec<FieldRef> {
        match self.kind {
            RelationKind::OneToMany { foreign_key, .. } => vec![foreign_key],
            RelationKind::ManyToMany {
                left_key, right_key, ..
            } => vec![left_key, right_key],
        }
    }

    /// Check whether an entity takes part in this relation.
    pub fn involves(&self, entity: EntityId) -> bool {
        match self.kind {
            RelationKind::OneToMany { owner, many, .. } => owner == entity || many == entity,
            RelationKind::ManyToMany {
                left,
                right,
                through,
                ..
            } => left == entity || right == entity || through == entity,
        }
    }
}

/// Kind of derived navigation an entity gains from a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessorKind {
    /// Rows of the target whose foreign key points here.
    HasMany,
    /// The single target row this row's foreign key points to.
    BelongsTo,
    /// Target rows paired with this row through a join entity.
    BelongsToMany,
}

/// A named navigation from one entity to related rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessor {
    /// Accessor name (`products`, `category`, `tags`).
    pub name: String,
    /// Navigation kind.
    pub kind: AccessorKind,
    /// Entity whose rows the accessor yields.
    pub target: EntityId,
    /// Relation the accessor resolves through.
    pub relation: RelationId,
}

/// Plural accessor name for a logical entity name.
pub fn pluralize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    if name.ends_with(['s', 'x', 'z']) || name.ends_with("ch") || name.ends_with("sh") {
        return format!("{name}es");
    }
    format!("{name}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_to_many() -> RelationDef {
        RelationDef {
            name: "category_products".into(),
            kind: RelationKind::OneToMany {
                owner: EntityId(0),
                many: EntityId(1),
                foreign_key: FieldRef {
                    entity: EntityId(1),
                    field: 4,
                },
            },
            on_delete: DeleteBehavior::SetNull,
        }
    }

    #[test]
    fn test_one_to_many_relation() {
        let rel = one_to_many();

        assert_eq!(rel.cardinality(), Cardinality::OneToMany);
        assert!(!rel.is_many_to_many());
        assert_eq!(rel.foreign_keys().len(), 1);
        assert!(rel.involves(EntityId(0)));
        assert!(!rel.involves(EntityId(2)));
    }

    #[test]
    fn test_many_to_many_relation() {
        let rel = RelationDef {
            name: "product_tags".into(),
            kind: RelationKind::ManyToMany {
                left: EntityId(1),
                right: EntityId(2),
                through: EntityId(3),
                left_key: FieldRef {
                    entity: EntityId(3),
                    field: 1,
                },
                right_key: FieldRef {
                    entity: EntityId(3),
                    field: 2,
                },
            },
            on_delete: DeleteBehavior::Cascade,
        };

        assert!(rel.is_many_to_many());
        assert_eq!(rel.foreign_keys().len(), 2);
        assert!(rel.involves(EntityId(3)));
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("product"), "products");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("product_tag"), "product_tags");
    }

    #[test]
    fn test_relation_serializes_kind_tag() {
        let json = serde_json::to_value(one_to_many()).unwrap();
        assert_eq!(json["kind"]["kind"], "one_to_many");
        assert_eq!(json["on_delete"], "set_null");
    }
}
