//! Schema definition and association registry.
//!
//! Entities are declared as data ([`EntityDef`] with [`FieldDef`]s) on a
//! [`SchemaBuilder`], relations are declared between the returned
//! [`EntityHandle`]s, and [`SchemaBuilder::build`] freezes everything into a
//! [`Schema`]. The [`Catalog`] records each bound schema with the storage
//! provider under a version number.

mod builder;
mod catalog;
mod entity;
mod field;
mod relation;
mod schema;
mod types;

pub use builder::{EntityHandle, SchemaBuilder};
pub use catalog::Catalog;
pub use entity::{derive_table_name, EntityDef, EntityOptions};
pub use field::{DefaultValue, FieldDef, Reference, Validator};
pub use relation::{
    pluralize, Accessor, AccessorKind, Cardinality, DeleteBehavior, EntityId, FieldRef,
    RelationDef, RelationId, RelationKind,
};
pub use schema::{ForeignKey, Schema, SchemaBundle};
pub use types::ScalarType;
