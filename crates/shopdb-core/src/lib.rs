//! shopdb core - schema definition, association registry, and embedded storage.
//!
//! Entities are declared on a [`SchemaBuilder`], associations are registered
//! between the returned handles, and [`SchemaBuilder::build`] freezes the
//! result into a [`Schema`]. [`Database::bind`] attaches a schema to a sled
//! backed [`StorageEngine`] and enforces the declared rules on every write.

pub mod catalog;
pub mod constraint;
pub mod database;
pub mod error;
pub mod query;
pub mod storage;
pub mod value;

pub use catalog::{
    Accessor, AccessorKind, Cardinality, Catalog, DefaultValue, DeleteBehavior, EntityDef,
    EntityHandle, EntityId, FieldDef, RelationDef, RelationId, ScalarType, Schema, SchemaBuilder,
    SchemaBundle, Validator,
};
pub use constraint::CascadeResult;
pub use database::Database;
pub use error::{
    ConfigurationError, Error, ReferentialIntegrityError, ResolutionError, ValidationError,
};
pub use query::Row;
pub use storage::{Record, StorageConfig, StorageEngine, Transaction};
pub use value::Value;

/// Re-export the decimal type used for decimal fields.
pub use rust_decimal::Decimal;
