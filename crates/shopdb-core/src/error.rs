//! Core error types.
//!
//! Registration-time failures ([`ConfigurationError`], [`ResolutionError`]) are
//! raised while the schema is being built and abort initialization. Write-time
//! failures ([`ValidationError`], [`ReferentialIntegrityError`]) are returned to
//! the caller of the write and always name the offending entity and field.

use thiserror::Error;

/// Core database errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Row not found.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Logical entity name.
        entity: String,
        /// Requested primary key.
        id: i64,
    },

    /// Schema declaration error.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Reference to an undeclared entity or field.
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// A written value failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A foreign key does not match an existing row.
    #[error("referential integrity error: {0}")]
    ReferentialIntegrity(#[from] ReferentialIntegrityError),
}

impl Error {
    /// Whether this error can only happen while the schema is being registered.
    pub fn is_registration_error(&self) -> bool {
        matches!(self, Error::Configuration(_) | Error::Resolution(_))
    }
}

/// Malformed or conflicting schema declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// An entity was declared without a name.
    #[error("entity name must not be empty")]
    EmptyEntityName,

    /// A field was declared without a name.
    #[error("entity '{entity}' declares a field with an empty name")]
    EmptyFieldName {
        /// Entity name.
        entity: String,
    },

    /// Two fields in one entity share a name.
    #[error("entity '{entity}' declares field '{field}' more than once")]
    DuplicateField {
        /// Entity name.
        entity: String,
        /// Duplicated field name.
        field: String,
    },

    /// No primary key field was declared.
    #[error("entity '{entity}' has no primary key")]
    MissingPrimaryKey {
        /// Entity name.
        entity: String,
    },

    /// More than one primary key field was declared.
    #[error("entity '{entity}' declares multiple primary keys: {}", .fields.join(", "))]
    MultiplePrimaryKeys {
        /// Entity name.
        entity: String,
        /// All fields marked as primary key.
        fields: Vec<String>,
    },

    /// A surrogate primary key is not auto-generated.
    #[error("primary key '{entity}.{field}' must be auto-generated unless the entity has a natural key")]
    PrimaryKeyNotGenerated {
        /// Entity name.
        entity: String,
        /// Primary key field.
        field: String,
    },

    /// Primary keys are stored as integers.
    #[error("primary key '{entity}.{field}' must be an integer")]
    PrimaryKeyNotInteger {
        /// Entity name.
        entity: String,
        /// Primary key field.
        field: String,
    },

    /// Auto-generation is only supported for integer fields.
    #[error("auto-generated field '{entity}.{field}' must be an integer")]
    AutoGeneratedNotInteger {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// A default value does not fit the field.
    #[error("invalid default for '{entity}.{field}': {reason}")]
    InvalidDefault {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Why the default was rejected.
        reason: String,
    },

    /// An entity name was bound twice with different definitions.
    #[error("entity '{entity}' is already defined with a different field set")]
    ConflictingRedefinition {
        /// Entity name.
        entity: String,
    },

    /// Two entities map to the same storage table.
    #[error("table '{table}' is used by both '{existing}' and '{entity}'")]
    DuplicateTable {
        /// Storage table name.
        table: String,
        /// Entity that already owns the table.
        existing: String,
        /// Entity being declared.
        entity: String,
    },

    /// A foreign key already realizes another relationship.
    #[error("foreign key '{entity}.{field}' already realizes relation '{relation}'")]
    ForeignKeyReused {
        /// Entity holding the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Relation that owns the key.
        relation: String,
    },

    /// A foreign key does not reference the primary key it is declared against.
    #[error(
        "foreign key '{entity}.{field}' must reference '{expected}', found {}",
        .actual.as_deref().unwrap_or("no reference")
    )]
    ForeignKeyTargetMismatch {
        /// Entity holding the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Expected `entity.field` target.
        expected: String,
        /// Declared target, if any.
        actual: Option<String>,
    },

    /// Both sides of a join entity use the same key.
    #[error("join entity '{entity}' uses '{field}' for both sides of the relation")]
    SameJoinKeys {
        /// Join entity name.
        entity: String,
        /// Field name used twice.
        field: String,
    },

    /// Two derived accessors (or an accessor and a field) share a name.
    #[error("entity '{entity}' already has an accessor or field named '{accessor}'")]
    AccessorClash {
        /// Entity name.
        entity: String,
        /// Clashing name.
        accessor: String,
    },

    /// SET NULL delete behavior on a non-nullable foreign key.
    #[error("foreign key '{entity}.{field}' is required and cannot be set to null on delete")]
    SetNullOnRequired {
        /// Entity holding the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
    },
}

/// References to entities or fields that have not been declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The entity has not been declared.
    #[error("entity '{name}' is not declared")]
    UnknownEntity {
        /// Requested entity name.
        name: String,
    },

    /// The entity exists but the field does not.
    #[error("field '{entity}.{field}' is not declared")]
    UnknownField {
        /// Entity name.
        entity: String,
        /// Requested field name.
        field: String,
    },

    /// A field references an undeclared target.
    #[error("field '{entity}.{field}' references undeclared '{target_entity}.{target_field}'")]
    UnknownReference {
        /// Entity holding the reference.
        entity: String,
        /// Referencing field.
        field: String,
        /// Referenced entity.
        target_entity: String,
        /// Referenced field.
        target_field: String,
    },

    /// The entity has no accessor with this name.
    #[error("entity '{entity}' has no accessor '{accessor}'")]
    UnknownAccessor {
        /// Entity name.
        entity: String,
        /// Requested accessor name.
        accessor: String,
    },
}

/// A value written to a field violates its declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was not provided and has no default.
    #[error("'{entity}.{field}' is required")]
    MissingField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// Null was written to a required field.
    #[error("'{entity}.{field}' cannot be null")]
    NullViolation {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// The field is not declared on the entity.
    #[error("'{entity}' has no field '{field}'")]
    UnknownField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// An explicit value was written to an auto-generated field.
    #[error("'{entity}.{field}' is auto-generated and cannot be written")]
    AutoGenerated {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// The field's validator rejected the value.
    #[error("'{entity}.{field}' failed {validator} validation for value {value}")]
    Predicate {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Validator name.
        validator: String,
        /// Offending value, rendered.
        value: String,
    },

    /// A natural primary key is already taken.
    #[error("'{entity}.{field}' = {value} already exists")]
    DuplicateKey {
        /// Entity name.
        entity: String,
        /// Primary key field.
        field: String,
        /// Offending key.
        value: i64,
    },

    /// The value cannot be stored in the field's type.
    #[error("'{entity}.{field}' expects {expected}, got {value}")]
    TypeMismatch {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Declared field type.
        expected: String,
        /// Offending value, rendered.
        value: String,
    },
}

/// Foreign-key violations detected by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferentialIntegrityError {
    /// A foreign key value has no matching target row.
    #[error("'{entity}.{field}' = {value} has no matching '{target_entity}' row")]
    MissingTarget {
        /// Entity holding the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Referenced entity.
        target_entity: String,
        /// Foreign key value.
        value: i64,
    },

    /// Delete refused because RESTRICT references exist.
    #[error("cannot delete '{entity}' {id}: referenced by {count} '{referencing_entity}' row(s)")]
    RestrictViolation {
        /// Entity being deleted.
        entity: String,
        /// Primary key being deleted.
        id: i64,
        /// Entity holding the references.
        referencing_entity: String,
        /// Number of referencing rows.
        count: usize,
    },

    /// Cascading deletes nested too deeply.
    #[error("cascade depth exceeded at depth {depth}")]
    MaxDepthExceeded {
        /// Depth at which the cascade stopped.
        depth: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_errors() {
        let configuration: Error = ConfigurationError::EmptyEntityName.into();
        let resolution: Error = ResolutionError::UnknownEntity {
            name: "widget".to_string(),
        }
        .into();
        let integrity: Error = ReferentialIntegrityError::MaxDepthExceeded { depth: 65 }.into();
        let missing = Error::NotFound {
            entity: "product".to_string(),
            id: 7,
        };

        assert!(configuration.is_registration_error());
        assert!(resolution.is_registration_error());
        assert!(!integrity.is_registration_error());
        assert!(!missing.is_registration_error());
    }
}
