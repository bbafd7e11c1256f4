//! Versioned record of the schemas bound to a database.
//!
//! Snapshots live in a single `schema_history` tree: `head` holds the current
//! version and `v` + big-endian version holds each [`SchemaBundle`]. A new
//! version and its head pointer are written in one sled transaction.

use std::sync::atomic::{AtomicU64, Ordering};

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use tracing::info;

use super::{Schema, SchemaBundle};
use crate::error::Error;

const HISTORY_TREE: &str = "schema_history";
const HEAD_KEY: &[u8] = b"head";
const VERSION_PREFIX: u8 = b'v';

/// Schema history of one database.
pub struct Catalog {
    history: Tree,
    /// Cached copy of `head`; 0 before the first schema is applied.
    head: AtomicU64,
}

impl Catalog {
    /// Open the schema history stored in `db`.
    pub fn open(db: &Db) -> Result<Self, Error> {
        let history = db.open_tree(HISTORY_TREE)?;
        let head = history
            .get(HEAD_KEY)?
            .map(|raw| decode_version(&raw))
            .transpose()?
            .unwrap_or(0);

        Ok(Self {
            history,
            head: AtomicU64::new(head),
        })
    }

    /// Version describing the bound schema, or 0 when none was applied.
    pub fn current_version(&self) -> u64 {
        self.head.load(Ordering::SeqCst)
    }

    /// Snapshot at the current version.
    pub fn current_schema(&self) -> Result<Option<SchemaBundle>, Error> {
        match self.current_version() {
            0 => Ok(None),
            head => self.schema_at_version(head),
        }
    }

    /// Snapshot at `version`, if recorded.
    pub fn schema_at_version(&self, version: u64) -> Result<Option<SchemaBundle>, Error> {
        self.history
            .get(version_key(version))?
            .map(|raw| SchemaBundle::from_bytes(&raw))
            .transpose()
    }

    /// Record `schema` and return the version that describes it.
    ///
    /// Nothing is written when the current snapshot has the same fingerprint.
    pub fn apply_schema(&self, schema: &Schema) -> Result<u64, Error> {
        let head = self.current_version();
        let fingerprint = schema.fingerprint();
        if let Some(current) = self.current_schema()? {
            if current.fingerprint == fingerprint {
                return Ok(head);
            }
        }

        let version = head + 1;
        let bundle = schema.bundle(version);
        let encoded = bundle.to_bytes()?;
        let key = version_key(version);

        let written: Result<(), TransactionError<Error>> = self.history.transaction(|tx| {
            tx.insert(key.as_slice(), encoded.as_slice())?;
            tx.insert(HEAD_KEY, version.to_be_bytes().to_vec())?;
            Ok::<(), ConflictableTransactionError<Error>>(())
        });
        match written {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(Error::Storage(e)),
        }
        self.head.store(version, Ordering::SeqCst);

        info!(
            version,
            previous = head,
            fingerprint = %bundle.fingerprint,
            entities = bundle.entities.len(),
            "schema version recorded"
        );
        Ok(version)
    }

    /// Logical entity names of the current snapshot.
    pub fn list_entities(&self) -> Result<Vec<String>, Error> {
        let Some(bundle) = self.current_schema()? else {
            return Ok(Vec::new());
        };
        Ok(bundle.entities.iter().map(|e| e.name.clone()).collect())
    }

    /// Storage table names of the current snapshot, in declaration order.
    pub fn table_names(&self) -> Result<Vec<String>, Error> {
        let Some(bundle) = self.current_schema()? else {
            return Ok(Vec::new());
        };
        Ok(bundle.entities.iter().map(|e| e.table_name()).collect())
    }

    /// Every recorded version, ascending.
    pub fn list_versions(&self) -> Result<Vec<u64>, Error> {
        self.history
            .scan_prefix([VERSION_PREFIX])
            .keys()
            .map(|key| decode_version(&key?[1..]))
            .collect()
    }

    /// Flush the history tree to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.history.flush()?;
        Ok(())
    }
}

fn version_key(version: u64) -> [u8; 9] {
    let mut key = [VERSION_PREFIX; 9];
    key[1..].copy_from_slice(&version.to_be_bytes());
    key
}

fn decode_version(bytes: &[u8]) -> Result<u64, Error> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidKey)?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, ScalarType, SchemaBuilder};

    fn catalog_schema(tags: bool) -> Schema {
        let mut builder = SchemaBuilder::new();
        builder
            .define_entity(
                EntityDef::new("category")
                    .with_field(FieldDef::surrogate_key("id"))
                    .with_field(FieldDef::new("category_name", ScalarType::String)),
            )
            .unwrap();
        if tags {
            builder
                .define_entity(
                    EntityDef::new("Tag")
                        .with_field(FieldDef::surrogate_key("id"))
                        .with_field(FieldDef::optional("tag_name", ScalarType::String))
                        .with_table_name("tags"),
                )
                .unwrap();
        }
        builder.build().unwrap()
    }

    fn memory_db() -> Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    #[test]
    fn test_empty_history() {
        let db = memory_db();
        let catalog = Catalog::open(&db).unwrap();

        assert_eq!(catalog.current_version(), 0);
        assert!(catalog.current_schema().unwrap().is_none());
        assert!(catalog.list_versions().unwrap().is_empty());
        assert!(catalog.table_names().unwrap().is_empty());
    }

    #[test]
    fn test_first_apply() {
        let db = memory_db();
        let catalog = Catalog::open(&db).unwrap();

        assert_eq!(catalog.apply_schema(&catalog_schema(false)).unwrap(), 1);
        assert_eq!(catalog.list_entities().unwrap(), vec!["category"]);
        assert_eq!(catalog.table_names().unwrap(), vec!["category"]);
    }

    #[test]
    fn test_unchanged_schema_is_not_recorded_again() {
        let db = memory_db();
        let catalog = Catalog::open(&db).unwrap();

        catalog.apply_schema(&catalog_schema(true)).unwrap();
        assert_eq!(catalog.apply_schema(&catalog_schema(true)).unwrap(), 1);
        assert_eq!(catalog.list_versions().unwrap(), vec![1]);
    }

    #[test]
    fn test_changed_schema_gets_new_version() {
        let db = memory_db();
        let catalog = Catalog::open(&db).unwrap();

        catalog.apply_schema(&catalog_schema(false)).unwrap();
        assert_eq!(catalog.apply_schema(&catalog_schema(true)).unwrap(), 2);
        assert_eq!(catalog.list_versions().unwrap(), vec![1, 2]);
        assert_eq!(catalog.table_names().unwrap(), vec!["category", "tags"]);

        let first = catalog.schema_at_version(1).unwrap().unwrap();
        assert_eq!(first.entity_names(), vec!["category"]);
        assert!(catalog.schema_at_version(3).unwrap().is_none());
    }

    #[test]
    fn test_head_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = sled::Config::new().path(dir.path());

        {
            let db = config.clone().open().unwrap();
            let catalog = Catalog::open(&db).unwrap();
            catalog.apply_schema(&catalog_schema(false)).unwrap();
            catalog.apply_schema(&catalog_schema(true)).unwrap();
            catalog.flush().unwrap();
        }

        let db = config.open().unwrap();
        let catalog = Catalog::open(&db).unwrap();
        assert_eq!(catalog.current_version(), 2);
        let head = catalog.current_schema().unwrap().unwrap();
        assert_eq!(head.fingerprint, catalog_schema(true).fingerprint());
    }
}
