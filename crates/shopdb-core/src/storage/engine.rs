//! Storage engine implementation.

use super::{Record, RowKey, StorageConfig};
use crate::error::Error;
use sled::{Db, Tree};
use tracing::debug;

/// Tree name for row data.
const DATA_TREE: &str = "rows";

/// Tree name for metadata (table registry, id sequences).
const META_TREE: &str = "meta";

/// Prefix for registered tables in meta tree.
const TABLE_PREFIX: &[u8] = b"table:";

/// Prefix for id sequences in meta tree.
const SEQUENCE_PREFIX: &[u8] = b"seq:";

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for row data.
    data_tree: Tree,

    /// Tree for metadata.
    meta_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let sled_config = config.to_sled_config();
        let db = sled_config.open()?;
        let data_tree = db.open_tree(DATA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;

        debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "storage opened"
        );

        Ok(Self {
            db,
            data_tree,
            meta_tree,
        })
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Record a table in the registry.
    ///
    /// Returns `true` when the table was not known before.
    pub fn register_table(&self, table: &str) -> Result<bool, Error> {
        let key = prefixed(TABLE_PREFIX, table);
        let previous = self
            .meta_tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(&[] as &[u8]))?;
        Ok(previous.is_ok())
    }

    /// All registered table names, sorted.
    pub fn tables(&self) -> Result<Vec<String>, Error> {
        let mut tables = Vec::new();
        for result in self.meta_tree.scan_prefix(TABLE_PREFIX) {
            let (key, _) = result?;
            let name = std::str::from_utf8(&key[TABLE_PREFIX.len()..])
                .map_err(|_| Error::InvalidKey)?;
            tables.push(name.to_string());
        }
        Ok(tables)
    }

    /// Allocate the next id of a table's sequence. Sequences start at 1.
    pub fn next_id(&self, table: &str) -> Result<i64, Error> {
        let key = prefixed(SEQUENCE_PREFIX, table);
        let updated = self.meta_tree.update_and_fetch(key, |old| {
            let current = old.and_then(decode_counter).unwrap_or(0);
            Some(current.saturating_add(1).to_be_bytes().to_vec())
        })?;
        updated
            .as_deref()
            .and_then(decode_counter)
            .ok_or_else(|| Error::InvalidData(format!("corrupt id sequence for table '{table}'")))
    }

    /// Write a row, replacing any previous record under the same key.
    pub fn put(&self, key: &RowKey, record: &Record) -> Result<(), Error> {
        self.data_tree.insert(key.encode(), record.to_bytes()?)?;
        Ok(())
    }

    /// Get a row by table and id.
    pub fn get(&self, table: &str, id: i64) -> Result<Option<Record>, Error> {
        match self.data_tree.get(RowKey::new(table, id).encode())? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Check whether a row exists.
    pub fn contains(&self, table: &str, id: i64) -> Result<bool, Error> {
        Ok(self.data_tree.contains_key(RowKey::new(table, id).encode())?)
    }

    /// Remove a row, returning the record it held.
    pub fn remove(&self, table: &str, id: i64) -> Result<Option<Record>, Error> {
        match self.data_tree.remove(RowKey::new(table, id).encode())? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Scan all rows of a table in id order.
    pub fn scan_table(
        &self,
        table: &str,
    ) -> impl Iterator<Item = Result<(i64, Record), Error>> + '_ {
        let prefix = RowKey::table_prefix(table);
        let expected_len = prefix.len() + super::key::ROW_ID_SIZE;

        self.data_tree.scan_prefix(&prefix).map(move |result| {
            let (key_bytes, value_bytes) = result?;
            if key_bytes.len() != expected_len {
                return Err(Error::InvalidKey);
            }
            let key = RowKey::decode(&key_bytes).ok_or(Error::InvalidKey)?;
            let record = Record::from_bytes(&value_bytes)?;
            Ok((key.id, record))
        })
    }

    /// Number of rows stored in a table.
    pub fn count(&self, table: &str) -> Result<usize, Error> {
        let mut count = 0;
        for result in self.data_tree.scan_prefix(RowKey::table_prefix(table)) {
            result?;
            count += 1;
        }
        Ok(count)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database size in bytes.
    pub fn size_on_disk(&self) -> Result<u64, Error> {
        Ok(self.db.size_on_disk()?)
    }

    /// Get access to the underlying data tree (for transactions).
    pub(crate) fn data_tree(&self) -> &Tree {
        &self.data_tree
    }

    /// Get the underlying sled database (for opening new trees).
    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn prefixed(prefix: &[u8], table: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + table.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(table.as_bytes());
    key
}

fn decode_counter(bytes: &[u8]) -> Option<i64> {
    let buf: [u8; 8] = bytes.try_into().ok()?;
    Some(i64::from_be_bytes(buf))
}
