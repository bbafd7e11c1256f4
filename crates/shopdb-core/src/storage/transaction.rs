//! Atomic multi-row writes.

use std::collections::HashMap;

use sled::transaction::{ConflictableTransactionError, TransactionError};

use super::{Record, RowKey, StorageEngine};
use crate::error::Error;

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
pub enum TransactionOp {
    /// Write a row.
    Put {
        /// Row key.
        key: RowKey,
        /// Record to store.
        record: Record,
    },
    /// Remove a row.
    Delete {
        /// Row key.
        key: RowKey,
    },
}

/// A batch of row writes applied atomically on commit.
///
/// Reads through the transaction see its own uncommitted writes.
pub struct Transaction<'a> {
    engine: &'a StorageEngine,
    ops: Vec<TransactionOp>,
    /// Local cache for uncommitted writes (None marks a delete).
    write_cache: HashMap<RowKey, Option<Record>>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(engine: &'a StorageEngine) -> Self {
        Self {
            engine,
            ops: Vec::new(),
            write_cache: HashMap::new(),
        }
    }

    /// Queue a row write.
    pub fn put(&mut self, key: RowKey, record: Record) -> &mut Self {
        self.write_cache.insert(key.clone(), Some(record.clone()));
        self.ops.push(TransactionOp::Put { key, record });
        self
    }

    /// Queue a row removal.
    pub fn delete(&mut self, key: RowKey) -> &mut Self {
        self.write_cache.insert(key.clone(), None);
        self.ops.push(TransactionOp::Delete { key });
        self
    }

    /// Read a row, preferring this transaction's pending writes.
    pub fn get(&self, table: &str, id: i64) -> Result<Option<Record>, Error> {
        match self.write_cache.get(&RowKey::new(table, id)) {
            Some(pending) => Ok(pending.clone()),
            None => self.engine.get(table, id),
        }
    }

    /// Check whether a row is removed by this transaction.
    pub fn is_deleted(&self, table: &str, id: i64) -> bool {
        matches!(self.write_cache.get(&RowKey::new(table, id)), Some(None))
    }

    /// Get the pending operations.
    pub fn operations(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// Get the number of pending operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Commit the transaction atomically.
    ///
    /// All operations succeed or none do.
    pub fn commit(self) -> Result<(), Error> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let mut encoded = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            match op {
                TransactionOp::Put { key, record } => {
                    encoded.push((key.encode(), Some(record.to_bytes()?)))
                }
                TransactionOp::Delete { key } => encoded.push((key.encode(), None)),
            }
        }

        let result: Result<(), TransactionError<Error>> =
            self.engine.data_tree().transaction(|tx| {
                for (key, value) in &encoded {
                    match value {
                        Some(bytes) => {
                            tx.insert(key.as_slice(), bytes.as_slice())?;
                        }
                        None => {
                            tx.remove(key.as_slice())?;
                        }
                    }
                }
                Ok::<(), ConflictableTransactionError<Error>>(())
            });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }
}

impl StorageEngine {
    /// Begin a new transaction.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;

    fn test_engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    #[test]
    fn test_transaction_commit() {
        let engine = test_engine();
        engine.put(&RowKey::new("tag", 1), &Record::new(vec![1])).unwrap();

        let mut tx = engine.transaction();
        tx.put(RowKey::new("tag", 2), Record::new(vec![2]))
            .delete(RowKey::new("tag", 1));
        assert_eq!(tx.operation_count(), 2);

        // Nothing visible before commit
        assert!(engine.get("tag", 1).unwrap().is_some());
        assert!(engine.get("tag", 2).unwrap().is_none());

        tx.commit().unwrap();
        assert!(engine.get("tag", 1).unwrap().is_none());
        assert_eq!(engine.get("tag", 2).unwrap().unwrap().data, vec![2]);
    }

    #[test]
    fn test_reads_see_pending_writes() {
        let engine = test_engine();
        engine.put(&RowKey::new("tag", 1), &Record::new(vec![1])).unwrap();

        let mut tx = engine.transaction();
        assert!(tx.get("tag", 1).unwrap().is_some());

        tx.delete(RowKey::new("tag", 1));
        assert!(tx.get("tag", 1).unwrap().is_none());
        assert!(tx.is_deleted("tag", 1));

        tx.put(RowKey::new("tag", 3), Record::new(vec![3]));
        assert_eq!(tx.get("tag", 3).unwrap().unwrap().data, vec![3]);
    }

    #[test]
    fn test_dropped_transaction_writes_nothing() {
        let engine = test_engine();

        {
            let mut tx = engine.transaction();
            tx.put(RowKey::new("tag", 1), Record::new(vec![1]));
        }

        assert!(engine.get("tag", 1).unwrap().is_none());
    }

    #[test]
    fn test_empty_transaction() {
        let engine = test_engine();
        let tx = engine.transaction();
        assert!(tx.operations().is_empty());
        tx.commit().unwrap();
    }
}
