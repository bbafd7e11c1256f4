//! Storage layer for shopdb.
//!
//! Rows live in a single sled tree keyed by table name and integer id. Each
//! table has its own id sequence in the metadata tree.

mod config;
mod engine;
mod record;
mod transaction;

pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use key::RowKey;
pub use record::Record;
pub use transaction::{Transaction, TransactionOp};
