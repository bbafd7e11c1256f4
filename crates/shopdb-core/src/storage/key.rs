//! Row key encoding.

use std::fmt;

/// Size of the encoded row id in bytes.
pub const ROW_ID_SIZE: usize = 8;

/// Separator between the table name and the row id.
const SEPARATOR: u8 = 0;

/// Key of one stored row.
///
/// Key format: `[table name][0x00][id (8 bytes, big-endian, sign bit flipped)]`
///
/// Flipping the sign bit makes lexicographic order match numeric order for
/// negative ids as well, so prefix scans yield rows in id order.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    /// Storage table name.
    pub table: String,

    /// Primary key value.
    pub id: i64,
}

impl RowKey {
    /// Create a new row key.
    pub fn new(table: impl Into<String>, id: i64) -> Self {
        Self {
            table: table.into(),
            id,
        }
    }

    /// Encode the key to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Self::table_prefix(&self.table);
        buf.extend_from_slice(&encode_id(self.id));
        buf
    }

    /// Decode a key from bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ROW_ID_SIZE + 1 {
            return None;
        }
        let (head, id_bytes) = bytes.split_at(bytes.len() - ROW_ID_SIZE);
        let (&separator, table) = head.split_last()?;
        if separator != SEPARATOR {
            return None;
        }

        let table = std::str::from_utf8(table).ok()?;
        Some(Self::new(table, decode_id(id_bytes)?))
    }

    /// Prefix shared by every row of a table.
    pub fn table_prefix(table: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(table.len() + 1 + ROW_ID_SIZE);
        prefix.extend_from_slice(table.as_bytes());
        prefix.push(SEPARATOR);
        prefix
    }
}

impl fmt::Debug for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowKey({}#{})", self.table, self.id)
    }
}

fn encode_id(id: i64) -> [u8; ROW_ID_SIZE] {
    ((id as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_id(bytes: &[u8]) -> Option<i64> {
    let buf: [u8; ROW_ID_SIZE] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(buf) ^ (1 << 63)) as i64)
}

/// Current time in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_encoding() {
        let key = RowKey::new("product_tag", 42);
        let decoded = RowKey::decode(&key.encode()).unwrap();

        assert_eq!(decoded, key);
        assert!(key.encode().starts_with(&RowKey::table_prefix("product_tag")));
    }

    #[test]
    fn test_key_ordering() {
        let ids = [-5i64, -1, 0, 1, 2, 255, 256, i64::MAX];
        let keys: Vec<_> = ids.iter().map(|id| RowKey::new("tag", *id).encode()).collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_prefix_does_not_match_longer_table() {
        let tag = RowKey::table_prefix("tag");
        let tags_row = RowKey::new("tags", 1).encode();

        assert!(!tags_row.starts_with(&tag));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(RowKey::decode(b"short").is_none());
        assert!(RowKey::decode(b"tag\x01\0\0\0\0\0\0\0\x01").is_none());
    }

    #[test]
    fn test_current_timestamp() {
        let ts1 = current_timestamp();
        let ts2 = current_timestamp();
        assert!(ts2 >= ts1);
    }
}
