//! Record type for stored rows.

use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};

/// A stored row with metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Encoded field values.
    pub data: Vec<u8>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,

    /// Last write timestamp in microseconds since Unix epoch.
    pub updated_at: u64,
}

impl Record {
    /// Create a new record with the current timestamp.
    pub fn new(data: Vec<u8>) -> Self {
        let now = super::key::current_timestamp();
        Self {
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the row data, keeping the creation time.
    pub fn revised(&self, data: Vec<u8>) -> Self {
        Self {
            data,
            created_at: self.created_at,
            updated_at: super::key::current_timestamp().max(self.created_at),
        }
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    ///
    /// Bytes handed out by sled carry no alignment guarantee, so they are
    /// copied into an aligned buffer first.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bytes() {
        let record = Record::new(vec![1, 2, 3, 4, 5]);
        let decoded = Record::from_bytes(&record.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded, record);
    }

    #[test]
    fn test_revised_keeps_created_at() {
        let original = Record::new(vec![1]);
        let revised = original.revised(vec![2]);

        assert_eq!(revised.created_at, original.created_at);
        assert!(revised.updated_at >= original.updated_at);
        assert_eq!(revised.data, vec![2]);
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(matches!(
            Record::from_bytes(&[0xff, 0x01]),
            Err(Error::Deserialization(_))
        ));
    }
}
