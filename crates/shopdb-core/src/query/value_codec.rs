//! Value codec for encoding/decoding row data to/from bytes.
//!
//! Format:
//! - Field count (4 bytes, little-endian)
//! - For each field:
//!   - Field name length (2 bytes, little-endian)
//!   - Field name (UTF-8 bytes)
//!   - Value tag (1 byte)
//!   - Value data (variable length, depends on type)

use rust_decimal::Decimal;

use crate::error::Error;
use crate::value::Value;

/// Type tag for encoded values.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueTag {
    Null = 0,
    Bool = 1,
    Int = 2,
    Decimal = 3,
    String = 4,
}

impl TryFrom<u8> for ValueTag {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValueTag::Null),
            1 => Ok(ValueTag::Bool),
            2 => Ok(ValueTag::Int),
            3 => Ok(ValueTag::Decimal),
            4 => Ok(ValueTag::String),
            _ => Err(Error::InvalidData(format!("unknown value tag: {value}"))),
        }
    }
}

/// Encode a list of field name/value pairs to bytes.
pub fn encode_entity(fields: &[(String, Value)]) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();

    let count = u32::try_from(fields.len())
        .map_err(|_| Error::InvalidData("too many fields".into()))?;
    buf.extend_from_slice(&count.to_le_bytes());

    for (name, value) in fields {
        let name_len = u16::try_from(name.len())
            .map_err(|_| Error::InvalidData(format!("field name too long: {name}")))?;
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(name.as_bytes());

        encode_value(&mut buf, value)?;
    }

    Ok(buf)
}

/// Decode bytes back to field name/value pairs.
pub fn decode_entity(data: &[u8]) -> Result<Vec<(String, Value)>, Error> {
    let mut reader = Reader::new(data);
    let count = u32::from_le_bytes(reader.array("field count")?) as usize;

    let mut fields = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let name = reader.name()?;
        let value = reader.value()?;
        fields.push((name, value));
    }

    if !reader.is_empty() {
        return Err(Error::InvalidData("trailing bytes after last field".into()));
    }
    Ok(fields)
}

/// Decode a single field, skipping the others.
pub fn get_field(data: &[u8], field_name: &str) -> Result<Option<Value>, Error> {
    let mut reader = Reader::new(data);
    let count = u32::from_le_bytes(reader.array("field count")?) as usize;

    for _ in 0..count {
        let name = reader.name()?;
        let value = reader.value()?;
        if name == field_name {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), Error> {
    match value {
        Value::Null => buf.push(ValueTag::Null as u8),
        Value::Bool(b) => {
            buf.push(ValueTag::Bool as u8);
            buf.push(u8::from(*b));
        }
        Value::Int(i) => {
            buf.push(ValueTag::Int as u8);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Decimal(d) => {
            buf.push(ValueTag::Decimal as u8);
            buf.extend_from_slice(&d.serialize());
        }
        Value::String(s) => {
            buf.push(ValueTag::String as u8);
            let len = u32::try_from(s.len())
                .map_err(|_| Error::InvalidData("string value too long".into()))?;
            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
    }
    Ok(())
}

/// Bounds-checked cursor over encoded bytes.
struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn is_empty(&self) -> bool {
        self.cursor == self.data.len()
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], Error> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::InvalidData(format!("data too short for {what}")))?;
        let slice = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N], Error> {
        let slice = self.take(N, what)?;
        slice
            .try_into()
            .map_err(|_| Error::InvalidData(format!("data too short for {what}")))
    }

    fn name(&mut self) -> Result<String, Error> {
        let len = u16::from_le_bytes(self.array("field name length")?) as usize;
        let bytes = self.take(len, "field name")?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::InvalidData("invalid UTF-8 in field name".into()))
    }

    fn value(&mut self) -> Result<Value, Error> {
        let [tag] = self.array::<1>("value tag")?;
        match ValueTag::try_from(tag)? {
            ValueTag::Null => Ok(Value::Null),
            ValueTag::Bool => {
                let [b] = self.array::<1>("bool")?;
                Ok(Value::Bool(b != 0))
            }
            ValueTag::Int => Ok(Value::Int(i64::from_le_bytes(self.array("integer")?))),
            ValueTag::Decimal => Ok(Value::Decimal(Decimal::deserialize(self.array("decimal")?))),
            ValueTag::String => {
                let len = u32::from_le_bytes(self.array("string length")?) as usize;
                let bytes = self.take(len, "string")?;
                String::from_utf8(bytes.to_vec())
                    .map(Value::String)
                    .map_err(|_| Error::InvalidData("invalid UTF-8 in string value".into()))
            }
        }
    }
}
