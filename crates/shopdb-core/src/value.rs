//! Runtime values written to and read from entity fields.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;

/// A runtime field value.
///
/// Values supplied by callers are loosely typed (a price may arrive as the
/// string `"19.99"`); validation coerces them to the declared field type
/// before they reach storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// Fixed-precision decimal.
    Decimal(Decimal),
    /// UTF-8 string.
    String(String),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as a decimal. Integers widen losslessly.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's runtime type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
        }
    }

    /// Interpret the value as a decimal number, parsing strings.
    ///
    /// Strings must be plain decimal literals (see `is_decimal_literal`);
    /// digit separators, exponents and a trailing dot are rejected.
    pub fn parse_decimal(&self) -> Option<Decimal> {
        match self {
            Value::String(s) => {
                let trimmed = s.trim();
                if !is_decimal_literal(trimmed) {
                    return None;
                }
                Decimal::from_str(trimmed).ok()
            }
            other => other.as_decimal(),
        }
    }

    /// Convert to a JSON value for display and export.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Decimal(d) => serde_json::Value::String(d.to_string()),
            Value::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Optional sign, optional integer digits, then an optional dot followed by
/// at least one digit: `12`, `-3`, `19.99`, `.5`.
pub(crate) fn is_decimal_literal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => ("", unsigned),
    };
    !frac_part.is_empty()
        && frac_part.bytes().all(|b| b.is_ascii_digit())
        && int_part.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(
            Value::from("19.99").parse_decimal(),
            Some(Decimal::new(1999, 2))
        );
        assert_eq!(Value::from(" 7 ").parse_decimal(), Some(Decimal::from(7)));
        assert_eq!(Value::Int(3).parse_decimal(), Some(Decimal::from(3)));
        assert!(Value::from("abc").parse_decimal().is_none());
        assert!(Value::from("").parse_decimal().is_none());
        assert!(Value::Bool(true).parse_decimal().is_none());
    }

    #[test]
    fn test_decimal_literal_grammar() {
        for accepted in ["12", "-3", "+4", "19.99", ".5", "007"] {
            assert!(is_decimal_literal(accepted), "{accepted}");
        }
        for rejected in ["", "-", ".", "1.", "1_000", "1__2.3_", "1e3", "1.2.3", "0x10", " 1"] {
            assert!(!is_decimal_literal(rejected), "{rejected}");
        }
        assert!(Value::from("1_000").parse_decimal().is_none());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(4i64)), Value::Int(4));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("abc").to_string(), "\"abc\"");
        assert_eq!(Value::Decimal(Decimal::new(1999, 2)).to_string(), "19.99");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
