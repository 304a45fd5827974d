// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Field value type system.
//!
//! [`Value`] holds exactly one value of one [`FieldKind`]. Record-valued
//! kinds nest whole [`Record`]s, so a value tree mirrors the type graph it
//! was decoded against.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};

use super::error::CodecError;
use crate::model::Record;
use crate::schema::FieldKind;

/// One field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i32),
    IntegerArray(Vec<i32>),
    Double(f64),
    DoubleArray(Vec<f64>),
    String(String),
    StringArray(Vec<String>),
    Boolean(bool),
    BooleanArray(Vec<bool>),
    Long(i64),
    LongArray(Vec<i64>),
    BigDecimal(Decimal),
    BigDecimalArray(Vec<Decimal>),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Blob(Vec<u8>),
    Record(Box<Record>),
    RecordArray(Vec<Record>),
    /// One record out of a field's candidate types.
    Union(Box<Record>),
    UnionArray(Vec<Record>),
}

impl Value {
    // ========================================================================
    // Kind Checking
    // ========================================================================

    /// Check whether this value can be stored in a field of `kind`.
    ///
    /// Record-valued kinds also check the record's type against the declared
    /// target (or candidates).
    pub fn fits(&self, kind: &FieldKind) -> bool {
        match (self, kind) {
            (Value::Integer(_), FieldKind::Integer)
            | (Value::IntegerArray(_), FieldKind::IntegerArray)
            | (Value::Double(_), FieldKind::Double)
            | (Value::DoubleArray(_), FieldKind::DoubleArray)
            | (Value::String(_), FieldKind::String)
            | (Value::StringArray(_), FieldKind::StringArray)
            | (Value::Boolean(_), FieldKind::Boolean)
            | (Value::BooleanArray(_), FieldKind::BooleanArray)
            | (Value::Long(_), FieldKind::Long)
            | (Value::LongArray(_), FieldKind::LongArray)
            | (Value::BigDecimal(_), FieldKind::BigDecimal)
            | (Value::BigDecimalArray(_), FieldKind::BigDecimalArray)
            | (Value::Date(_), FieldKind::Date)
            | (Value::DateTime(_), FieldKind::DateTime)
            | (Value::Blob(_), FieldKind::Blob) => true,
            (Value::Record(r), FieldKind::Record(target)) => r.type_id() == *target,
            (Value::RecordArray(rs), FieldKind::RecordArray(target)) => {
                rs.iter().all(|r| r.type_id() == *target)
            }
            (Value::Union(r), FieldKind::RecordUnion(targets)) => {
                targets.contains(&r.type_id())
            }
            (Value::UnionArray(rs), FieldKind::RecordUnionArray(targets)) => {
                rs.iter().all(|r| targets.contains(&r.type_id()))
            }
            _ => false,
        }
    }

    /// Wire tag of the kind this value belongs to.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Value::Integer(_) => "int",
            Value::IntegerArray(_) => "intArray",
            Value::Double(_) => "double",
            Value::DoubleArray(_) => "doubleArray",
            Value::String(_) => "string",
            Value::StringArray(_) => "stringArray",
            Value::Boolean(_) => "boolean",
            Value::BooleanArray(_) => "booleanArray",
            Value::Long(_) => "long",
            Value::LongArray(_) => "longArray",
            Value::BigDecimal(_) => "bigDecimal",
            Value::BigDecimalArray(_) => "bigDecimalArray",
            Value::Date(_) => "date",
            Value::DateTime(_) => "dateTime",
            Value::Blob(_) => "blob",
            Value::Record(_) => "record",
            Value::RecordArray(_) => "recordArray",
            Value::Union(_) => "recordUnion",
            Value::UnionArray(_) => "recordUnionArray",
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            Value::Integer(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the nested record of a record or union value.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) | Value::Union(r) => Some(r),
            _ => None,
        }
    }

    /// Get the nested records of a record array or union array value.
    pub fn as_records(&self) -> Option<&[Record]> {
        match self {
            Value::RecordArray(rs) | Value::UnionArray(rs) => Some(rs),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
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

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::BigDecimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::BigDecimal(d) => write!(f, "{d}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Record(_) | Value::Union(_) => write!(f, "<record>"),
            other => write!(f, "<{}>", other.kind_tag()),
        }
    }
}

// =============================================================================
// Decimal
// =============================================================================

/// An arbitrary-precision decimal kept as its exact text.
///
/// The text is normalized to JSON number syntax on construction: a leading
/// `+` and redundant leading zeros are dropped and a bare fraction gains a
/// leading `0`. It is never routed through `f64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    /// Parse decimal text such as `-12.50` or `1e-7`.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        let invalid = || CodecError::format("bigDecimal", format!("invalid decimal '{text}'"));
        let trimmed = text.trim();
        let (negative, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (mantissa, exponent) = match rest.find(['e', 'E']) {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(pos) => (&mantissa[..pos], Some(&mantissa[pos + 1..])),
            None => (mantissa, None),
        };

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || (int_part.is_empty() && frac_part.is_none()) {
            return Err(invalid());
        }
        if let Some(frac) = frac_part {
            if frac.is_empty() || !all_digits(frac) {
                return Err(invalid());
            }
        }
        if let Some(exp) = exponent {
            let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            if digits.is_empty() || !all_digits(digits) {
                return Err(invalid());
            }
        }

        let int_part = int_part.trim_start_matches('0');
        let mut out = String::with_capacity(trimmed.len() + 1);
        if negative {
            out.push('-');
        }
        out.push_str(if int_part.is_empty() { "0" } else { int_part });
        if let Some(frac) = frac_part {
            out.push('.');
            out.push_str(frac);
        }
        if let Some(exp) = exponent {
            out.push('e');
            out.push_str(exp);
        }
        Ok(Decimal(out))
    }

    /// The normalized decimal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Decimal {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::parse(s)
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Self {
        Decimal(v.to_string())
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_keeps_exact_text() {
        let d = Decimal::parse("12345678901234567890.000000000000000001").unwrap();
        assert_eq!(d.as_str(), "12345678901234567890.000000000000000001");
    }

    #[test]
    fn test_decimal_normalization() {
        assert_eq!(Decimal::parse("+007.50").unwrap().as_str(), "7.50");
        assert_eq!(Decimal::parse(".5").unwrap().as_str(), "0.5");
        assert_eq!(Decimal::parse("-0").unwrap().as_str(), "-0");
        assert_eq!(Decimal::parse("1E-7").unwrap().as_str(), "1e-7");
    }

    #[test]
    fn test_decimal_rejects_garbage() {
        for text in ["", "-", "1.", "abc", "1e", "1.2.3", "0x10", "1e+"] {
            assert!(Decimal::parse(text).is_err(), "accepted '{text}'");
        }
    }

    #[test]
    fn test_fits_scalar_kinds() {
        assert!(Value::Integer(1).fits(&FieldKind::Integer));
        assert!(!Value::Integer(1).fits(&FieldKind::Long));
        assert!(Value::StringArray(vec![]).fits(&FieldKind::StringArray));
        assert!(!Value::Double(1.0).fits(&FieldKind::BigDecimal));
    }

    #[test]
    fn test_kind_tag_and_accessors() {
        let v = Value::from(42i64);
        assert_eq!(v.kind_tag(), "long");
        assert_eq!(v.as_long(), Some(42));
        assert_eq!(v.as_integer(), None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::Integer(3).as_long(), Some(3));
    }
}
