// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Field codec: one value of one field kind.
//!
//! | kind | JSON |
//! |---|---|
//! | int, long | number |
//! | double | number, always with a fractional part |
//! | bigDecimal | number token carrying the exact decimal text |
//! | string | string, or inline JSON for `isJsonContent` fields |
//! | date, dateTime | string, see [`date_format`](super::date_format) |
//! | blob | standard Base64 string |
//! | record | object |
//! | recordUnion | `{ "<TypeName>": { ... } }` |
//! | arrays | array of the element encoding |

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use super::context::{canonical_json, raw_json, DecodeContext, EncodeContext};
use super::date_format;
use super::record::{RecordSeed, RecordSer};
use crate::core::{CodecError, Decimal, Value};
use crate::schema::{builtin_types, Field, FieldKind, TypeId, TypePool};

/// How nested records are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefMode {
    /// All declared fields.
    Full,
    /// Key fields only; the record is a reference.
    KeyOnly,
}

fn field_context(owner: &str, field: &Field) -> String {
    format!("{owner}.{}", field.name())
}

/// Index of the `jsonValueAsField` field of an `asJsonObject` target.
pub(crate) fn value_as_field(pool: &TypePool, target: TypeId) -> Result<usize, String> {
    let ty = pool.get(target);
    ty.fields()
        .iter()
        .find(|f| f.has_annotation(builtin_types::VALUE_AS_FIELD))
        .filter(|f| *f.kind() == FieldKind::String)
        .map(Field::index)
        .ok_or_else(|| {
            format!(
                "type '{}' has no string field marked jsonValueAsField",
                ty.name()
            )
        })
}

// =============================================================================
// Encoding
// =============================================================================

/// Serializes one field value.
pub(crate) struct FieldValueSer<'a> {
    pub ctx: &'a EncodeContext<'a>,
    pub owner: &'a str,
    pub field: &'a Field,
    pub value: &'a Value,
    pub refs: RefMode,
}

impl<'a> FieldValueSer<'a> {
    fn fail<E: serde::ser::Error>(&self, message: impl Into<String>) -> E {
        self.ctx.errors.ser(CodecError::format(
            field_context(self.owner, self.field),
            message,
        ))
    }

    fn raw<E: serde::ser::Error>(&self, text: String) -> Result<Box<RawValue>, E> {
        raw_json(text).map_err(|m| self.fail(m))
    }

    fn finite<E: serde::ser::Error>(&self, v: f64) -> Result<f64, E> {
        if v.is_finite() {
            Ok(v)
        } else {
            Err(self.fail(format!("{v} has no JSON representation")))
        }
    }

    fn nested(&self, record: &'a crate::model::Record) -> RecordSer<'a> {
        RecordSer {
            ctx: self.ctx,
            record,
            with_kind: false,
            key_only: self.refs == RefMode::KeyOnly,
            skip: None,
        }
    }
}

impl Serialize for FieldValueSer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let opaque = self.field.is_json_content();
        match self.value {
            Value::Integer(v) => s.serialize_i32(*v),
            Value::IntegerArray(v) => v.serialize(s),
            Value::Double(v) => s.serialize_f64(self.finite::<S::Error>(*v)?),
            Value::DoubleArray(v) => {
                let checked = v
                    .iter()
                    .map(|d| self.finite(*d))
                    .collect::<Result<Vec<f64>, S::Error>>()?;
                checked.serialize(s)
            }
            Value::String(v) if opaque => self.raw::<S::Error>(v.clone())?.serialize(s),
            Value::String(v) => s.serialize_str(v),
            Value::StringArray(v) if opaque => {
                let raws = v
                    .iter()
                    .map(|text| self.raw(text.clone()))
                    .collect::<Result<Vec<_>, S::Error>>()?;
                raws.serialize(s)
            }
            Value::StringArray(v) => v.serialize(s),
            Value::Boolean(v) => s.serialize_bool(*v),
            Value::BooleanArray(v) => v.serialize(s),
            Value::Long(v) => s.serialize_i64(*v),
            Value::LongArray(v) => v.serialize(s),
            Value::BigDecimal(d) => self.raw::<S::Error>(d.as_str().to_owned())?.serialize(s),
            Value::BigDecimalArray(ds) => {
                let raws = ds
                    .iter()
                    .map(|d| self.raw(d.as_str().to_owned()))
                    .collect::<Result<Vec<_>, S::Error>>()?;
                raws.serialize(s)
            }
            Value::Date(d) => {
                let text = date_format::format_date(self.field, d)
                    .map_err(|m| self.fail::<S::Error>(m))?;
                s.serialize_str(&text)
            }
            Value::DateTime(dt) => {
                let text = date_format::format_date_time(self.field, dt)
                    .map_err(|m| self.fail::<S::Error>(m))?;
                s.serialize_str(&text)
            }
            Value::Blob(b) => s.serialize_str(&STANDARD.encode(b)),
            Value::Record(r) => self.nested(r).serialize(s),
            Value::RecordArray(rs) => match self.field.kind() {
                FieldKind::RecordArray(target)
                    if self.refs == RefMode::Full
                        && self.field.has_annotation(builtin_types::AS_JSON_OBJECT) =>
                {
                    let name_field = value_as_field(self.ctx.pool, *target)
                        .map_err(|m| self.fail::<S::Error>(m))?;
                    let mut map = s.serialize_map(Some(rs.len()))?;
                    for record in rs {
                        let name = record
                            .get(name_field)
                            .and_then(Value::as_str)
                            .ok_or_else(|| self.fail::<S::Error>("record has no property-name value"))?;
                        let body = RecordSer {
                            skip: Some(name_field),
                            ..self.nested(record)
                        };
                        map.serialize_entry(name, &body)?;
                    }
                    map.end()
                }
                _ => s.collect_seq(rs.iter().map(|r| self.nested(r))),
            },
            Value::Union(r) => UnionSer(self.nested(r)).serialize(s),
            Value::UnionArray(rs) => s.collect_seq(rs.iter().map(|r| UnionSer(self.nested(r)))),
        }
    }
}

/// `{ "<TypeName>": { ... } }`
struct UnionSer<'a>(RecordSer<'a>);

impl Serialize for UnionSer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let name = self.0.ctx.pool.name(self.0.record.type_id());
        let mut map = s.serialize_map(Some(1))?;
        map.serialize_entry(name, &self.0)?;
        map.end()
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// One scalar JSON token.
enum Token {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TokenVisitor;

        impl Visitor<'_> for TokenVisitor {
            type Value = Token;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number, string or boolean")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Token, E> {
                Ok(Token::Bool(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Token, E> {
                Ok(Token::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Token, E> {
                Ok(Token::UInt(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Token, E> {
                Ok(Token::Float(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Token, E> {
                Ok(Token::Str(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Token, E> {
                Ok(Token::Str(v))
            }
        }

        deserializer.deserialize_any(TokenVisitor)
    }
}

/// Scalar conversion from a token; numeric kinds also accept numeric text.
trait FromToken: Sized {
    fn from_token(token: Token) -> Result<Self, String>;
}

fn integral<T: TryFrom<i64> + TryFrom<u64> + std::str::FromStr>(
    token: Token,
    what: &str,
) -> Result<T, String> {
    let out_of_range = || format!("number out of range for {what}");
    match token {
        Token::Int(v) => T::try_from(v).map_err(|_| out_of_range()),
        Token::UInt(v) => T::try_from(v).map_err(|_| out_of_range()),
        Token::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e18 => {
            T::try_from(f as i64).map_err(|_| out_of_range())
        }
        Token::Float(f) => Err(format!("{f} is not an integer")),
        Token::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("'{s}' is not a valid {what}")),
        Token::Bool(_) => Err(format!("expected {what}, found boolean")),
    }
}

impl FromToken for i32 {
    fn from_token(token: Token) -> Result<Self, String> {
        integral(token, "int")
    }
}

impl FromToken for i64 {
    fn from_token(token: Token) -> Result<Self, String> {
        integral(token, "long")
    }
}

impl FromToken for f64 {
    fn from_token(token: Token) -> Result<Self, String> {
        match token {
            Token::Int(v) => Ok(v as f64),
            Token::UInt(v) => Ok(v as f64),
            Token::Float(v) => Ok(v),
            Token::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("'{s}' is not a valid double")),
            Token::Bool(_) => Err("expected double, found boolean".to_string()),
        }
    }
}

impl FromToken for bool {
    fn from_token(token: Token) -> Result<Self, String> {
        match token {
            Token::Bool(b) => Ok(b),
            Token::Str(s) if s == "true" => Ok(true),
            Token::Str(s) if s == "false" => Ok(false),
            _ => Err("expected boolean".to_string()),
        }
    }
}

impl FromToken for String {
    fn from_token(token: Token) -> Result<Self, String> {
        Ok(match token {
            Token::Str(s) => s,
            Token::Int(v) => v.to_string(),
            Token::UInt(v) => v.to_string(),
            Token::Float(v) => v.to_string(),
            Token::Bool(b) => b.to_string(),
        })
    }
}

fn decimal_from_raw(raw: &RawValue) -> Result<Decimal, String> {
    let text = raw.get();
    let parsed = if text.starts_with('"') {
        let unquoted: String = serde_json::from_str(text).map_err(|e| e.to_string())?;
        Decimal::parse(&unquoted)
    } else {
        Decimal::parse(text)
    };
    parsed.map_err(|_| format!("{text} is not a decimal"))
}

/// Reads one field value; JSON `null` yields `None`.
#[derive(Clone, Copy)]
pub(crate) struct FieldSeed<'a> {
    pub ctx: &'a DecodeContext<'a>,
    pub owner: &'a str,
    pub field: &'a Field,
}

impl<'a> FieldSeed<'a> {
    fn fail<E: de::Error>(&self, message: impl fmt::Display) -> E {
        self.ctx.errors.de(CodecError::format(
            field_context(self.owner, self.field),
            message.to_string(),
        ))
    }

    fn scalar<'de, T: FromToken, D: Deserializer<'de>>(&self, d: D) -> Result<T, D::Error> {
        let token = Token::deserialize(d)?;
        T::from_token(token).map_err(|m| self.fail(m))
    }

    fn scalars<'de, T: FromToken, D: Deserializer<'de>>(&self, d: D) -> Result<Vec<T>, D::Error> {
        Vec::<Token>::deserialize(d)?
            .into_iter()
            .map(T::from_token)
            .collect::<Result<Vec<T>, String>>()
            .map_err(|m| self.fail(m))
    }

    fn opaque<'de, D: Deserializer<'de>>(&self, d: D) -> Result<String, D::Error> {
        let raw = Box::<RawValue>::deserialize(d)?;
        canonical_json(raw.get()).map_err(|e| self.fail(e))
    }

    fn text<'de, D: Deserializer<'de>>(&self, d: D) -> Result<String, D::Error> {
        String::deserialize(d)
    }

    fn read_value<'de, D: Deserializer<'de>>(self, d: D) -> Result<Option<Value>, D::Error> {
        let ctx = self.ctx;
        let value = match self.field.kind() {
            FieldKind::Integer => Value::Integer(self.scalar(d)?),
            FieldKind::IntegerArray => Value::IntegerArray(self.scalars(d)?),
            FieldKind::Double => Value::Double(self.scalar(d)?),
            FieldKind::DoubleArray => Value::DoubleArray(self.scalars(d)?),
            FieldKind::String if self.field.is_json_content() => Value::String(self.opaque(d)?),
            FieldKind::String => Value::String(self.scalar(d)?),
            FieldKind::StringArray if self.field.is_json_content() => {
                let raws = Vec::<Box<RawValue>>::deserialize(d)?;
                let texts = raws
                    .iter()
                    .map(|raw| canonical_json(raw.get()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| self.fail::<D::Error>(e))?;
                Value::StringArray(texts)
            }
            FieldKind::StringArray => Value::StringArray(self.scalars(d)?),
            FieldKind::Boolean => Value::Boolean(self.scalar(d)?),
            FieldKind::BooleanArray => Value::BooleanArray(self.scalars(d)?),
            FieldKind::Long => Value::Long(self.scalar(d)?),
            FieldKind::LongArray => Value::LongArray(self.scalars(d)?),
            FieldKind::BigDecimal => {
                let raw = Box::<RawValue>::deserialize(d)?;
                Value::BigDecimal(decimal_from_raw(&raw).map_err(|m| self.fail::<D::Error>(m))?)
            }
            FieldKind::BigDecimalArray => {
                let raws = Vec::<Box<RawValue>>::deserialize(d)?;
                let decimals = raws
                    .iter()
                    .map(|raw| decimal_from_raw(raw))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|m| self.fail::<D::Error>(m))?;
                Value::BigDecimalArray(decimals)
            }
            FieldKind::Date => {
                let text = self.text(d)?;
                let date = date_format::parse_date(self.field, &text)
                    .map_err(|m| self.fail::<D::Error>(m))?;
                Value::Date(date)
            }
            FieldKind::DateTime => {
                let text = self.text(d)?;
                let parsed = date_format::parse_date_time(self.field, &text)
                    .map_err(|m| self.fail::<D::Error>(m))?;
                match parsed {
                    Some(dt) => Value::DateTime(dt),
                    None => return Ok(None),
                }
            }
            FieldKind::Blob => {
                let text = self.text(d)?;
                let bytes = STANDARD
                    .decode(text.as_bytes())
                    .map_err(|e| self.fail::<D::Error>(e))?;
                Value::Blob(bytes)
            }
            FieldKind::Record(target) => {
                Value::Record(Box::new(RecordSeed::new(ctx, *target, false).deserialize(d)?))
            }
            FieldKind::RecordArray(target)
                if self.field.has_annotation(builtin_types::AS_JSON_OBJECT) =>
            {
                let name_field =
                    value_as_field(ctx.pool, *target).map_err(|m| self.fail::<D::Error>(m))?;
                Value::RecordArray(d.deserialize_map(AsObjectVisitor {
                    ctx,
                    target: *target,
                    name_field,
                })?)
            }
            FieldKind::RecordArray(target) => {
                Value::RecordArray(SeqOf(RecordSeed::new(ctx, *target, false)).deserialize(d)?)
            }
            FieldKind::RecordUnion(targets) => {
                Value::Union(Box::new(self.union(targets, false).deserialize(d)?))
            }
            FieldKind::RecordUnionArray(targets) => {
                Value::UnionArray(SeqOf(self.union(targets, false)).deserialize(d)?)
            }
        };
        Ok(Some(value))
    }

    pub(crate) fn union(self, targets: &'a [TypeId], key_only: bool) -> UnionSeed<'a> {
        UnionSeed {
            ctx: self.ctx,
            owner: self.owner,
            field: self.field,
            targets,
            key_only,
        }
    }
}

impl<'de> DeserializeSeed<'de> for FieldSeed<'_> {
    type Value = Option<Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_option(self)
    }
}

impl<'de> Visitor<'de> for FieldSeed<'_> {
    type Value = Option<Value>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a {} value", self.field.kind().tag())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
        // Tag shape errors with the field; errors already parked win.
        self.read_value(d).map_err(|e| self.fail(e))
    }
}

/// Reads `{ "<TypeName>": { ... } }`, taking the first candidate property.
#[derive(Clone, Copy)]
pub(crate) struct UnionSeed<'a> {
    ctx: &'a DecodeContext<'a>,
    owner: &'a str,
    field: &'a Field,
    targets: &'a [TypeId],
    key_only: bool,
}

impl<'de> DeserializeSeed<'de> for UnionSeed<'_> {
    type Value = crate::model::Record;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for UnionSeed<'_> {
    type Value = crate::model::Record;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object keyed by a union candidate type name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let pool = self.ctx.pool;
        let mut found = None;
        while let Some(name) = map.next_key::<String>()? {
            let candidate = self.targets.iter().find(|&&t| pool.name(t) == name);
            match candidate {
                Some(&target) if found.is_none() => {
                    let seed = RecordSeed::new(self.ctx, target, self.key_only);
                    found = Some(map.next_value_seed(seed)?);
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        found.ok_or_else(|| {
            let candidates = self
                .targets
                .iter()
                .map(|&t| pool.name(t).to_string())
                .collect();
            self.ctx.errors.de(CodecError::schema_mismatch(
                field_context(self.owner, self.field),
                candidates,
            ))
        })
    }
}

/// Record array written as an object keyed by one string field.
struct AsObjectVisitor<'a> {
    ctx: &'a DecodeContext<'a>,
    target: TypeId,
    name_field: usize,
}

impl<'de> Visitor<'de> for AsObjectVisitor<'_> {
    type Value = Vec<crate::model::Record>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut records = Vec::new();
        while let Some(name) = map.next_key::<String>()? {
            let mut record = map.next_value_seed(RecordSeed::new(self.ctx, self.target, false))?;
            record.set(self.name_field, Value::String(name));
            records.push(record);
        }
        Ok(records)
    }
}

/// Applies a copyable seed to every element of an array.
pub(crate) struct SeqOf<S>(pub S);

impl<'de, S> DeserializeSeed<'de> for SeqOf<S>
where
    S: DeserializeSeed<'de> + Copy,
{
    type Value = Vec<S::Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, S> Visitor<'de> for SeqOf<S>
where
    S: DeserializeSeed<'de> + Copy,
{
    type Value = Vec<S::Value>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(self.0)? {
            out.push(item);
        }
        Ok(out)
    }
}
