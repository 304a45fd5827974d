// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Record codec.
//!
//! A record is a JSON object holding its set fields in declared order,
//! optionally preceded by a `_kind` discriminator naming its type:
//!
//! ```text
//! { "_kind": "Person", "id": 7, "name": "Ada" }
//! ```
//!
//! Unset fields are omitted, explicit `null` reads back as unset, and
//! properties that are not declared fields are skipped.

use std::fmt;
use std::io;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::value::RawValue;

use super::context::{canonical_json, decode_str, read_to_string, DecodeContext, EncodeContext};
use super::field::{FieldSeed, FieldValueSer, RefMode, SeqOf};
use crate::config::CodecOptions;
use crate::core::{CodecError, NoTypes, Result, TypeResolver};
use crate::model::{Key, Record};
use crate::schema::{Field, RecordType, TypeId, TypePool};

/// Discriminator property naming a record's type.
pub const KIND: &str = "_kind";

// =============================================================================
// Encoding
// =============================================================================

pub(crate) struct RecordSer<'a> {
    pub ctx: &'a EncodeContext<'a>,
    pub record: &'a Record,
    pub with_kind: bool,
    pub key_only: bool,
    /// Field left out of the object, used by `asJsonObject` arrays.
    pub skip: Option<usize>,
}

impl Serialize for RecordSer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let ty = self.ctx.pool.get(self.record.type_id());
        if self.key_only && !ty.has_key() {
            return Err(self.ctx.errors.ser(CodecError::format(
                ty.name(),
                "type has no key fields and cannot be referenced",
            )));
        }

        let refs = if self.key_only {
            RefMode::KeyOnly
        } else {
            RefMode::Full
        };
        let mut map = s.serialize_map(None)?;
        if self.with_kind {
            map.serialize_entry(KIND, ty.name())?;
        }
        for field in written_fields(ty, self.key_only) {
            if self.skip == Some(field.index()) {
                continue;
            }
            if let Some(value) = self.record.get(field.index()) {
                let value = FieldValueSer {
                    ctx: self.ctx,
                    owner: ty.name(),
                    field,
                    value,
                    refs,
                };
                map.serialize_entry(field.name(), &value)?;
            }
        }
        map.end()
    }
}

fn written_fields(ty: &RecordType, key_only: bool) -> Box<dyn Iterator<Item = &Field> + '_> {
    if key_only {
        Box::new(ty.key_fields().iter().filter_map(|&i| ty.field(i)))
    } else {
        Box::new(ty.fields().iter())
    }
}

// =============================================================================
// Decoding
// =============================================================================

fn wanted<'t>(ty: &'t RecordType, name: &str, key_only: bool) -> Option<&'t Field> {
    ty.field_by_name(name).filter(|f| !key_only || f.is_key())
}

/// Stream the remaining properties of `map` into `record`.
fn read_fields<'de, 'a, A: MapAccess<'de>>(
    ctx: &'a DecodeContext<'a>,
    ty: &'a RecordType,
    key_only: bool,
    record: &mut Record,
    map: &mut A,
) -> std::result::Result<(), A::Error> {
    while let Some(name) = map.next_key::<String>()? {
        match wanted(ty, &name, key_only) {
            Some(field) => {
                let value = map.next_value_seed(FieldSeed {
                    ctx,
                    owner: ty.name(),
                    field,
                })?;
                record.put(field.index(), value);
            }
            None => {
                map.next_value::<IgnoredAny>()?;
            }
        }
    }
    Ok(())
}

/// Reads a record of a known type.
#[derive(Clone, Copy)]
pub(crate) struct RecordSeed<'a> {
    ctx: &'a DecodeContext<'a>,
    type_id: TypeId,
    key_only: bool,
}

impl<'a> RecordSeed<'a> {
    pub fn new(ctx: &'a DecodeContext<'a>, type_id: TypeId, key_only: bool) -> Self {
        Self {
            ctx,
            type_id,
            key_only,
        }
    }
}

impl<'de> DeserializeSeed<'de> for RecordSeed<'_> {
    type Value = Record;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Record, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RecordSeed<'_> {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a '{}' object", self.ctx.pool.name(self.type_id))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Record, A::Error> {
        let ty = self.ctx.pool.get(self.type_id);
        let mut record = Record::new(self.ctx.pool, self.type_id);
        read_fields(self.ctx, ty, self.key_only, &mut record, &mut map)?;
        Ok(record)
    }
}

/// Reads a record whose type is named by its `_kind` property.
///
/// Properties seen before `_kind` are held as raw JSON and decoded once the
/// type is known; everything after it streams straight into the record.
#[derive(Clone, Copy)]
pub(crate) struct KindRecordSeed<'a> {
    ctx: &'a DecodeContext<'a>,
    key_only: bool,
}

impl<'a> KindRecordSeed<'a> {
    pub fn new(ctx: &'a DecodeContext<'a>, key_only: bool) -> Self {
        Self { ctx, key_only }
    }
}

impl<'de> DeserializeSeed<'de> for KindRecordSeed<'_> {
    type Value = Record;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Record, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for KindRecordSeed<'_> {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object with a '_kind' property")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Record, A::Error> {
        let ctx = self.ctx;
        let mut buffered: Vec<(String, Box<RawValue>)> = Vec::new();
        while let Some(name) = map.next_key::<String>()? {
            if name != KIND {
                buffered.push((name, map.next_value()?));
                continue;
            }

            let kind: String = map.next_value()?;
            let type_id = ctx
                .resolver
                .get_type(ctx.pool, &kind)
                .map_err(|e| ctx.errors.de::<A::Error>(e))?;
            let ty = ctx.pool.get(type_id);
            let mut record = Record::new(ctx.pool, type_id);
            for (name, raw) in &buffered {
                if let Some(field) = wanted(ty, name, self.key_only) {
                    let seed = FieldSeed {
                        ctx,
                        owner: ty.name(),
                        field,
                    };
                    let value = decode_str(raw.get(), seed)
                        .map_err(<A::Error as de::Error>::custom)?;
                    record.put(field.index(), value);
                }
            }
            read_fields(ctx, ty, self.key_only, &mut record, &mut map)?;
            return Ok(record);
        }
        Err(ctx
            .errors
            .de(CodecError::format("record", "missing '_kind' property")))
    }
}

struct ForEach<'a, F> {
    seed: RecordSeed<'a>,
    callback: F,
}

impl<'de, F: FnMut(Record) -> Result<()>> Visitor<'de> for ForEach<'_, F> {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of records")
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> std::result::Result<usize, A::Error> {
        let mut count = 0;
        while let Some(record) = seq.next_element_seed(self.seed)? {
            (self.callback)(record).map_err(|e| self.seed.ctx.errors.de::<A::Error>(e))?;
            count += 1;
        }
        Ok(count)
    }
}

impl<'de, F: FnMut(Record) -> Result<()>> DeserializeSeed<'de> for ForEach<'_, F> {
    type Value = usize;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<usize, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

/// Decode a record of a known type without any resolver.
pub(crate) fn decode_record_str(
    pool: &TypePool,
    json: &str,
    type_id: TypeId,
    key_only: bool,
) -> Result<Record> {
    let ctx = DecodeContext::new(pool, &NoTypes);
    ctx.decode(json, RecordSeed::new(&ctx, type_id, key_only))
}

// =============================================================================
// Public codec
// =============================================================================

/// Encodes and decodes records of the types in one pool.
///
/// ```
/// use recordcodec::encoding::json::RecordCodec;
/// use recordcodec::model::Record;
/// use recordcodec::schema::{FieldKind, TypeBuilder, TypePool};
///
/// let mut pool = TypePool::new();
/// let point = pool
///     .add(TypeBuilder::new("Point").field("x", FieldKind::Double).field("y", FieldKind::Double))
///     .unwrap();
/// let record = Record::new(&pool, point).with(&pool, "x", 2.0).unwrap();
///
/// let codec = RecordCodec::new(&pool);
/// let json = codec.encode(&record, true).unwrap();
/// assert_eq!(json, r#"{"_kind":"Point","x":2.0}"#);
/// assert_eq!(codec.decode(&json, point).unwrap(), record);
/// ```
pub struct RecordCodec<'p> {
    pool: &'p TypePool,
    options: CodecOptions,
}

impl<'p> RecordCodec<'p> {
    pub fn new(pool: &'p TypePool) -> Self {
        Self::with_options(pool, CodecOptions::default())
    }

    pub fn with_options(pool: &'p TypePool, options: CodecOptions) -> Self {
        Self { pool, options }
    }

    pub fn pool(&self) -> &'p TypePool {
        self.pool
    }

    fn ser<'a>(&self, ctx: &'a EncodeContext<'a>, record: &'a Record, with_kind: bool) -> RecordSer<'a> {
        RecordSer {
            ctx,
            record,
            with_kind,
            key_only: false,
            skip: None,
        }
    }

    /// Encode `record`, with a leading `_kind` if `include_kind`.
    pub fn encode(&self, record: &Record, include_kind: bool) -> Result<String> {
        let ctx = EncodeContext::new(self.pool, &self.options);
        ctx.to_string(&self.ser(&ctx, record, include_kind))
    }

    pub fn write<W: io::Write>(&self, writer: W, record: &Record, include_kind: bool) -> Result<()> {
        let ctx = EncodeContext::new(self.pool, &self.options);
        ctx.write(writer, &self.ser(&ctx, record, include_kind))
    }

    /// Encode only the key fields of `record`.
    pub fn encode_key_only(&self, record: &Record) -> Result<String> {
        let ctx = EncodeContext::new(self.pool, &self.options);
        ctx.to_string(&RecordSer {
            key_only: true,
            ..self.ser(&ctx, record, false)
        })
    }

    /// Encode a standalone key as `{ "_kind": ..., <key fields> }`.
    pub fn encode_key(&self, key: &Key) -> Result<String> {
        let record = key.to_record(self.pool);
        let ctx = EncodeContext::new(self.pool, &self.options);
        ctx.to_string(&RecordSer {
            key_only: true,
            ..self.ser(&ctx, &record, true)
        })
    }

    /// Encode records as one JSON array.
    pub fn encode_all(&self, records: &[Record], include_kind: bool) -> Result<String> {
        let ctx = EncodeContext::new(self.pool, &self.options);
        let items: Vec<RecordSer<'_>> = records
            .iter()
            .map(|r| self.ser(&ctx, r, include_kind))
            .collect();
        ctx.to_string(&items)
    }

    /// Start a JSON array on `writer` that records are pushed to one by one.
    pub fn array_writer<W: io::Write>(
        &self,
        writer: W,
        include_kind: bool,
    ) -> Result<RecordArrayWriter<'p, W>> {
        RecordArrayWriter::begin(self.pool, &self.options, writer, include_kind)
    }

    pub fn decode(&self, json: &str, type_id: TypeId) -> Result<Record> {
        decode_record_str(self.pool, json, type_id, false)
    }

    pub fn read<R: io::Read>(&self, reader: R, type_id: TypeId) -> Result<Record> {
        self.decode(&read_to_string(reader)?, type_id)
    }

    /// Decode a key-only object; non-key properties are skipped.
    pub fn decode_key_only(&self, json: &str, type_id: TypeId) -> Result<Record> {
        decode_record_str(self.pool, json, type_id, true)
    }

    /// Decode a record whose type comes from its `_kind` property.
    pub fn decode_with_kind(&self, json: &str, resolver: &dyn TypeResolver) -> Result<Record> {
        let ctx = DecodeContext::new(self.pool, resolver);
        ctx.decode(json, KindRecordSeed::new(&ctx, false))
    }

    pub fn read_with_kind<R: io::Read>(
        &self,
        reader: R,
        resolver: &dyn TypeResolver,
    ) -> Result<Record> {
        self.decode_with_kind(&read_to_string(reader)?, resolver)
    }

    /// Decode a standalone key written by [`encode_key`](Self::encode_key).
    pub fn decode_key(&self, json: &str, resolver: &dyn TypeResolver) -> Result<Key> {
        let ctx = DecodeContext::new(self.pool, resolver);
        let record = ctx.decode(json, KindRecordSeed::new(&ctx, true))?;
        record.key(self.pool)
    }

    /// Decode a JSON array of records of one type.
    pub fn decode_all(&self, json: &str, type_id: TypeId) -> Result<Vec<Record>> {
        let ctx = DecodeContext::new(self.pool, &NoTypes);
        ctx.decode(json, SeqOf(RecordSeed::new(&ctx, type_id, false)))
    }

    /// Stream a JSON array of records into `callback`, returning the count.
    ///
    /// An error from `callback` stops the read and is returned as is.
    pub fn for_each<F>(&self, json: &str, type_id: TypeId, callback: F) -> Result<usize>
    where
        F: FnMut(Record) -> Result<()>,
    {
        let ctx = DecodeContext::new(self.pool, &NoTypes);
        let seed = ForEach {
            seed: RecordSeed::new(&ctx, type_id, false),
            callback,
        };
        ctx.decode(json, seed)
    }
}

/// Writes a JSON array of records incrementally. Output is always compact.
pub struct RecordArrayWriter<'p, W: io::Write> {
    pool: &'p TypePool,
    options: CodecOptions,
    writer: W,
    include_kind: bool,
    count: usize,
}

impl<'p, W: io::Write> RecordArrayWriter<'p, W> {
    fn begin(
        pool: &'p TypePool,
        options: &CodecOptions,
        mut writer: W,
        include_kind: bool,
    ) -> Result<Self> {
        writer.write_all(b"[")?;
        Ok(Self {
            pool,
            options: options.clone().with_pretty(false),
            writer,
            include_kind,
            count: 0,
        })
    }

    pub fn push(&mut self, record: &Record) -> Result<()> {
        if self.count > 0 {
            self.writer.write_all(b",")?;
        }
        let ctx = EncodeContext::new(self.pool, &self.options);
        let item = RecordSer {
            ctx: &ctx,
            record,
            with_kind: self.include_kind,
            key_only: false,
            skip: None,
        };
        ctx.write(&mut self.writer, &item)?;
        self.count += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Close the array and hand back the writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.write_all(b"]")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Re-serialize JSON text compactly, keeping property order.
pub fn normalize(json: &str) -> Result<String> {
    Ok(canonical_json(json)?)
}
