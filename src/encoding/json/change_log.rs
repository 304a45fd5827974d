// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Change logs: JSON arrays of create, update and delete entries.
//!
//! ```text
//! [ { "state": "create", "_kind": "Person", "key": { "id": 7 },
//!     "newValue": { "name": "Ada", "boss": { "id": 1 } } },
//!   { "state": "delete", "_kind": "Person", "key": { "id": 3 },
//!     "oldValue": { "name": "Bob" } } ]
//! ```
//!
//! Record-valued fields inside `newValue` and `oldValue` are written as the
//! key of the record they point at. Reading happens in two steps:
//! [`decode_change_log`] collects the entries and remembers every
//! reference, then [`PendingChangeSet::resolve`] looks the referenced
//! records up, first among the records created by the log itself and then
//! through a [`RecordAccessor`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;

use serde::de::{DeserializeSeed, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use tracing::debug;

use super::context::{decode_str, read_to_string, DecodeContext, EncodeContext, RawObject};
use super::field::{FieldSeed, FieldValueSer, RefMode, SeqOf};
use super::record::{RecordSeed, RecordSer, KIND};
use crate::config::CodecOptions;
use crate::core::{CodecError, NoTypes, RecordAccessor, Result, TypeResolver, Value};
use crate::model::{
    ChangeSet, ChangeSetVisitor, ChangeSource, ChangeState, FieldValues, Key, Record, Side,
};
use crate::schema::{Field, FieldKind, TypeId, TypePool};

// =============================================================================
// Encoding
// =============================================================================

/// Field values of one side of an entry, key fields left out.
struct ValuesSer<'a> {
    ctx: &'a EncodeContext<'a>,
    values: &'a FieldValues,
}

impl Serialize for ValuesSer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let ty = self.ctx.pool.get(self.values.type_id());
        let mut map = s.serialize_map(None)?;
        for (index, value) in self.values.iter() {
            let Some(field) = ty.field(index) else {
                continue;
            };
            if field.is_key() {
                continue;
            }
            match value {
                Some(value) => map.serialize_entry(
                    field.name(),
                    &FieldValueSer {
                        ctx: self.ctx,
                        owner: ty.name(),
                        field,
                        value,
                        refs: RefMode::KeyOnly,
                    },
                )?,
                None => map.serialize_entry(field.name(), &())?,
            }
        }
        map.end()
    }
}

struct EntrySer<'a> {
    ctx: &'a EncodeContext<'a>,
    state: ChangeState,
    key: &'a Key,
    new: Option<&'a FieldValues>,
    old: Option<&'a FieldValues>,
}

impl Serialize for EntrySer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let pool = self.ctx.pool;
        let key_record = self.key.to_record(pool);
        let mut map = s.serialize_map(None)?;
        map.serialize_entry("state", self.state.as_str())?;
        map.serialize_entry(KIND, pool.name(self.key.type_id()))?;
        map.serialize_entry(
            "key",
            &RecordSer {
                ctx: self.ctx,
                record: &key_record,
                with_kind: false,
                key_only: true,
                skip: None,
            },
        )?;
        if let Some(values) = self.new {
            map.serialize_entry("newValue", &ValuesSer { ctx: self.ctx, values })?;
        }
        if let Some(values) = self.old {
            map.serialize_entry("oldValue", &ValuesSer { ctx: self.ctx, values })?;
        }
        map.end()
    }
}

/// Feeds visited entries into an open JSON array.
struct EntryWriter<'a, Q: SerializeSeq> {
    ctx: &'a EncodeContext<'a>,
    seq: Q,
    failed: Option<Q::Error>,
}

impl<Q: SerializeSeq> EntryWriter<'_, Q> {
    fn emit(
        &mut self,
        state: ChangeState,
        key: &Key,
        new: Option<&FieldValues>,
        old: Option<&FieldValues>,
    ) -> Result<()> {
        let entry = EntrySer {
            ctx: self.ctx,
            state,
            key,
            new,
            old,
        };
        self.seq.serialize_element(&entry).map_err(|e| {
            let message = e.to_string();
            self.failed = Some(e);
            CodecError::format("change log", message)
        })
    }
}

impl<Q: SerializeSeq> ChangeSetVisitor for EntryWriter<'_, Q> {
    fn visit_create(&mut self, key: &Key, new: &FieldValues) -> Result<()> {
        self.emit(ChangeState::Create, key, Some(new), None)
    }

    fn visit_update(&mut self, key: &Key, new: &FieldValues, old: &FieldValues) -> Result<()> {
        self.emit(ChangeState::Update, key, Some(new), Some(old))
    }

    fn visit_delete(&mut self, key: &Key, old: &FieldValues) -> Result<()> {
        self.emit(ChangeState::Delete, key, None, Some(old))
    }
}

struct ChangeLogSer<'a> {
    ctx: &'a EncodeContext<'a>,
    source: &'a dyn ChangeSource,
}

impl Serialize for ChangeLogSer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut writer = EntryWriter {
            ctx: self.ctx,
            seq: s.serialize_seq(None)?,
            failed: None,
        };
        let visited = self.source.visit(&mut writer);
        if let Some(e) = writer.failed {
            return Err(e);
        }
        if let Err(e) = visited {
            return Err(self.ctx.errors.ser(e));
        }
        writer.seq.end()
    }
}

/// Encode the entries of `source` as a change log.
pub fn encode_change_set(
    pool: &TypePool,
    source: &dyn ChangeSource,
    options: &CodecOptions,
) -> Result<String> {
    let ctx = EncodeContext::new(pool, options);
    ctx.to_string(&ChangeLogSer { ctx: &ctx, source })
}

pub fn write_change_set<W: io::Write>(
    pool: &TypePool,
    writer: W,
    source: &dyn ChangeSource,
    options: &CodecOptions,
) -> Result<()> {
    let ctx = EncodeContext::new(pool, options);
    ctx.write(writer, &ChangeLogSer { ctx: &ctx, source })
}

// =============================================================================
// Decoding
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawEntry {
    state: String,
    #[serde(rename = "_kind")]
    kind: String,
    key: Box<RawValue>,
    #[serde(rename = "newValue")]
    new_value: Option<Box<RawValue>>,
    #[serde(rename = "oldValue")]
    old_value: Option<Box<RawValue>>,
}

/// Keys a reference field points at, by field shape.
#[derive(Debug, Clone)]
enum RefTarget {
    One(Key),
    Many(Vec<Key>),
    UnionOne(Key),
    UnionMany(Vec<Key>),
}

/// A reference waiting for its record.
#[derive(Debug, Clone)]
struct Patch {
    key: Key,
    side: Side,
    field: usize,
    target: RefTarget,
}

type References = Vec<(usize, RefTarget)>;

struct LogReader<'a> {
    ctx: DecodeContext<'a>,
    changes: ChangeSet,
    patches: Vec<Patch>,
}

impl<'a> LogReader<'a> {
    fn read_entry(&mut self, entry: RawEntry, resolver: &dyn TypeResolver) -> Result<()> {
        let pool = self.ctx.pool;
        let state = ChangeState::parse(&entry.state).ok_or_else(|| {
            CodecError::format("change log", format!("unknown state '{}'", entry.state))
        })?;
        let type_id = resolver.get_type(pool, &entry.kind)?;
        let key = self
            .ctx
            .decode(entry.key.get(), RecordSeed::new(&self.ctx, type_id, true))?
            .key(pool)?;

        let (new, new_refs) = self.read_side(type_id, entry.new_value.as_deref())?;
        let (old, old_refs) = self.read_side(type_id, entry.old_value.as_deref())?;

        // A later value replaces an earlier pending reference on the new side;
        // on the old side the first value seen for a field is kept.
        let new_fields: Vec<usize> = new.iter().map(|(f, _)| f).collect();
        self.patches
            .retain(|p| !(p.key == key && p.side == Side::New && new_fields.contains(&p.field)));
        let old_before: HashSet<usize> = self
            .changes
            .values_mut(&key, Side::Old)
            .map(|values| values.iter().map(|(f, _)| f).collect())
            .unwrap_or_default();

        match state {
            ChangeState::Create => self.changes.create(key.clone(), new)?,
            ChangeState::Update => self.changes.update(key.clone(), new, old)?,
            ChangeState::Delete => self.changes.delete(key.clone(), old)?,
        }

        if state == ChangeState::Delete {
            // A delete discards the new side; deleting a create drops the entry.
            let cancelled = self.changes.get(&key).is_none();
            self.patches
                .retain(|p| !(p.key == key && (cancelled || p.side == Side::New)));
            if cancelled {
                return Ok(());
            }
        }

        for (field, target) in new_refs {
            self.patches
                .retain(|p| !(p.key == key && p.side == Side::New && p.field == field));
            self.patches.push(Patch {
                key: key.clone(),
                side: Side::New,
                field,
                target,
            });
        }
        for (field, target) in old_refs {
            let known = old_before.contains(&field)
                || self
                    .patches
                    .iter()
                    .any(|p| p.key == key && p.side == Side::Old && p.field == field);
            if !known {
                self.patches.push(Patch {
                    key: key.clone(),
                    side: Side::Old,
                    field,
                    target,
                });
            }
        }
        Ok(())
    }

    /// Read `newValue` or `oldValue`: plain values now, references later.
    fn read_side(
        &self,
        type_id: TypeId,
        raw: Option<&RawValue>,
    ) -> Result<(FieldValues, References)> {
        let mut values = FieldValues::new(type_id);
        let mut refs = Vec::new();
        let Some(raw) = raw else {
            return Ok((values, refs));
        };

        let ty = self.ctx.pool.get(type_id);
        let object: RawObject = serde_json::from_str(raw.get())?;
        for (name, raw) in object.0 {
            let field = ty.field_by_name(&name).ok_or_else(|| {
                CodecError::format(ty.name(), format!("unknown field '{name}'"))
            })?;
            if raw.get() == "null" {
                values.set(field.index(), None);
            } else if field.kind().is_reference() {
                refs.push((field.index(), self.read_reference(ty.name(), field, &raw)?));
            } else {
                let seed = FieldSeed {
                    ctx: &self.ctx,
                    owner: ty.name(),
                    field,
                };
                values.set(field.index(), self.ctx.decode(raw.get(), seed)?);
            }
        }
        Ok((values, refs))
    }

    fn read_reference(&self, owner: &str, field: &Field, raw: &RawValue) -> Result<RefTarget> {
        let ctx = &self.ctx;
        let pool = ctx.pool;
        let keys = |records: Vec<Record>| -> Result<Vec<Key>> {
            records.iter().map(|r| r.key(pool)).collect()
        };
        let seed = FieldSeed { ctx, owner, field };
        Ok(match field.kind() {
            FieldKind::Record(t) => {
                RefTarget::One(ctx.decode(raw.get(), RecordSeed::new(ctx, *t, true))?.key(pool)?)
            }
            FieldKind::RecordArray(t) => RefTarget::Many(keys(
                ctx.decode(raw.get(), SeqOf(RecordSeed::new(ctx, *t, true)))?,
            )?),
            FieldKind::RecordUnion(ts) => {
                RefTarget::UnionOne(ctx.decode(raw.get(), seed.union(ts, true))?.key(pool)?)
            }
            FieldKind::RecordUnionArray(ts) => {
                RefTarget::UnionMany(keys(ctx.decode(raw.get(), SeqOf(seed.union(ts, true)))?)?)
            }
            other => {
                return Err(CodecError::format(
                    format!("{owner}.{}", field.name()),
                    format!("{} is not a reference kind", other.tag()),
                ))
            }
        })
    }
}

/// A decoded change log whose references are not resolved yet.
#[derive(Debug)]
pub struct PendingChangeSet<'p> {
    pool: &'p TypePool,
    changes: ChangeSet,
    patches: Vec<Patch>,
}

impl<'p> PendingChangeSet<'p> {
    /// Entries as decoded, reference fields not yet filled in.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Number of references still to resolve.
    pub fn pending_references(&self) -> usize {
        self.patches.len()
    }

    /// Fill in every reference and return the finished change set.
    ///
    /// A referenced key created by this same log resolves to a record built
    /// from the log's own values, without asking `accessor`. Any other key
    /// that `accessor` does not know fails with
    /// [`CodecError::ReferenceNotFound`].
    pub fn resolve(self, accessor: impl RecordAccessor) -> Result<ChangeSet> {
        let pool = self.pool;
        let mut changes = self.changes;
        let mut fetched: HashMap<Key, Record> = HashMap::new();
        let total = self.patches.len();
        let mut applied = 0;

        for patch in self.patches {
            if changes.values_mut(&patch.key, patch.side).is_none() {
                continue;
            }
            let mut lookup = |key: &Key| fetch(pool, &changes, &mut fetched, &accessor, key);
            let value = match &patch.target {
                RefTarget::One(key) => Value::Record(Box::new(lookup(key)?)),
                RefTarget::Many(keys) => {
                    Value::RecordArray(keys.iter().map(&mut lookup).collect::<Result<_>>()?)
                }
                RefTarget::UnionOne(key) => Value::Union(Box::new(lookup(key)?)),
                RefTarget::UnionMany(keys) => {
                    Value::UnionArray(keys.iter().map(&mut lookup).collect::<Result<_>>()?)
                }
            };
            if let Some(values) = changes.values_mut(&patch.key, patch.side) {
                values.set(patch.field, Some(value));
                applied += 1;
            }
        }

        debug!(
            references = total,
            applied = applied,
            from_log = fetched.len(),
            "resolved change log"
        );
        Ok(changes)
    }
}

fn fetch(
    pool: &TypePool,
    changes: &ChangeSet,
    fetched: &mut HashMap<Key, Record>,
    accessor: &impl RecordAccessor,
    key: &Key,
) -> Result<Record> {
    if let Some(record) = fetched.get(key) {
        return Ok(record.clone());
    }
    if changes.is_created(key) {
        let record = changes
            .get(key)
            .and_then(|entry| entry.new_values())
            .map(|values| values.to_record(pool, key))
            .unwrap_or_else(|| key.to_record(pool));
        fetched.insert(key.clone(), record.clone());
        return Ok(record);
    }
    accessor
        .get_record(key)
        .ok_or_else(|| CodecError::reference_not_found(key.describe(pool)))
}

/// Hands the entries of a change log to a [`LogReader`] one at a time.
struct EntriesSeed<'r, 'a> {
    reader: &'r mut LogReader<'a>,
    resolver: &'r dyn TypeResolver,
}

impl<'de> DeserializeSeed<'de> for EntriesSeed<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, d: D) -> std::result::Result<(), D::Error> {
        d.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for EntriesSeed<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of change log entries")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        while let Some(entry) = seq.next_element::<RawEntry>()? {
            if let Err(e) = self.reader.read_entry(entry, self.resolver) {
                return Err(self.reader.ctx.errors.de(e));
            }
        }
        Ok(())
    }
}

/// Decode a change log. Entry types are resolved by their `_kind`.
pub fn decode_change_log<'p>(
    pool: &'p TypePool,
    json: &str,
    resolver: &dyn TypeResolver,
) -> Result<PendingChangeSet<'p>> {
    let mut reader = LogReader {
        ctx: DecodeContext::new(pool, &NoTypes),
        changes: ChangeSet::new(),
        patches: Vec::new(),
    };
    let read = decode_str(
        json,
        EntriesSeed {
            reader: &mut reader,
            resolver,
        },
    );
    reader.ctx.errors.finish(read)?;
    debug!(
        entries = reader.changes.len(),
        references = reader.patches.len(),
        "decoded change log"
    );
    Ok(PendingChangeSet {
        pool,
        changes: reader.changes,
        patches: reader.patches,
    })
}

pub fn read_change_log<'p, R: io::Read>(
    pool: &'p TypePool,
    reader: R,
    resolver: &dyn TypeResolver,
) -> Result<PendingChangeSet<'p>> {
    decode_change_log(pool, &read_to_string(reader)?, resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PoolTypes;
    use crate::schema::TypeBuilder;

    fn pool() -> (TypePool, TypeId) {
        let mut pool = TypePool::new();
        let node = pool.declare("Node").unwrap();
        pool.add(
            TypeBuilder::new("Node")
                .key_field("id", FieldKind::Integer)
                .field("label", FieldKind::String)
                .field("parent", FieldKind::Record(node)),
        )
        .unwrap();
        (pool, node)
    }

    fn key(node: TypeId, id: i32) -> Key {
        Key::new(node, vec![Value::Integer(id)])
    }

    #[test]
    fn test_encode_skips_key_fields_and_writes_clears() {
        let (pool, node) = pool();
        let mut changes = ChangeSet::new();
        let new = FieldValues::new(node)
            .with(&pool, "id", Some(Value::Integer(1)))
            .unwrap()
            .with(&pool, "label", Some(Value::from("root")))
            .unwrap();
        let old = FieldValues::new(node).with(&pool, "label", None).unwrap();
        changes.update(key(node, 1), new, old).unwrap();

        let json = encode_change_set(&pool, &changes, &CodecOptions::default()).unwrap();
        assert_eq!(
            json,
            r#"[{"state":"update","_kind":"Node","key":{"id":1},"newValue":{"label":"root"},"oldValue":{"label":null}}]"#
        );
    }

    #[test]
    fn test_unknown_state() {
        let (pool, _) = pool();
        let err = decode_change_log(
            &pool,
            r#"[{"state":"upsert","_kind":"Node","key":{"id":1}}]"#,
            &PoolTypes,
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::Format { .. }));
    }

    #[test]
    fn test_unknown_field_names_type() {
        let (pool, _) = pool();
        let err = decode_change_log(
            &pool,
            r#"[{"state":"create","_kind":"Node","key":{"id":1},"newValue":{"colour":"red"}}]"#,
            &PoolTypes,
        )
        .unwrap_err();
        match err {
            CodecError::Format { context, message } => {
                assert_eq!(context, "Node");
                assert!(message.contains("colour"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_reference() {
        let (pool, _) = pool();
        let pending = decode_change_log(
            &pool,
            r#"[{"state":"create","_kind":"Node","key":{"id":2},"newValue":{"parent":{"id":9}}}]"#,
            &PoolTypes,
        )
        .unwrap();
        assert_eq!(pending.pending_references(), 1);
        let err = pending.resolve(|_: &Key| -> Option<Record> { None }).unwrap_err();
        match err {
            CodecError::ReferenceNotFound { key } => assert_eq!(key, "Node[id=9]"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_delete_drops_new_side_references() {
        let (pool, node) = pool();
        let pending = decode_change_log(
            &pool,
            r#"[
                {"state":"update","_kind":"Node","key":{"id":2},"newValue":{"parent":{"id":9}},"oldValue":{"parent":{"id":1}}},
                {"state":"delete","_kind":"Node","key":{"id":2},"oldValue":{"label":"two"}}
            ]"#,
            &PoolTypes,
        )
        .unwrap();
        assert_eq!(pending.pending_references(), 1);

        let parent = Record::new(&pool, node).with(&pool, "id", 1).unwrap();
        let changes = pending
            .resolve(|k: &Key| (*k == key(node, 1)).then(|| parent.clone()))
            .unwrap();
        let old = changes.get(&key(node, 2)).unwrap().old_values().unwrap();
        assert_eq!(old.get(2), Some(Some(&Value::Record(Box::new(parent)))));
    }

    #[test]
    fn test_later_clear_replaces_pending_reference() {
        let (pool, node) = pool();
        let changes = decode_change_log(
            &pool,
            r#"[
                {"state":"create","_kind":"Node","key":{"id":2},"newValue":{"parent":{"id":9}}},
                {"state":"update","_kind":"Node","key":{"id":2},"newValue":{"parent":null},"oldValue":{}}
            ]"#,
            &PoolTypes,
        )
        .unwrap()
        .resolve(|_: &Key| -> Option<Record> { None })
        .unwrap();
        let new = changes.get(&key(node, 2)).unwrap().new_values().unwrap();
        assert_eq!(new.get(2), Some(None));
    }
}
