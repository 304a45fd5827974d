// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Schema codec: record types as JSON descriptors.
//!
//! ```text
//! { "kind": "Person",
//!   "fields": [ { "name": "id", "type": "int",
//!                 "annotations": [ { "_kind": "KeyAnnotation", "index": 0 } ] },
//!               { "name": "boss", "type": "record", "kind": "Person" } ] }
//! ```
//!
//! Annotations are records written with their `_kind`. Decoding builds the
//! type inside a [`TypePool`]: the type is reserved under its name first,
//! so fields may refer back to it, and completed once every field is known.
//! A failed decode leaves the pool as it was.

use std::collections::HashMap;
use std::io;

use serde::ser::Serializer;
use serde::Serialize;
use serde_json::value::RawValue;
use tracing::{debug, error, warn};

use super::context::{canonical_json, raw_json, read_to_string, EncodeContext};
use super::record::{decode_record_str, RecordSer};
use crate::config::CodecOptions;
use crate::core::{CodecError, Result, TypeResolver, Value};
use crate::model::Record;
use crate::schema::builtin_types::{self, unknown_annotation};
use crate::schema::descriptor::{
    FieldDescriptorOut, KindProbe, RawFieldDescriptor, RawTypeDescriptor, TypeDescriptorOut,
};
use crate::schema::{Field, FieldKind, KindTag, TypeId, TypePool};

// =============================================================================
// Encoding
// =============================================================================

/// One annotation record.
struct AnnotationSer<'a> {
    ctx: &'a EncodeContext<'a>,
    record: &'a Record,
}

impl Serialize for AnnotationSer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        if self.record.type_id() == builtin_types::UNKNOWN_ANNOTATION {
            // Preserved verbatim, including its original `_kind`.
            let content = self
                .record
                .get(unknown_annotation::CONTENT)
                .and_then(Value::as_str)
                .unwrap_or("null");
            let raw = raw_json(content.to_string())
                .map_err(|m| self.ctx.errors.ser::<S::Error>(CodecError::format("annotation", m)))?;
            return raw.serialize(s);
        }
        RecordSer {
            ctx: self.ctx,
            record: self.record,
            with_kind: true,
            key_only: false,
            skip: None,
        }
        .serialize(s)
    }
}

fn annotations_out<'a>(
    ctx: &'a EncodeContext<'a>,
    records: impl Iterator<Item = &'a Record>,
) -> Vec<AnnotationSer<'a>> {
    let mut out: Vec<AnnotationSer<'a>> = records.map(|record| AnnotationSer { ctx, record }).collect();
    if ctx.options.sort_annotations {
        out.sort_by_key(|a| ctx.pool.name(a.record.type_id()));
    }
    out
}

/// Whether an annotation merely restates the field's own name.
fn is_implied_name(field: &Field, annotation: &Record) -> bool {
    annotation.type_id() == builtin_types::FIELD_NAME
        && annotation.get(0).and_then(Value::as_str) == Some(field.name())
}

/// One type descriptor.
pub(crate) struct TypeSer<'a> {
    pub ctx: &'a EncodeContext<'a>,
    pub type_id: TypeId,
}

impl Serialize for TypeSer<'_> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let pool = self.ctx.pool;
        let ty = pool.get(self.type_id);
        if !ty.is_complete() {
            return Err(self.ctx.errors.ser(CodecError::schema_definition(
                ty.name(),
                "type is only declared",
            )));
        }

        let fields = ty
            .fields()
            .iter()
            .map(|field| {
                let (kind, kinds) = match field.kind() {
                    FieldKind::Record(t) | FieldKind::RecordArray(t) => (Some(pool.name(*t)), None),
                    FieldKind::RecordUnion(ts) | FieldKind::RecordUnionArray(ts) => {
                        (None, Some(ts.iter().map(|&t| pool.name(t)).collect()))
                    }
                    _ => (None, None),
                };
                FieldDescriptorOut {
                    name: field.name(),
                    tag: field.kind().tag(),
                    kind,
                    kinds,
                    annotations: annotations_out(
                        self.ctx,
                        field
                            .annotations()
                            .iter()
                            .filter(|a| !is_implied_name(field, a)),
                    ),
                }
            })
            .collect();

        TypeDescriptorOut {
            kind: ty.name(),
            fields,
            annotations: annotations_out(self.ctx, ty.annotations().iter()),
        }
        .serialize(s)
    }
}

/// Encode the descriptor of one type.
pub fn encode_type(pool: &TypePool, type_id: TypeId, options: &CodecOptions) -> Result<String> {
    let ctx = EncodeContext::new(pool, options);
    ctx.to_string(&TypeSer { ctx: &ctx, type_id })
}

pub fn write_type<W: io::Write>(
    pool: &TypePool,
    writer: W,
    type_id: TypeId,
    options: &CodecOptions,
) -> Result<()> {
    let ctx = EncodeContext::new(pool, options);
    ctx.write(writer, &TypeSer { ctx: &ctx, type_id })
}

// =============================================================================
// Decoding
// =============================================================================

/// Builds types from raw descriptors, resolving names as it goes.
///
/// Names resolve against, in order: types under construction in this call,
/// the caller's resolver, descriptors still waiting to be built, and the
/// builtin annotation types.
pub(crate) struct SchemaBuilder<'p, 'r> {
    pool: &'p mut TypePool,
    resolver: &'r dyn TypeResolver,
    options: &'r CodecOptions,
    pending: HashMap<String, RawTypeDescriptor>,
    local: HashMap<String, TypeId>,
}

impl<'p, 'r> SchemaBuilder<'p, 'r> {
    pub fn new(
        pool: &'p mut TypePool,
        resolver: &'r dyn TypeResolver,
        options: &'r CodecOptions,
    ) -> Self {
        Self {
            pool,
            resolver,
            options,
            pending: HashMap::new(),
            local: HashMap::new(),
        }
    }

    /// Queue a descriptor to be built when first referenced.
    pub fn defer(&mut self, descriptor: RawTypeDescriptor) -> Result<()> {
        let name = descriptor
            .kind
            .clone()
            .ok_or_else(|| CodecError::schema_definition(descriptor.name(), "missing 'kind'"))?;
        if self.pending.contains_key(&name) {
            return Err(CodecError::schema_definition(name, "defined more than once"));
        }
        self.pending.insert(name, descriptor);
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether `name` would resolve.
    fn knows(&self, name: &str) -> bool {
        self.local.contains_key(name)
            || self.resolver.find_type(&*self.pool, name).is_some()
            || self.pending.contains_key(name)
            || builtin_types::find(name).is_some()
    }

    pub fn resolve(&mut self, name: &str) -> Result<TypeId> {
        if let Some(&id) = self.local.get(name) {
            return Ok(id);
        }
        if let Some(id) = self.resolver.find_type(&*self.pool, name) {
            return Ok(id);
        }
        if let Some(descriptor) = self.pending.remove(name) {
            return self.build(descriptor);
        }
        builtin_types::find(name).ok_or_else(|| CodecError::type_not_found(name))
    }

    /// Build `descriptor` into a complete type.
    pub fn build(&mut self, descriptor: RawTypeDescriptor) -> Result<TypeId> {
        let name = match &descriptor.kind {
            Some(name) => name.clone(),
            None => {
                return Err(CodecError::schema_definition(
                    descriptor.name(),
                    "missing 'kind'",
                ))
            }
        };
        if let Some(id) = builtin_types::find(&name) {
            return Ok(id);
        }

        let id = self.pool.reserve(&name)?;
        self.local.insert(name.clone(), id);

        let mut fields = Vec::new();
        for (property, raw) in descriptor.fields.map(|f| f.0).unwrap_or_default() {
            fields.push(self.field(&name, property, raw)?);
        }
        let annotations = self.annotations(descriptor.annotations)?;

        let field_count = fields.len();
        self.pool.complete(id, fields, annotations)?;
        debug!(type_name = %name, fields = field_count, "built record type");
        Ok(id)
    }

    fn field(
        &mut self,
        owner: &str,
        property: Option<String>,
        raw: RawFieldDescriptor,
    ) -> Result<Field> {
        let name = property
            .or(raw.name)
            .ok_or_else(|| CodecError::schema_definition(owner, "field without a name"))?;
        let missing = |what: &str| {
            CodecError::schema_definition(owner, format!("field '{name}' has no '{what}'"))
        };

        let tag = raw.tag.as_deref().ok_or_else(|| missing("type"))?;
        let kind = match KindTag::parse(tag) {
            Some(KindTag::Scalar(kind)) => kind,
            Some(KindTag::Record) => {
                FieldKind::Record(self.resolve(raw.kind.as_deref().ok_or_else(|| missing("kind"))?)?)
            }
            Some(KindTag::RecordArray) => FieldKind::RecordArray(
                self.resolve(raw.kind.as_deref().ok_or_else(|| missing("kind"))?)?,
            ),
            Some(KindTag::RecordUnion) => {
                FieldKind::RecordUnion(self.candidates(raw.kinds.as_deref(), &missing)?)
            }
            Some(KindTag::RecordUnionArray) => {
                FieldKind::RecordUnionArray(self.candidates(raw.kinds.as_deref(), &missing)?)
            }
            None => {
                return Err(CodecError::schema_definition(
                    owner,
                    format!("field '{name}' has unknown type '{tag}'"),
                ))
            }
        };

        let mut field = Field::new(name.as_str(), kind);
        for annotation in self.annotations(raw.annotations)? {
            field = field.with_annotation(annotation);
        }
        Ok(field)
    }

    fn candidates(
        &mut self,
        kinds: Option<&[String]>,
        missing: &dyn Fn(&str) -> CodecError,
    ) -> Result<Vec<TypeId>> {
        match kinds {
            Some(names) if !names.is_empty() => names.iter().map(|n| self.resolve(n)).collect(),
            _ => Err(missing("kinds")),
        }
    }

    fn annotations(&mut self, raws: Option<Vec<Box<RawValue>>>) -> Result<Vec<Record>> {
        raws.unwrap_or_default()
            .iter()
            .map(|raw| self.annotation(raw))
            .collect()
    }

    fn annotation(&mut self, raw: &RawValue) -> Result<Record> {
        let probe: KindProbe = serde_json::from_str(raw.get())?;
        let kind = probe
            .kind
            .ok_or_else(|| CodecError::format("annotation", "missing '_kind' property"))?;

        if !self.knows(&kind) {
            if !self.options.ignore_unknown_annotations {
                return Err(CodecError::type_not_found(kind));
            }
            warn!(annotation = %kind, "keeping unknown annotation as raw content");
            return Ok(builtin_types::unknown_annotation(canonical_json(raw.get())?));
        }
        let type_id = self.resolve(&kind)?;
        decode_record_str(&*self.pool, raw.get(), type_id, false)
    }
}

/// Run `f` against `pool`, undoing every type it added if it fails.
pub(crate) fn transactional<T>(
    pool: &mut TypePool,
    context: &str,
    f: impl FnOnce(&mut TypePool) -> Result<T>,
) -> Result<T> {
    let mark = pool.mark();
    let result = f(pool);
    if let Err(e) = &result {
        pool.rollback(mark);
        error!(context = context, error = %e, details = ?e.log_fields(), "schema decode failed");
    }
    result
}

/// Decode one type descriptor into `pool`, returning the new type.
///
/// Names the descriptor refers to, other than its own, must be known to
/// `resolver` or be builtin annotation types.
pub fn decode_type(
    pool: &mut TypePool,
    json: &str,
    resolver: &dyn TypeResolver,
    options: &CodecOptions,
) -> Result<TypeId> {
    let descriptor: RawTypeDescriptor = serde_json::from_str(json)?;
    transactional(pool, "decode_type", |pool| {
        SchemaBuilder::new(pool, resolver, options).build(descriptor)
    })
}

pub fn read_type<R: io::Read>(
    pool: &mut TypePool,
    reader: R,
    resolver: &dyn TypeResolver,
    options: &CodecOptions,
) -> Result<TypeId> {
    decode_type(pool, &read_to_string(reader)?, resolver, options)
}
