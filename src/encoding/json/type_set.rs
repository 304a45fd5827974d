// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Type sets: a root type and everything it depends on, as a JSON array of
//! type descriptors with the root first.
//!
//! Members may refer to each other in any order. Decoding reads every
//! descriptor up front and builds members only when they are reached from
//! the root, so members nothing refers to are never built.

use std::collections::HashSet;
use std::io;

use tracing::debug;

use super::context::{read_to_string, EncodeContext};
use super::schema::{transactional, SchemaBuilder, TypeSer};
use crate::config::CodecOptions;
use crate::core::{CodecError, Result, TypeResolver};
use crate::model::Record;
use crate::schema::builtin_types;
use crate::schema::descriptor::RawTypeDescriptor;
use crate::schema::{TypeId, TypePool};

/// The types needed to describe `root`: `root` first, then every type
/// reachable through annotations and field targets, each once. Builtin
/// annotation types are left out.
pub fn export(pool: &TypePool, root: TypeId) -> Vec<TypeId> {
    fn visit(pool: &TypePool, id: TypeId, seen: &mut HashSet<TypeId>, out: &mut Vec<TypeId>) {
        if builtin_types::is_builtin(id) || !seen.insert(id) {
            return;
        }
        out.push(id);

        let ty = pool.get(id);
        let annotation_types = |records: &[Record]| -> Vec<TypeId> {
            records.iter().map(Record::type_id).collect()
        };
        for dep in annotation_types(ty.annotations()) {
            visit(pool, dep, seen, out);
        }
        for field in ty.fields() {
            for dep in annotation_types(field.annotations()) {
                visit(pool, dep, seen, out);
            }
            for &dep in field.kind().targets() {
                visit(pool, dep, seen, out);
            }
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    if builtin_types::is_builtin(root) {
        out.push(root);
        seen.insert(root);
    }
    visit(pool, root, &mut seen, &mut out);
    out
}

/// Encode the type set of `root`.
pub fn encode_type_set(pool: &TypePool, root: TypeId, options: &CodecOptions) -> Result<String> {
    let ctx = EncodeContext::new(pool, options);
    ctx.to_string(&members(&ctx, root))
}

pub fn write_type_set<W: io::Write>(
    pool: &TypePool,
    writer: W,
    root: TypeId,
    options: &CodecOptions,
) -> Result<()> {
    let ctx = EncodeContext::new(pool, options);
    ctx.write(writer, &members(&ctx, root))
}

fn members<'a>(ctx: &'a EncodeContext<'a>, root: TypeId) -> Vec<TypeSer<'a>> {
    export(ctx.pool, root)
        .into_iter()
        .map(|type_id| TypeSer { ctx, type_id })
        .collect()
}

fn read_members(json: &str) -> Result<Vec<RawTypeDescriptor>> {
    let members: Vec<RawTypeDescriptor> = serde_json::from_str(json)?;
    if members.is_empty() {
        return Err(CodecError::format("type set", "no types"));
    }
    Ok(members)
}

fn member_name(descriptor: &RawTypeDescriptor) -> Result<String> {
    descriptor
        .kind
        .clone()
        .ok_or_else(|| CodecError::schema_definition(descriptor.name(), "missing 'kind'"))
}

/// Decode a type set into `pool`, returning its root (the first member).
///
/// Types `resolver` already knows are reused instead of rebuilt.
pub fn decode_type_set(
    pool: &mut TypePool,
    json: &str,
    resolver: &dyn TypeResolver,
    options: &CodecOptions,
) -> Result<TypeId> {
    let members = read_members(json)?;
    let root = member_name(&members[0])?;
    let total = members.len();
    transactional(pool, "decode_type_set", |pool| {
        let mut builder = SchemaBuilder::new(pool, resolver, options);
        for member in members {
            builder.defer(member)?;
        }
        let id = builder.resolve(&root)?;
        debug!(
            root = %root,
            members = total,
            unused = builder.pending_len(),
            "decoded type set"
        );
        Ok(id)
    })
}

pub fn read_type_set<R: io::Read>(
    pool: &mut TypePool,
    reader: R,
    resolver: &dyn TypeResolver,
    options: &CodecOptions,
) -> Result<TypeId> {
    decode_type_set(pool, &read_to_string(reader)?, resolver, options)
}

/// Decode every member of a type set, in array order.
pub fn decode_type_set_all(
    pool: &mut TypePool,
    json: &str,
    resolver: &dyn TypeResolver,
    options: &CodecOptions,
) -> Result<Vec<TypeId>> {
    load_all(pool, read_members(json)?, resolver, options)
}

fn load_all(
    pool: &mut TypePool,
    members: Vec<RawTypeDescriptor>,
    resolver: &dyn TypeResolver,
    options: &CodecOptions,
) -> Result<Vec<TypeId>> {
    let names = members
        .iter()
        .map(member_name)
        .collect::<Result<Vec<_>>>()?;
    transactional(pool, "load_types", |pool| {
        let mut builder = SchemaBuilder::new(pool, resolver, options);
        for member in members {
            builder.defer(member)?;
        }
        let ids = names
            .iter()
            .map(|name| builder.resolve(name))
            .collect::<Result<Vec<_>>>()?;
        debug!(types = ids.len(), "loaded types");
        Ok(ids)
    })
}

/// Collects type descriptors from several documents and loads them
/// together, so any document may refer to types defined in another.
///
/// ```
/// use recordcodec::config::CodecOptions;
/// use recordcodec::core::PoolTypes;
/// use recordcodec::encoding::json::TypeLoader;
/// use recordcodec::schema::TypePool;
///
/// let mut loader = TypeLoader::new();
/// loader
///     .add(r#"{"kind":"Order","fields":[{"name":"customer","type":"record","kind":"Customer"}]}"#)
///     .unwrap()
///     .add(r#"[{"kind":"Customer","fields":[{"name":"name","type":"string"}]}]"#)
///     .unwrap();
///
/// let mut pool = TypePool::new();
/// let ids = loader.load(&mut pool, &PoolTypes, &CodecOptions::default()).unwrap();
/// assert_eq!(pool.name(ids[0]), "Order");
/// assert_eq!(pool.name(ids[1]), "Customer");
/// ```
#[derive(Debug, Default)]
pub struct TypeLoader {
    members: Vec<RawTypeDescriptor>,
}

impl TypeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document holding one type descriptor, an array of them, or
    /// `null`.
    pub fn add(&mut self, json: &str) -> Result<&mut Self> {
        match json.trim_start().as_bytes().first() {
            Some(b'[') => {
                let members: Vec<RawTypeDescriptor> = serde_json::from_str(json)?;
                self.members.extend(members);
            }
            Some(b'{') => self.members.push(serde_json::from_str(json)?),
            _ => {
                let _: () = serde_json::from_str(json).map_err(|_| {
                    CodecError::format("type loader", "expected a type, an array of types or null")
                })?;
            }
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Build every collected type, returned in the order they were added.
    pub fn load(
        self,
        pool: &mut TypePool,
        resolver: &dyn TypeResolver,
        options: &CodecOptions,
    ) -> Result<Vec<TypeId>> {
        load_all(pool, self.members, resolver, options)
    }
}
