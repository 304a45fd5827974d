// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Arena holding every record type known to a codec session.
//!
//! Types refer to each other through [`TypeId`] handles, so self-referential
//! and mutually recursive type graphs are plain data. A name may first be
//! reserved (provisional) and completed later; only complete types are
//! visible through [`TypePool::find`].

use std::collections::HashMap;

use crate::core::{CodecError, Result};
use crate::model::Record;
use crate::schema::ast::{Field, FieldKind, RecordType, TypeId};
use crate::schema::builtin_types;

/// Arena of record types.
#[derive(Debug, Clone)]
pub struct TypePool {
    types: Vec<RecordType>,
    by_name: HashMap<String, TypeId>,
}

/// Snapshot of a pool's size, used to undo a failed decode.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PoolMark(usize);

impl TypePool {
    /// Create a pool holding only the builtin annotation types.
    pub fn new() -> Self {
        let mut pool = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
        };
        builtin_types::register(&mut pool);
        pool
    }

    /// Look up a complete type by name.
    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.by_name
            .get(name)
            .copied()
            .filter(|id| self.types[id.index()].is_complete())
    }

    /// Get a type by handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by another pool.
    pub fn get(&self, id: TypeId) -> &RecordType {
        &self.types[id.index()]
    }

    pub fn try_get(&self, id: TypeId) -> Option<&RecordType> {
        self.types.get(id.index())
    }

    /// Name of the type behind `id`.
    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).name()
    }

    /// Number of types, builtins included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate complete types in registration order.
    pub fn types(&self) -> impl Iterator<Item = (TypeId, &RecordType)> {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_complete())
            .map(|(i, t)| (TypeId::from_index(i), t))
    }

    /// Reserve a name so that fields can refer to it before it is defined.
    ///
    /// Declaring a name twice returns the same handle as long as the type is
    /// still provisional.
    pub fn declare(&mut self, name: &str) -> Result<TypeId> {
        match self.by_name.get(name) {
            Some(&id) if !self.get(id).is_complete() => Ok(id),
            Some(_) => Err(CodecError::schema_definition(name, "type already defined")),
            None => Ok(self.push_provisional(name)),
        }
    }

    /// Define a type from a builder, completing a declared name if present.
    pub fn add(&mut self, builder: TypeBuilder) -> Result<TypeId> {
        let id = self.declare(&builder.name)?;
        self.complete(id, builder.fields, builder.annotations)?;
        Ok(id)
    }

    /// Reserve a fresh provisional entry; the name must be unused.
    pub(crate) fn reserve(&mut self, name: &str) -> Result<TypeId> {
        if self.by_name.contains_key(name) {
            return Err(CodecError::schema_definition(name, "type already defined"));
        }
        Ok(self.push_provisional(name))
    }

    /// Give a provisional type its fields and annotations.
    pub(crate) fn complete(
        &mut self,
        id: TypeId,
        fields: Vec<Field>,
        annotations: Vec<Record>,
    ) -> Result<()> {
        let count = self.types.len();
        for field in &fields {
            if let FieldKind::RecordUnion(ts) | FieldKind::RecordUnionArray(ts) = field.kind() {
                if ts.is_empty() {
                    return Err(CodecError::schema_definition(
                        self.name(id),
                        format!("union field '{}' has no candidates", field.name()),
                    ));
                }
            }
            if field.kind().targets().iter().any(|t| t.index() >= count) {
                return Err(CodecError::schema_definition(
                    self.name(id),
                    format!("field '{}' targets a foreign type", field.name()),
                ));
            }
        }

        let ty = &mut self.types[id.index()];
        if ty.is_complete() {
            return Err(CodecError::schema_definition(
                ty.name(),
                "type already defined",
            ));
        }
        ty.complete(fields, annotations)
            .map_err(|reason| CodecError::schema_definition(ty.name(), reason))
    }

    pub(crate) fn mark(&self) -> PoolMark {
        PoolMark(self.types.len())
    }

    /// Drop every type added since `mark`.
    pub(crate) fn rollback(&mut self, mark: PoolMark) {
        for ty in self.types.drain(mark.0..) {
            self.by_name.remove(ty.name());
        }
    }

    fn push_provisional(&mut self, name: &str) -> TypeId {
        let id = TypeId::from_index(self.types.len());
        self.types.push(RecordType::provisional(name));
        self.by_name.insert(name.to_string(), id);
        id
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a record type.
///
/// ```
/// use recordcodec::schema::{FieldKind, TypeBuilder, TypePool};
///
/// let mut pool = TypePool::new();
/// let person = pool.declare("Person").unwrap();
/// let id = pool
///     .add(
///         TypeBuilder::new("Person")
///             .key_field("id", FieldKind::Integer)
///             .field("name", FieldKind::String)
///             .field("manager", FieldKind::Record(person)),
///     )
///     .unwrap();
/// assert_eq!(id, person);
/// assert_eq!(pool.get(id).key_fields(), &[0]);
/// ```
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    name: String,
    fields: Vec<Field>,
    annotations: Vec<Record>,
    next_key: i32,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            annotations: Vec::new(),
            next_key: 0,
        }
    }

    pub fn field(self, name: &str, kind: FieldKind) -> Self {
        self.push(Field::new(name, kind))
    }

    /// Add a key field; key positions follow declaration order.
    pub fn key_field(mut self, name: &str, kind: FieldKind) -> Self {
        let annotation = builtin_types::key(self.next_key);
        self.next_key += 1;
        self.push(Field::new(name, kind).with_annotation(annotation))
    }

    /// Add a field carrying annotations.
    pub fn field_with(self, name: &str, kind: FieldKind, annotations: Vec<Record>) -> Self {
        let field = annotations
            .into_iter()
            .fold(Field::new(name, kind), Field::with_annotation);
        self.push(field)
    }

    pub fn push(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a type-level annotation.
    pub fn annotation(mut self, annotation: Record) -> Self {
        self.annotations.push(annotation);
        self
    }
}
