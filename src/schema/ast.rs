// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Type definitions: record types, their fields and field kinds.

use std::collections::HashMap;
use std::fmt;

use crate::model::Record;
use crate::schema::builtin_types;

/// Handle of a type inside a [`TypePool`](crate::schema::TypePool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub(crate) const fn from_index(index: usize) -> Self {
        TypeId(index as u32)
    }

    /// Position of the type in its pool.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of field kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    IntegerArray,
    Double,
    DoubleArray,
    String,
    StringArray,
    Boolean,
    BooleanArray,
    Long,
    LongArray,
    BigDecimal,
    BigDecimalArray,
    Date,
    DateTime,
    Blob,
    /// Nested record of exactly one target type.
    Record(TypeId),
    /// Array of records of exactly one target type.
    RecordArray(TypeId),
    /// Nested record of one of the candidate types.
    RecordUnion(Vec<TypeId>),
    /// Array of records, each of one of the candidate types.
    RecordUnionArray(Vec<TypeId>),
}

impl FieldKind {
    /// Wire tag used in type descriptors.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Integer => "int",
            FieldKind::IntegerArray => "intArray",
            FieldKind::Double => "double",
            FieldKind::DoubleArray => "doubleArray",
            FieldKind::String => "string",
            FieldKind::StringArray => "stringArray",
            FieldKind::Boolean => "boolean",
            FieldKind::BooleanArray => "booleanArray",
            FieldKind::Long => "long",
            FieldKind::LongArray => "longArray",
            FieldKind::BigDecimal => "bigDecimal",
            FieldKind::BigDecimalArray => "bigDecimalArray",
            FieldKind::Date => "date",
            FieldKind::DateTime => "dateTime",
            FieldKind::Blob => "blob",
            FieldKind::Record(_) => "record",
            FieldKind::RecordArray(_) => "recordArray",
            FieldKind::RecordUnion(_) => "recordUnion",
            FieldKind::RecordUnionArray(_) => "recordUnionArray",
        }
    }

    /// Whether this kind refers to other record types.
    pub fn is_reference(&self) -> bool {
        !self.targets().is_empty()
    }

    /// Target types: one for record kinds, the candidates for unions.
    pub fn targets(&self) -> &[TypeId] {
        match self {
            FieldKind::Record(t) | FieldKind::RecordArray(t) => std::slice::from_ref(t),
            FieldKind::RecordUnion(ts) | FieldKind::RecordUnionArray(ts) => ts,
            _ => &[],
        }
    }
}

/// Kind tag parsed from a type descriptor, before targets are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindTag {
    /// A kind without targets.
    Scalar(FieldKind),
    Record,
    RecordArray,
    RecordUnion,
    RecordUnionArray,
}

impl KindTag {
    /// Look up a wire tag.
    pub fn parse(tag: &str) -> Option<Self> {
        let scalar = |kind: FieldKind| Some(KindTag::Scalar(kind));
        match tag {
            "int" => scalar(FieldKind::Integer),
            "intArray" => scalar(FieldKind::IntegerArray),
            "double" => scalar(FieldKind::Double),
            "doubleArray" => scalar(FieldKind::DoubleArray),
            "string" => scalar(FieldKind::String),
            "stringArray" => scalar(FieldKind::StringArray),
            "boolean" => scalar(FieldKind::Boolean),
            "booleanArray" => scalar(FieldKind::BooleanArray),
            "long" => scalar(FieldKind::Long),
            "longArray" => scalar(FieldKind::LongArray),
            "bigDecimal" => scalar(FieldKind::BigDecimal),
            "bigDecimalArray" => scalar(FieldKind::BigDecimalArray),
            "date" => scalar(FieldKind::Date),
            "dateTime" => scalar(FieldKind::DateTime),
            "blob" => scalar(FieldKind::Blob),
            "record" => Some(KindTag::Record),
            "recordArray" => Some(KindTag::RecordArray),
            "recordUnion" => Some(KindTag::RecordUnion),
            "recordUnionArray" => Some(KindTag::RecordUnionArray),
            _ => None,
        }
    }
}

/// A field of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    annotations: Vec<Record>,
    index: usize,
}

impl Field {
    /// Create a field without annotations.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            annotations: Vec::new(),
            index: 0,
        }
    }

    /// Attach an annotation record.
    pub fn with_annotation(mut self, annotation: Record) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Position of the field in its type.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn annotations(&self) -> &[Record] {
        &self.annotations
    }

    /// First annotation of the given annotation type.
    pub fn annotation(&self, annotation_type: TypeId) -> Option<&Record> {
        self.annotations
            .iter()
            .find(|a| a.type_id() == annotation_type)
    }

    pub fn has_annotation(&self, annotation_type: TypeId) -> bool {
        self.annotation(annotation_type).is_some()
    }

    /// Position among the key fields, if this is a key field.
    pub fn key_index(&self) -> Option<i32> {
        self.annotation(builtin_types::KEY_ANNOTATION)
            .map(|a| a.get(0).and_then(|v| v.as_integer()).unwrap_or(0))
    }

    pub fn is_key(&self) -> bool {
        self.has_annotation(builtin_types::KEY_ANNOTATION)
    }

    /// Whether the field holds embedded JSON content.
    pub fn is_json_content(&self) -> bool {
        self.has_annotation(builtin_types::JSON_CONTENT)
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut Vec<Record> {
        &mut self.annotations
    }
}

/// A named record type.
///
/// A type is provisional between reservation and completion; a provisional
/// type has a name and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    name: String,
    fields: Vec<Field>,
    annotations: Vec<Record>,
    key_fields: Vec<usize>,
    by_name: HashMap<String, usize>,
    complete: bool,
}

impl RecordType {
    pub(crate) fn provisional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            annotations: Vec::new(),
            key_fields: Vec::new(),
            by_name: HashMap::new(),
            complete: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in wire order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Type-level annotations.
    pub fn annotations(&self) -> &[Record] {
        &self.annotations
    }

    pub fn annotation(&self, annotation_type: TypeId) -> Option<&Record> {
        self.annotations
            .iter()
            .find(|a| a.type_id() == annotation_type)
    }

    /// Indexes of the key fields, ordered by key position.
    pub fn key_fields(&self) -> &[usize] {
        &self.key_fields
    }

    pub fn has_key(&self) -> bool {
        !self.key_fields.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Fill in a provisional type. Field names must be unique.
    pub(crate) fn complete(
        &mut self,
        mut fields: Vec<Field>,
        annotations: Vec<Record>,
    ) -> Result<(), String> {
        let mut by_name = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter_mut().enumerate() {
            if by_name.insert(field.name.clone(), i).is_some() {
                return Err(format!("duplicate field '{}'", field.name));
            }
            field.set_index(i);
            if field.annotation(builtin_types::FIELD_NAME).is_none() {
                let name = field.name.clone();
                field
                    .annotations_mut()
                    .push(builtin_types::field_name(&name));
            }
        }

        let mut key_fields: Vec<(i32, usize)> = fields
            .iter()
            .filter_map(|f| f.key_index().map(|k| (k, f.index)))
            .collect();
        key_fields.sort();

        self.key_fields = key_fields.into_iter().map(|(_, i)| i).collect();
        self.fields = fields;
        self.annotations = annotations;
        self.by_name = by_name;
        self.complete = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tag_round_trip() {
        let kinds = [
            FieldKind::Integer,
            FieldKind::DoubleArray,
            FieldKind::BigDecimal,
            FieldKind::DateTime,
            FieldKind::Blob,
        ];
        for kind in kinds {
            match KindTag::parse(kind.tag()) {
                Some(KindTag::Scalar(parsed)) => assert_eq!(parsed, kind),
                other => panic!("unexpected {other:?} for {}", kind.tag()),
            }
        }
        assert_eq!(KindTag::parse("recordUnion"), Some(KindTag::RecordUnion));
        assert_eq!(KindTag::parse("float"), None);
    }

    #[test]
    fn test_targets() {
        let a = TypeId::from_index(10);
        let b = TypeId::from_index(11);
        assert_eq!(FieldKind::Record(a).targets(), &[a]);
        assert_eq!(FieldKind::RecordUnionArray(vec![a, b]).targets(), &[a, b]);
        assert!(FieldKind::String.targets().is_empty());
        assert!(!FieldKind::Long.is_reference());
    }

    #[test]
    fn test_complete_orders_key_fields_by_index() {
        let mut ty = RecordType::provisional("Pair");
        let fields = vec![
            Field::new("label", FieldKind::String),
            Field::new("second", FieldKind::Integer).with_annotation(builtin_types::key(1)),
            Field::new("first", FieldKind::Integer).with_annotation(builtin_types::key(0)),
        ];
        ty.complete(fields, Vec::new()).unwrap();
        assert!(ty.is_complete());
        assert_eq!(ty.key_fields(), &[2, 1]);
        assert_eq!(ty.field_index("second"), Some(1));
        assert!(ty.fields()[0].has_annotation(builtin_types::FIELD_NAME));
    }

    #[test]
    fn test_complete_rejects_duplicate_fields() {
        let mut ty = RecordType::provisional("Dup");
        let fields = vec![
            Field::new("a", FieldKind::String),
            Field::new("a", FieldKind::Integer),
        ];
        assert!(ty.complete(fields, Vec::new()).is_err());
        assert!(!ty.is_complete());
    }
}
