// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Records, keys and partial field value sets.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::{CodecError, Result, Value};
use crate::schema::{TypeId, TypePool};

/// An instance of a record type.
///
/// Values are stored by field position; `None` means the field is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_id: TypeId,
    values: Vec<Option<Value>>,
}

impl Record {
    /// Create a blank record of `type_id`.
    pub fn new(pool: &TypePool, type_id: TypeId) -> Self {
        let len = pool.get(type_id).fields().len();
        Self {
            type_id,
            values: vec![None; len],
        }
    }

    pub(crate) fn from_values(type_id: TypeId, values: Vec<Option<Value>>) -> Self {
        Self { type_id, values }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Value of the field at `index`, if set.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn is_set(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Set the field at `index` without checking its kind.
    pub fn set(&mut self, index: usize, value: Value) {
        self.put(index, Some(value));
    }

    /// Make the field at `index` absent.
    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = None;
        }
    }

    pub(crate) fn put(&mut self, index: usize, value: Option<Value>) {
        if index >= self.values.len() {
            self.values.resize(index + 1, None);
        }
        self.values[index] = value;
    }

    /// Present values with their field positions.
    pub fn values(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (i, v)))
    }

    pub fn get_by_name(&self, pool: &TypePool, name: &str) -> Option<&Value> {
        pool.get(self.type_id)
            .field_index(name)
            .and_then(|i| self.get(i))
    }

    /// Set a field by name, checking that the value fits the field kind.
    pub fn set_by_name(&mut self, pool: &TypePool, name: &str, value: Value) -> Result<()> {
        let ty = pool.get(self.type_id);
        let field = ty
            .field_by_name(name)
            .ok_or_else(|| CodecError::format(ty.name(), format!("unknown field '{name}'")))?;
        if !value.fits(field.kind()) {
            return Err(CodecError::format(
                format!("{}.{}", ty.name(), name),
                format!(
                    "a {} value does not fit a {} field",
                    value.kind_tag(),
                    field.kind().tag()
                ),
            ));
        }
        self.put(field.index(), Some(value));
        Ok(())
    }

    /// Builder-style [`set_by_name`](Self::set_by_name).
    pub fn with(mut self, pool: &TypePool, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set_by_name(pool, name, value.into())?;
        Ok(self)
    }

    /// Project the record onto its key fields.
    pub fn key(&self, pool: &TypePool) -> Result<Key> {
        let ty = pool.get(self.type_id);
        if !ty.has_key() {
            return Err(CodecError::format(ty.name(), "type has no key fields"));
        }
        let values = ty
            .key_fields()
            .iter()
            .map(|&i| {
                self.get(i).cloned().ok_or_else(|| {
                    CodecError::format(
                        format!("{}.{}", ty.name(), ty.fields()[i].name()),
                        "key field is not set",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Key::new(self.type_id, values))
    }
}

// =============================================================================
// Key
// =============================================================================

/// Identity of a record: its type and key field values in key order.
#[derive(Debug, Clone)]
pub struct Key {
    type_id: TypeId,
    values: Vec<Value>,
}

impl Key {
    pub fn new(type_id: TypeId, values: Vec<Value>) -> Self {
        Self { type_id, values }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Key values, one per key field.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// A record holding only the key fields.
    pub fn to_record(&self, pool: &TypePool) -> Record {
        let mut record = Record::new(pool, self.type_id);
        for (&field, value) in pool.get(self.type_id).key_fields().iter().zip(&self.values) {
            record.set(field, value.clone());
        }
        record
    }

    /// Render as `Type[field=value, ...]`.
    pub fn describe(&self, pool: &TypePool) -> String {
        let ty = pool.get(self.type_id);
        let parts: Vec<String> = ty
            .key_fields()
            .iter()
            .zip(&self.values)
            .map(|(&i, v)| format!("{}={}", ty.fields()[i].name(), v))
            .collect();
        format!("{}[{}]", ty.name(), parts.join(", "))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| key_value_eq(a, b))
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        for value in &self.values {
            hash_key_value(value, state);
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.type_id)?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

// Doubles compare by bit pattern so that Eq stays reflexive.
fn key_value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        (Value::DoubleArray(x), Value::DoubleArray(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| p.to_bits() == q.to_bits())
        }
        _ => a == b,
    }
}

fn hash_key_value<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Integer(v) => v.hash(state),
        Value::IntegerArray(v) => v.hash(state),
        Value::Double(v) => v.to_bits().hash(state),
        Value::DoubleArray(v) => v.iter().for_each(|d| d.to_bits().hash(state)),
        Value::String(v) => v.hash(state),
        Value::StringArray(v) => v.hash(state),
        Value::Boolean(v) => v.hash(state),
        Value::BooleanArray(v) => v.hash(state),
        Value::Long(v) => v.hash(state),
        Value::LongArray(v) => v.hash(state),
        Value::BigDecimal(v) => v.hash(state),
        Value::BigDecimalArray(v) => v.hash(state),
        Value::Date(v) => v.hash(state),
        Value::DateTime(v) => v.hash(state),
        Value::Blob(v) => v.hash(state),
        Value::Record(r) | Value::Union(r) => r.type_id().hash(state),
        Value::RecordArray(rs) | Value::UnionArray(rs) => rs.len().hash(state),
    }
}

// =============================================================================
// FieldValues
// =============================================================================

/// An ordered partial assignment of fields of one type.
///
/// Each entry is either a value or an explicit clear (`None`); fields
/// without an entry are not part of the assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValues {
    type_id: TypeId,
    entries: Vec<(usize, Option<Value>)>,
}

impl FieldValues {
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            entries: Vec::new(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Assign a field; a later assignment replaces an earlier one in place.
    pub fn set(&mut self, field: usize, value: Option<Value>) {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    /// Builder-style assignment by field name.
    pub fn with(mut self, pool: &TypePool, name: &str, value: Option<Value>) -> Result<Self> {
        let ty = pool.get(self.type_id);
        let field = ty
            .field_by_name(name)
            .ok_or_else(|| CodecError::format(ty.name(), format!("unknown field '{name}'")))?;
        self.set(field.index(), value);
        Ok(self)
    }

    /// `None` if the field is not assigned, `Some(None)` if it is cleared.
    pub fn get(&self, field: usize) -> Option<Option<&Value>> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_ref())
    }

    pub fn contains(&self, field: usize) -> bool {
        self.entries.iter().any(|(f, _)| *f == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&Value>)> {
        self.entries.iter().map(|(f, v)| (*f, v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every assignment of `other` on top of this one.
    pub fn merge(&mut self, other: FieldValues) {
        for (field, value) in other.entries {
            self.set(field, value);
        }
    }

    /// Add the assignments of `other` for fields not yet assigned here.
    pub(crate) fn merge_missing(&mut self, other: FieldValues) {
        for (field, value) in other.entries {
            if !self.contains(field) {
                self.entries.push((field, value));
            }
        }
    }

    /// Build a record from the key and these values.
    pub fn to_record(&self, pool: &TypePool, key: &Key) -> Record {
        let mut record = key.to_record(pool);
        for (field, value) in &self.entries {
            record.put(*field, value.clone());
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, TypeBuilder};
    use std::collections::HashSet;

    fn person_pool() -> (TypePool, TypeId) {
        let mut pool = TypePool::new();
        let id = pool
            .add(
                TypeBuilder::new("Person")
                    .key_field("id", FieldKind::Integer)
                    .field("name", FieldKind::String)
                    .field("score", FieldKind::Double),
            )
            .unwrap();
        (pool, id)
    }

    #[test]
    fn test_set_by_name_checks_kind() {
        let (pool, id) = person_pool();
        let mut record = Record::new(&pool, id);
        record.set_by_name(&pool, "name", Value::from("Ada")).unwrap();
        assert_eq!(record.get(1), Some(&Value::from("Ada")));

        let err = record
            .set_by_name(&pool, "name", Value::Integer(3))
            .unwrap_err();
        assert!(matches!(err, CodecError::Format { .. }));
        assert!(record.set_by_name(&pool, "missing", Value::Integer(3)).is_err());
    }

    #[test]
    fn test_key_projection() {
        let (pool, id) = person_pool();
        let record = Record::new(&pool, id)
            .with(&pool, "id", 7)
            .unwrap()
            .with(&pool, "name", "Ada")
            .unwrap();
        let key = record.key(&pool).unwrap();
        assert_eq!(key.values(), &[Value::Integer(7)]);
        assert_eq!(key.describe(&pool), "Person[id=7]");
        assert_eq!(key.to_record(&pool).get(0), Some(&Value::Integer(7)));
        assert_eq!(key.to_record(&pool).get(1), None);
    }

    #[test]
    fn test_key_requires_values() {
        let (pool, id) = person_pool();
        assert!(Record::new(&pool, id).key(&pool).is_err());
    }

    #[test]
    fn test_key_hash_and_eq() {
        let (_, id) = person_pool();
        let mut set = HashSet::new();
        set.insert(Key::new(id, vec![Value::Integer(1)]));
        assert!(set.contains(&Key::new(id, vec![Value::Integer(1)])));
        assert!(!set.contains(&Key::new(id, vec![Value::Integer(2)])));
        assert_eq!(
            Key::new(id, vec![Value::Double(f64::NAN)]),
            Key::new(id, vec![Value::Double(f64::NAN)])
        );
    }

    #[test]
    fn test_field_values_tri_state() {
        let (pool, id) = person_pool();
        let values = FieldValues::new(id)
            .with(&pool, "name", Some(Value::from("Ada")))
            .unwrap()
            .with(&pool, "score", None)
            .unwrap();
        assert_eq!(values.get(1), Some(Some(&Value::from("Ada"))));
        assert_eq!(values.get(2), Some(None));
        assert_eq!(values.get(0), None);
    }

    #[test]
    fn test_field_values_merge() {
        let (_, id) = person_pool();
        let mut a = FieldValues::new(id);
        a.set(1, Some(Value::from("a")));
        let mut b = FieldValues::new(id);
        b.set(1, Some(Value::from("b")));
        b.set(2, None);

        let mut merged = a.clone();
        merged.merge(b.clone());
        assert_eq!(merged.get(1), Some(Some(&Value::from("b"))));
        assert_eq!(merged.len(), 2);

        a.merge_missing(b);
        assert_eq!(a.get(1), Some(Some(&Value::from("a"))));
        assert_eq!(a.get(2), Some(None));
    }
}
